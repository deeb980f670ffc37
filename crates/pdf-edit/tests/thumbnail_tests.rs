mod common;

use common::*;
use pdf_edit::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Renders a 1x1 pixel whose red channel is the page index
#[derive(Default)]
struct FakeRasterizer {
    broken_pages: HashSet<usize>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl PageRasterizer for FakeRasterizer {
    fn render_page(&self, _pdf: &[u8], page_index: usize, _scale: f32) -> Result<RasterImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        if self.broken_pages.contains(&page_index) {
            return Err(EditError::Render(format!("page {} is broken", page_index)));
        }
        Ok(RasterImage {
            width: 1,
            height: 1,
            rgba: vec![page_index as u8, 0, 0, 255],
        })
    }
}

fn source(num_pages: usize) -> SourceDocument {
    SourceDocument::from_bytes(create_test_pdf_bytes(num_pages)).unwrap()
}

fn red(thumbnail: &Thumbnail) -> u8 {
    match &thumbnail.image {
        ThumbnailImage::Rendered(raster) => raster.rgba[0],
        ThumbnailImage::Placeholder { reason } => panic!("unexpected placeholder: {}", reason),
    }
}

#[tokio::test]
async fn test_thumbnails_follow_working_order() {
    let source = source(4);
    let mut pages = PageModificationTracker::new(4);
    pages.reorder(&[3, 2, 1, 0]).unwrap();
    pages.delete(&[1]).unwrap();
    pages.rotate(0, 90).unwrap();

    let renderer = ThumbnailRenderer::new(FakeRasterizer::default(), &EditorOptions::default())
        .unwrap();
    let thumbnails = renderer
        .render(&source, &pages.working_order())
        .await
        .unwrap();

    assert_eq!(thumbnails.len(), 3);
    let summary: Vec<_> = thumbnails
        .iter()
        .map(|t| (t.position, t.original_index, t.rotation, red(t)))
        .collect();
    assert_eq!(summary, vec![(0, 3, 90, 3), (1, 1, 0, 1), (2, 0, 0, 0)]);
}

#[tokio::test]
async fn test_failed_page_degrades_to_placeholder() {
    let source = source(3);
    let rasterizer = FakeRasterizer {
        broken_pages: HashSet::from([1]),
        ..FakeRasterizer::default()
    };
    let renderer = ThumbnailRenderer::new(rasterizer, &EditorOptions::default()).unwrap();
    let pages = PageModificationTracker::new(3);

    let thumbnails = renderer
        .render(&source, &pages.working_order())
        .await
        .unwrap();
    let placeholders: Vec<bool> = thumbnails.iter().map(|t| t.is_placeholder()).collect();
    assert_eq!(placeholders, vec![false, true, false]);
}

#[tokio::test]
async fn test_rasters_are_cached_and_shared() {
    let source = source(2);
    let calls = Arc::new(AtomicUsize::new(0));
    let rasterizer = FakeRasterizer {
        calls: Arc::clone(&calls),
        ..FakeRasterizer::default()
    };
    let renderer = ThumbnailRenderer::new(rasterizer, &EditorOptions::default()).unwrap();

    let mut pages = PageModificationTracker::new(2);
    pages.duplicate(0).unwrap();
    let thumbnails = renderer
        .render(&source, &pages.working_order())
        .await
        .unwrap();
    assert_eq!(thumbnails.len(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Reordering needs no new rasters
    pages.reorder(&[2, 1, 0]).unwrap();
    renderer
        .render(&source, &pages.working_order())
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    renderer.clear_cache().await;
    renderer
        .render(&source, &pages.working_order())
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_cache_evicts_least_recently_used() {
    let source = source(3);
    let calls = Arc::new(AtomicUsize::new(0));
    let rasterizer = FakeRasterizer {
        calls: Arc::clone(&calls),
        ..FakeRasterizer::default()
    };
    let options = EditorOptions {
        thumbnail_cache_pages: 2,
        ..EditorOptions::default()
    };
    let renderer = ThumbnailRenderer::new(rasterizer, &options).unwrap();
    let slot = |index| vec![PageModification::new(index)];

    for index in 0..3 {
        renderer.render(&source, &slot(index)).await.unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(renderer.cached_pages().await, 2);

    // Pages 1 and 2 survived; page 0 was evicted
    let order = vec![PageModification::new(1), PageModification::new(2)];
    renderer.render(&source, &order).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    renderer.render(&source, &slot(0)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    // Re-adding page 0 pushed out page 1, the least recently used
    renderer.render(&source, &slot(2)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    renderer.render(&source, &slot(1)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(renderer.cached_pages().await, 2);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let source = source(1);
    let calls = Arc::new(AtomicUsize::new(0));
    let rasterizer = FakeRasterizer {
        broken_pages: HashSet::from([0]),
        calls: Arc::clone(&calls),
        ..FakeRasterizer::default()
    };
    let renderer = ThumbnailRenderer::new(rasterizer, &EditorOptions::default()).unwrap();
    let order = PageModificationTracker::new(1).working_order();

    renderer.render(&source, &order).await.unwrap();
    renderer.render(&source, &order).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_superseded_ticket_is_discarded() {
    let source = source(2);
    let renderer = ThumbnailRenderer::new(FakeRasterizer::default(), &EditorOptions::default())
        .unwrap();
    let order = PageModificationTracker::new(2).working_order();

    let stale = renderer.ticket();
    let fresh = renderer.ticket();
    assert!(!renderer.is_current(stale));

    assert!(renderer.render_with_ticket(stale, &source, &order).await.is_none());
    assert!(renderer.render_with_ticket(fresh, &source, &order).await.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_newer_render_supersedes_in_flight_one() {
    let source = source(3);
    let rasterizer = FakeRasterizer {
        delay: Duration::from_millis(50),
        ..FakeRasterizer::default()
    };
    let renderer = ThumbnailRenderer::new(rasterizer, &EditorOptions::default()).unwrap();
    let before = PageModificationTracker::new(3).working_order();
    let mut pages = PageModificationTracker::new(3);
    pages.delete(&[0]).unwrap();
    let after = pages.working_order();

    let first = renderer.ticket();
    let (old, new) = tokio::join!(
        renderer.render_with_ticket(first, &source, &before),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            renderer.render(&source, &after).await
        }
    );

    assert!(old.is_none());
    let new = new.unwrap();
    assert_eq!(new.len(), 2);
    assert_eq!(new[0].original_index, 1);
}

#[tokio::test]
async fn test_deleted_entries_are_skipped() {
    let source = source(2);
    let renderer = ThumbnailRenderer::new(FakeRasterizer::default(), &EditorOptions::default())
        .unwrap();
    let mut pages = PageModificationTracker::new(2);
    pages.delete(&[0]).unwrap();

    // Tombstones passed in directly are still left out
    let thumbnails = renderer.render(&source, pages.entries()).await.unwrap();
    assert_eq!(thumbnails.len(), 1);
    assert_eq!(thumbnails[0].original_index, 1);
}

#[test]
fn test_invalid_options_are_rejected() {
    let options = EditorOptions {
        thumbnail_scale: 0.0,
        ..EditorOptions::default()
    };
    assert!(matches!(
        ThumbnailRenderer::new(FakeRasterizer::default(), &options),
        Err(EditError::Config(_))
    ));
}
