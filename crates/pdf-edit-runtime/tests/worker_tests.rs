use lopdf::{Dictionary, Document, Object, Stream};
use pdf_edit::{RasterImage, Result, TextAnnotation};
use pdf_edit_runtime::*;
use std::time::Duration;
use tokio::sync::mpsc;

fn create_test_pdf(num_pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for _ in 0..num_pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"q Q".to_vec()));
        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Resources", Object::Dictionary(Dictionary::new())),
            ("Contents", Object::Reference(content_id)),
        ]));
        kids.push(Object::Reference(page_id));
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(num_pages as i64)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", catalog_id);

    let mut writer = Vec::new();
    doc.save_to(&mut writer).unwrap();
    writer
}

#[derive(Clone)]
struct FakeRasterizer;

impl PageRasterizer for FakeRasterizer {
    fn render_page(&self, _pdf: &[u8], page_index: usize, _scale: f32) -> Result<RasterImage> {
        Ok(RasterImage {
            width: 1,
            height: 1,
            rgba: vec![page_index as u8, 0, 0, 255],
        })
    }
}

fn start_worker() -> (
    mpsc::UnboundedSender<EditCommand>,
    mpsc::UnboundedReceiver<EditUpdate>,
) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (update_tx, update_rx) = mpsc::unbounded_channel();
    tokio::spawn(worker_task(
        FakeRasterizer,
        EditorOptions::default(),
        command_rx,
        update_tx,
    ));
    (command_tx, update_rx)
}

async fn next_update(rx: &mut mpsc::UnboundedReceiver<EditUpdate>) -> EditUpdate {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("worker update")
        .expect("worker alive")
}

/// Next update other than a thumbnail refresh, which page edits may trigger
async fn next_edit_update(rx: &mut mpsc::UnboundedReceiver<EditUpdate>) -> EditUpdate {
    loop {
        match next_update(rx).await {
            EditUpdate::ThumbnailsRendered { .. } => continue,
            other => return other,
        }
    }
}

async fn open(
    tx: &mpsc::UnboundedSender<EditCommand>,
    rx: &mut mpsc::UnboundedReceiver<EditUpdate>,
    num_pages: usize,
) -> DocumentId {
    tx.send(EditCommand::OpenBytes {
        bytes: create_test_pdf(num_pages),
    })
    .unwrap();
    match next_update(rx).await {
        EditUpdate::Opened { doc_id, page_count } => {
            assert_eq!(page_count, num_pages);
            doc_id
        }
        other => panic!("unexpected update {:?}", other),
    }
}

#[tokio::test]
async fn test_page_edits_report_working_order() {
    let (tx, mut rx) = start_worker();
    let doc_id = open(&tx, &mut rx, 3).await;

    tx.send(EditCommand::Reorder {
        doc_id,
        new_order: vec![2, 0, 1],
    })
    .unwrap();
    tx.send(EditCommand::Rotate {
        doc_id,
        position: 0,
        delta: 90,
    })
    .unwrap();

    let _ = next_edit_update(&mut rx).await;
    match next_edit_update(&mut rx).await {
        EditUpdate::PagesChanged { pages, .. } => {
            let summary: Vec<_> = pages.iter().map(|p| (p.original_index, p.rotation)).collect();
            assert_eq!(summary, vec![(2, 90), (0, 0), (1, 0)]);
        }
        other => panic!("unexpected update {:?}", other),
    }
}

#[tokio::test]
async fn test_queued_thumbnail_requests_are_coalesced() {
    let (tx, mut rx) = start_worker();
    let doc_id = open(&tx, &mut rx, 3).await;

    tx.send(EditCommand::RenderThumbnails { doc_id }).unwrap();
    tx.send(EditCommand::Delete {
        doc_id,
        positions: vec![0],
    })
    .unwrap();
    tx.send(EditCommand::RenderThumbnails { doc_id }).unwrap();
    tx.send(EditCommand::RenderThumbnails { doc_id }).unwrap();

    assert!(matches!(
        next_update(&mut rx).await,
        EditUpdate::PagesChanged { .. }
    ));
    match next_update(&mut rx).await {
        EditUpdate::ThumbnailsRendered { thumbnails, .. } => {
            let originals: Vec<_> = thumbnails.iter().map(|t| t.original_index).collect();
            assert_eq!(originals, vec![1, 2]);
        }
        other => panic!("unexpected update {:?}", other),
    }

    // The render queued by the delete is superseded, so only one arrives
    let extra = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(extra.is_err());
}

#[tokio::test]
async fn test_order_changes_refresh_thumbnails() {
    let (tx, mut rx) = start_worker();
    let doc_id = open(&tx, &mut rx, 3).await;

    tx.send(EditCommand::Duplicate { doc_id, position: 1 }).unwrap();
    assert!(matches!(next_update(&mut rx).await, EditUpdate::PagesChanged { .. }));
    match next_update(&mut rx).await {
        EditUpdate::ThumbnailsRendered { thumbnails, .. } => {
            let originals: Vec<_> = thumbnails.iter().map(|t| t.original_index).collect();
            assert_eq!(originals, vec![0, 1, 1, 2]);
        }
        other => panic!("unexpected update {:?}", other),
    }

    // Rotation only updates the working order
    tx.send(EditCommand::Rotate {
        doc_id,
        position: 0,
        delta: 90,
    })
    .unwrap();
    assert!(matches!(next_update(&mut rx).await, EditUpdate::PagesChanged { .. }));
    let extra = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(extra.is_err());
}

#[tokio::test]
async fn test_export_writes_file() {
    use tempfile::NamedTempFile;

    let (tx, mut rx) = start_worker();
    let doc_id = open(&tx, &mut rx, 4).await;
    let temp = NamedTempFile::new().unwrap();

    tx.send(EditCommand::Delete {
        doc_id,
        positions: vec![1, 2],
    })
    .unwrap();
    tx.send(EditCommand::AddAnnotation {
        doc_id,
        annotation: TextAnnotation::new(0, 10.0, 10.0, "signed").into(),
    })
    .unwrap();
    tx.send(EditCommand::Export {
        doc_id,
        output_path: temp.path().to_path_buf(),
    })
    .unwrap();

    assert!(matches!(next_edit_update(&mut rx).await, EditUpdate::PagesChanged { .. }));
    assert!(matches!(next_edit_update(&mut rx).await, EditUpdate::AnnotationAdded { .. }));
    match next_edit_update(&mut rx).await {
        EditUpdate::ExportComplete { page_count, .. } => assert_eq!(page_count, 2),
        other => panic!("unexpected update {:?}", other),
    }

    let exported = Document::load(temp.path()).unwrap();
    assert_eq!(exported.get_pages().len(), 2);
}

#[tokio::test]
async fn test_invalid_commands_report_errors() {
    let (tx, mut rx) = start_worker();
    let doc_id = open(&tx, &mut rx, 2).await;

    tx.send(EditCommand::Rotate {
        doc_id,
        position: 0,
        delta: 45,
    })
    .unwrap();
    match next_update(&mut rx).await {
        EditUpdate::Error { message } => assert!(message.contains("45")),
        other => panic!("unexpected update {:?}", other),
    }

    tx.send(EditCommand::Close { doc_id }).unwrap();
    assert!(matches!(next_update(&mut rx).await, EditUpdate::Closed { .. }));

    tx.send(EditCommand::RenderThumbnails { doc_id }).unwrap();
    assert!(matches!(next_update(&mut rx).await, EditUpdate::Error { .. }));

    tx.send(EditCommand::OpenBytes {
        bytes: b"not a pdf".to_vec(),
    })
    .unwrap();
    assert!(matches!(next_update(&mut rx).await, EditUpdate::Error { .. }));
}
