//! Page previews for the editing UI
//!
//! Thumbnails show page geometry only: they follow the working order and
//! deletions, carry the slot's rotation for the UI to apply, and never
//! include annotations. Each source page is rasterized at most once per
//! scale; duplicated slots share the raster.
//!
//! A render is identified by a [`Ticket`]. Starting a new render supersedes
//! every older ticket, and a superseded render returns `None` instead of
//! results for state the UI no longer shows.

use crate::options::EditorOptions;
use crate::source::SourceDocument;
use crate::types::*;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

/// RGBA8 pixels of a rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Turns one page of a PDF into pixels
pub trait PageRasterizer: Send + Sync + 'static {
    fn render_page(&self, pdf: &[u8], page_index: usize, scale: f32) -> Result<RasterImage>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThumbnailImage {
    Rendered(Arc<RasterImage>),
    /// The page could not be rendered; the rest of the document still was
    Placeholder { reason: String },
}

/// Preview of one visible slot
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    /// Position in the working order (deleted slots excluded)
    pub position: usize,
    pub original_index: usize,
    /// Rotation for the UI to apply; the raster itself is unrotated
    pub rotation: u16,
    pub image: ThumbnailImage,
}

impl Thumbnail {
    pub fn is_placeholder(&self) -> bool {
        matches!(self.image, ThumbnailImage::Placeholder { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

type CacheKey = (usize, u32);

/// Rasters kept between renders, evicting the least recently used
struct RasterCache {
    capacity: usize,
    entries: HashMap<CacheKey, Arc<RasterImage>>,
    order: VecDeque<CacheKey>,
}

impl RasterCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&mut self, key: &CacheKey) -> Option<Arc<RasterImage>> {
        let raster = self.entries.get(key).cloned()?;
        self.order.retain(|k| k != key);
        self.order.push_back(*key);
        Some(raster)
    }

    fn insert(&mut self, key: CacheKey, raster: Arc<RasterImage>) {
        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        }
        while self.order.len() >= self.capacity {
            match self.order.pop_front() {
                Some(old_key) => {
                    self.entries.remove(&old_key);
                }
                None => break,
            }
        }
        self.entries.insert(key, raster);
        self.order.push_back(key);
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

pub struct ThumbnailRenderer<R: PageRasterizer> {
    rasterizer: Arc<R>,
    scale: f32,
    concurrency: usize,
    latest: AtomicU64,
    cache: Mutex<RasterCache>,
}

impl<R: PageRasterizer> ThumbnailRenderer<R> {
    pub fn new(rasterizer: R, options: &EditorOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            rasterizer: Arc::new(rasterizer),
            scale: options.thumbnail_scale,
            concurrency: options.thumbnail_concurrency,
            latest: AtomicU64::new(0),
            cache: Mutex::new(RasterCache::new(options.thumbnail_cache_pages)),
        })
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Issue a new ticket, superseding all earlier ones
    pub fn ticket(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }

    /// Forget all cached rasters, e.g. when the source document changes
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }

    /// Number of rasters currently cached
    pub async fn cached_pages(&self) -> usize {
        self.cache.lock().await.entries.len()
    }

    /// Render the working order under a fresh ticket
    pub async fn render(
        &self,
        source: &SourceDocument,
        working_order: &[PageModification],
    ) -> Option<Vec<Thumbnail>> {
        let ticket = self.ticket();
        self.render_with_ticket(ticket, source, working_order).await
    }

    /// Render the working order for `ticket`.
    ///
    /// Returns `None` if the ticket is superseded before the render completes.
    pub async fn render_with_ticket(
        &self,
        ticket: Ticket,
        source: &SourceDocument,
        working_order: &[PageModification],
    ) -> Option<Vec<Thumbnail>> {
        let working_order: Vec<PageModification> =
            working_order.iter().filter(|e| !e.deleted).copied().collect();
        let scale_key = self.scale.to_bits();
        let wanted: BTreeSet<usize> = working_order.iter().map(|e| e.original_index).collect();

        let mut rendered: HashMap<usize, ThumbnailImage> = HashMap::new();
        let mut missing = Vec::new();
        {
            let mut cache = self.cache.lock().await;
            for &index in &wanted {
                match cache.get(&(index, scale_key)) {
                    Some(raster) => {
                        rendered.insert(index, ThumbnailImage::Rendered(raster));
                    }
                    None => missing.push(index),
                }
            }
        }

        if !missing.is_empty() {
            log::debug!(
                "Rendering {} thumbnails ({} cached) for {:?}",
                missing.len(),
                rendered.len(),
                ticket
            );
        }

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for index in missing {
            let permits = Arc::clone(&permits);
            let rasterizer = Arc::clone(&self.rasterizer);
            let bytes = source.shared_bytes();
            let scale = self.scale;
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let result = tokio::task::spawn_blocking(move || {
                    rasterizer.render_page(&bytes, index, scale)
                })
                .await
                .map_err(EditError::from)
                .and_then(|r| r);
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if !self.is_current(ticket) {
                tasks.abort_all();
                log::debug!("Thumbnail render {:?} superseded, discarding", ticket);
                return None;
            }

            let (index, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    log::warn!("Thumbnail task failed: {}", e);
                    continue;
                }
            };
            let image = match result {
                Ok(raster) => {
                    let raster = Arc::new(raster);
                    self.cache
                        .lock()
                        .await
                        .insert((index, scale_key), Arc::clone(&raster));
                    ThumbnailImage::Rendered(raster)
                }
                Err(e) => {
                    log::warn!("Failed to render thumbnail for page {}: {}", index + 1, e);
                    ThumbnailImage::Placeholder {
                        reason: e.to_string(),
                    }
                }
            };
            rendered.insert(index, image);
        }

        if !self.is_current(ticket) {
            log::debug!("Thumbnail render {:?} superseded, discarding", ticket);
            return None;
        }

        let thumbnails = working_order
            .iter()
            .enumerate()
            .map(|(position, entry)| Thumbnail {
                position,
                original_index: entry.original_index,
                rotation: entry.rotation,
                image: rendered
                    .get(&entry.original_index)
                    .cloned()
                    .unwrap_or_else(|| ThumbnailImage::Placeholder {
                        reason: "render task did not complete".to_string(),
                    }),
            })
            .collect();
        Some(thumbnails)
    }
}

// =============================================================================
// Pdfium
// =============================================================================

#[cfg(feature = "pdfium")]
pub use pdfium::{PdfiumRasterizer, init_pdfium};

#[cfg(feature = "pdfium")]
mod pdfium {
    use super::{PageRasterizer, RasterImage};
    use crate::types::{EditError, Result};
    use pdfium_render::prelude::*;

    /// Pdfium is not thread-safe; renders are serialized through this lock
    static PDFIUM_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    /// Initialize Pdfium, trying the vendored library first, then falling back to system
    pub fn init_pdfium() -> std::result::Result<Pdfium, PdfiumError> {
        let vendor_path = std::env::current_dir().ok().and_then(|mut p| {
            p.push("vendor/pdfium/lib");
            if p.exists() { Some(p) } else { None }
        });

        if let Some(vendor_path) = vendor_path {
            if let Ok(binding) =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&vendor_path))
            {
                return Ok(Pdfium::new(binding));
            }
        }

        Pdfium::bind_to_system_library().map(Pdfium::new)
    }

    /// Rasterizer backed by the Pdfium library
    #[derive(Debug, Clone, Copy, Default)]
    pub struct PdfiumRasterizer;

    impl PageRasterizer for PdfiumRasterizer {
        fn render_page(&self, pdf: &[u8], page_index: usize, scale: f32) -> Result<RasterImage> {
            let _lock = PDFIUM_LOCK
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            let render = || -> std::result::Result<RasterImage, PdfiumError> {
                let pdfium = init_pdfium()?;
                let document = pdfium.load_pdf_from_byte_slice(pdf, None)?;
                let page = document.pages().get(page_index as u16)?;

                let config = PdfRenderConfig::new().scale_page_by_factor(scale);
                let bitmap = page.render_with_config(&config)?;

                Ok(RasterImage {
                    width: bitmap.width() as u32,
                    height: bitmap.height() as u32,
                    rgba: bitmap.as_rgba_bytes().to_vec(),
                })
            };

            render().map_err(|e| EditError::Render(e.to_string()))
        }
    }
}
