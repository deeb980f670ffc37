//! The editing session aggregate
//!
//! An [`EditorSession`] owns one source document together with its working
//! page order and annotations. Exports run on a snapshot taken by
//! [`EditorSession::begin_export`]; while that snapshot is alive the session
//! refuses mutations.

use crate::annotations::{Annotation, AnnotationId, AnnotationStore};
use crate::compose::composite;
use crate::options::EditorOptions;
use crate::source::SourceDocument;
use crate::tracker::PageModificationTracker;
use crate::types::*;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct EditorSession {
    source: SourceDocument,
    pages: PageModificationTracker,
    annotations: AnnotationStore,
    options: EditorOptions,
    exporting: Arc<AtomicBool>,
}

impl EditorSession {
    /// Start a session with the identity page order and no annotations
    pub fn new(source: SourceDocument, options: EditorOptions) -> Self {
        let pages = PageModificationTracker::new(source.page_count());
        Self {
            source,
            pages,
            annotations: AnnotationStore::new(),
            options,
            exporting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Load a PDF from disk and start a session for it
    pub async fn open(path: impl AsRef<Path>, options: EditorOptions) -> Result<Self> {
        options.validate()?;
        let source = SourceDocument::load(path).await?;
        Ok(Self::new(source, options))
    }

    /// Resume a session from previously captured state
    pub fn restore(
        source: SourceDocument,
        pages: PageModificationTracker,
        annotations: AnnotationStore,
        options: EditorOptions,
    ) -> Result<Self> {
        // Re-validate against this source, it may not be the one the state came from
        let pages = PageModificationTracker::from_entries(pages.entries().to_vec(), source.page_count())?;
        if let Some(index) = annotations.max_page_index() {
            if index >= source.page_count() {
                return Err(EditError::PageIndexOutOfRange {
                    index,
                    page_count: source.page_count(),
                });
            }
        }
        Ok(Self {
            source,
            pages,
            annotations,
            options,
            exporting: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn source(&self) -> &SourceDocument {
        &self.source
    }

    pub fn pages(&self) -> &PageModificationTracker {
        &self.pages
    }

    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting.load(Ordering::Acquire)
    }

    // =========================================================================
    // Page edits
    // =========================================================================

    pub fn reorder(&mut self, new_order: &[usize]) -> Result<()> {
        self.ensure_idle()?;
        self.pages.reorder(new_order)
    }

    pub fn delete(&mut self, positions: &[usize]) -> Result<()> {
        self.ensure_idle()?;
        self.pages.delete(positions)
    }

    pub fn rotate(&mut self, position: usize, delta: i32) -> Result<()> {
        self.ensure_idle()?;
        self.pages.rotate(position, delta)
    }

    pub fn duplicate(&mut self, position: usize) -> Result<usize> {
        self.ensure_idle()?;
        self.pages.duplicate(position)
    }

    // =========================================================================
    // Annotation edits
    // =========================================================================

    /// Store an annotation. Its source page must exist in the document.
    pub fn add_annotation(&mut self, annotation: impl Into<Annotation>) -> Result<AnnotationId> {
        self.ensure_idle()?;
        let annotation = annotation.into();
        self.check_source_page(annotation.source_page_index())?;
        Ok(self.annotations.add(annotation))
    }

    pub fn update_annotation(
        &mut self,
        id: AnnotationId,
        annotation: impl Into<Annotation>,
    ) -> Result<()> {
        self.ensure_idle()?;
        let annotation = annotation.into();
        self.check_source_page(annotation.source_page_index())?;
        self.annotations.update(id, annotation)
    }

    pub fn remove_annotation(&mut self, id: AnnotationId) -> Result<Annotation> {
        self.ensure_idle()?;
        self.annotations.remove(id)
    }

    pub fn clear_annotations(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.annotations.clear();
        Ok(())
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Snapshot the session for export.
    ///
    /// Fails with [`EditError::ExportInProgress`] if another job is alive.
    /// The session stays locked until the returned job is dropped or run.
    pub fn begin_export(&self) -> Result<ExportJob> {
        if self
            .exporting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(EditError::ExportInProgress);
        }

        Ok(ExportJob {
            source: self.source.clone(),
            pages: self.pages.clone(),
            annotations: self.annotations.clone(),
            options: self.options.clone(),
            _guard: ExportGuard(Arc::clone(&self.exporting)),
        })
    }

    /// Snapshot and composite in one step
    pub async fn export(&self) -> Result<Vec<u8>> {
        self.begin_export()?.run().await
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_exporting() {
            return Err(EditError::ExportInProgress);
        }
        Ok(())
    }

    fn check_source_page(&self, index: usize) -> Result<()> {
        if index >= self.source.page_count() {
            return Err(EditError::PageIndexOutOfRange {
                index,
                page_count: self.source.page_count(),
            });
        }
        Ok(())
    }
}

/// An export captured from a session.
///
/// Dropping the job without running it abandons the export.
#[derive(Debug)]
pub struct ExportJob {
    source: SourceDocument,
    pages: PageModificationTracker,
    annotations: AnnotationStore,
    options: EditorOptions,
    _guard: ExportGuard,
}

impl ExportJob {
    /// Pages the export will produce
    pub fn page_count(&self) -> usize {
        self.pages.visible_count()
    }

    pub async fn run(self) -> Result<Vec<u8>> {
        composite(&self.source, &self.pages, &self.annotations, &self.options).await
    }
}

#[derive(Debug)]
struct ExportGuard(Arc<AtomicBool>);

impl Drop for ExportGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
