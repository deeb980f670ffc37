use std::path::PathBuf;

mod worker;

// Re-export types from the engine crate
pub use pdf_edit::{
    Annotation, AnnotationId, EditorOptions, PageModification, PageRasterizer, Thumbnail,
};
pub use worker::worker_task;

/// Commands sent from UI to worker
#[derive(Debug)]
pub enum EditCommand {
    Open {
        path: PathBuf,
    },
    OpenBytes {
        bytes: Vec<u8>,
    },
    Reorder {
        doc_id: DocumentId,
        new_order: Vec<usize>,
    },
    Delete {
        doc_id: DocumentId,
        positions: Vec<usize>,
    },
    Rotate {
        doc_id: DocumentId,
        position: usize,
        delta: i32,
    },
    Duplicate {
        doc_id: DocumentId,
        position: usize,
    },
    AddAnnotation {
        doc_id: DocumentId,
        annotation: Annotation,
    },
    UpdateAnnotation {
        doc_id: DocumentId,
        id: AnnotationId,
        annotation: Annotation,
    },
    RemoveAnnotation {
        doc_id: DocumentId,
        id: AnnotationId,
    },
    /// Regenerate previews for the current working order (newest request wins)
    RenderThumbnails {
        doc_id: DocumentId,
    },
    Export {
        doc_id: DocumentId,
        output_path: PathBuf,
    },
    Close {
        doc_id: DocumentId,
    },
}

/// Updates sent from worker to UI
#[derive(Debug, Clone)]
pub enum EditUpdate {
    Opened {
        doc_id: DocumentId,
        page_count: usize,
    },
    /// The working order changed; `pages` excludes deleted slots
    PagesChanged {
        doc_id: DocumentId,
        pages: Vec<PageModification>,
    },
    AnnotationAdded {
        doc_id: DocumentId,
        id: AnnotationId,
    },
    AnnotationUpdated {
        doc_id: DocumentId,
        id: AnnotationId,
    },
    AnnotationRemoved {
        doc_id: DocumentId,
        id: AnnotationId,
    },
    ThumbnailsRendered {
        doc_id: DocumentId,
        thumbnails: Vec<Thumbnail>,
    },
    ExportComplete {
        doc_id: DocumentId,
        path: PathBuf,
        page_count: usize,
    },
    Closed {
        doc_id: DocumentId,
    },
    Error {
        message: String,
    },
}

/// Handle to an open editing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(pub u64);
