use thiserror::Error;

use crate::annotations::AnnotationId;

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Failed to load source PDF: {0}")]
    SourceLoad(String),
    #[error("Invalid page order: {0}")]
    InvalidOrder(String),
    #[error("Invalid rotation: {0} is not a multiple of 90 degrees")]
    InvalidRotation(i64),
    #[error("Page index {index} out of range (document has {page_count} pages)")]
    PageIndexOutOfRange { index: usize, page_count: usize },
    #[error("Failed to embed image: {0}")]
    ImageEmbed(String),
    #[error("Failed to render page: {0}")]
    Render(String),
    #[error("Failed to serialize PDF: {0}")]
    Serialize(String),
    #[error("No pages left to export")]
    NoPages,
    #[error("An export is in progress; the document cannot be modified")]
    ExportInProgress,
    #[error("Annotation not found: {0}")]
    AnnotationNotFound(AnnotationId),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, EditError>;

/// One slot of the working page order.
///
/// Slots are never physically removed; a deleted slot stays in the list as a
/// tombstone so positions held by the UI remain valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageModification {
    /// Index of the source page rendered by this slot (0-based)
    pub original_index: usize,
    /// Rotation added on top of the source page's own /Rotate
    #[cfg_attr(feature = "serde", serde(default))]
    pub rotation: u16,
    #[cfg_attr(feature = "serde", serde(default))]
    pub deleted: bool,
}

impl PageModification {
    /// Identity slot for a source page
    pub fn new(original_index: usize) -> Self {
        Self {
            original_index,
            rotation: 0,
            deleted: false,
        }
    }
}

/// Normalize any multiple of 90 into `0..360`.
pub fn normalize_rotation(degrees: i64) -> Result<u16> {
    if degrees % 90 != 0 {
        return Err(EditError::InvalidRotation(degrees));
    }
    Ok(degrees.rem_euclid(360) as u16)
}

/// Whether a rotation swaps the width/height pairing of a page
pub fn is_quarter_turn(degrees: u16) -> bool {
    degrees % 180 == 90
}
