//! One-shot operations on PDF byte buffers
//!
//! Each operation loads the bytes, applies a single kind of edit and
//! composites a new PDF. Page-selection operations take 1-based page
//! numbers; index-addressed operations (rotation and every annotation's
//! page index) are 0-based.

use crate::annotations::{
    Annotation, AnnotationStore, ShapeAnnotation, SignatureAnnotation, TextAnnotation,
};
use crate::compose::composite;
use crate::options::EditorOptions;
use crate::source::SourceDocument;
use crate::tracker::PageModificationTracker;
use crate::types::*;

/// Emit the listed pages (1-based, repeats allowed) in the listed order
pub async fn reorder_pages(
    source: &[u8],
    page_numbers: &[usize],
    options: &EditorOptions,
) -> Result<Vec<u8>> {
    let source = load_source(source).await?;
    let entries = page_numbers
        .iter()
        .map(|&n| to_index(n, source.page_count()).map(PageModification::new))
        .collect::<Result<Vec<_>>>()?;
    let pages = PageModificationTracker::from_entries(entries, source.page_count())?;
    composite(&source, &pages, &AnnotationStore::new(), options).await
}

/// Drop the listed pages (1-based)
pub async fn delete_pages(
    source: &[u8],
    page_numbers: &[usize],
    options: &EditorOptions,
) -> Result<Vec<u8>> {
    let source = load_source(source).await?;
    let positions = page_numbers
        .iter()
        .map(|&n| to_index(n, source.page_count()))
        .collect::<Result<Vec<_>>>()?;
    let mut pages = PageModificationTracker::new(source.page_count());
    pages.delete(&positions)?;
    composite(&source, &pages, &AnnotationStore::new(), options).await
}

/// Rotate one page (0-based) by a multiple of 90 degrees
pub async fn rotate_page(
    source: &[u8],
    page_index: usize,
    delta: i32,
    options: &EditorOptions,
) -> Result<Vec<u8>> {
    let source = load_source(source).await?;
    let mut pages = PageModificationTracker::new(source.page_count());
    pages.rotate(page_index, delta)?;
    composite(&source, &pages, &AnnotationStore::new(), options).await
}

pub async fn add_text_annotations(
    source: &[u8],
    text: &[TextAnnotation],
    options: &EditorOptions,
) -> Result<Vec<u8>> {
    annotate(source, text.iter().cloned().map(Annotation::from), options).await
}

pub async fn add_shape_annotations(
    source: &[u8],
    shapes: &[ShapeAnnotation],
    options: &EditorOptions,
) -> Result<Vec<u8>> {
    annotate(source, shapes.iter().copied().map(Annotation::from), options).await
}

pub async fn add_signature_annotations(
    source: &[u8],
    signatures: &[SignatureAnnotation],
    options: &EditorOptions,
) -> Result<Vec<u8>> {
    annotate(source, signatures.iter().cloned().map(Annotation::from), options).await
}

/// Draw all three annotation kinds in one pass (text, then shapes, then
/// signatures)
pub async fn combine_annotations(
    source: &[u8],
    text: &[TextAnnotation],
    shapes: &[ShapeAnnotation],
    signatures: &[SignatureAnnotation],
    options: &EditorOptions,
) -> Result<Vec<u8>> {
    let all = text
        .iter()
        .cloned()
        .map(Annotation::from)
        .chain(shapes.iter().copied().map(Annotation::from))
        .chain(signatures.iter().cloned().map(Annotation::from));
    annotate(source, all, options).await
}

async fn annotate(
    source: &[u8],
    annotations: impl IntoIterator<Item = Annotation>,
    options: &EditorOptions,
) -> Result<Vec<u8>> {
    let annotations: AnnotationStore = annotations.into_iter().collect();
    let source = load_source(source).await?;
    let pages = PageModificationTracker::new(source.page_count());
    composite(&source, &pages, &annotations, options).await
}

async fn load_source(bytes: &[u8]) -> Result<SourceDocument> {
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || SourceDocument::from_bytes(bytes)).await?
}

fn to_index(page_number: usize, page_count: usize) -> Result<usize> {
    match page_number {
        0 => Err(EditError::InvalidOrder(
            "page numbers start at 1".to_string(),
        )),
        n if n > page_count => Err(EditError::PageIndexOutOfRange {
            index: n - 1,
            page_count,
        }),
        n => Ok(n - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_index() {
        assert_eq!(to_index(1, 3).unwrap(), 0);
        assert_eq!(to_index(3, 3).unwrap(), 2);
        assert!(matches!(to_index(0, 3), Err(EditError::InvalidOrder(_))));
        assert!(matches!(
            to_index(4, 3),
            Err(EditError::PageIndexOutOfRange { index: 3, page_count: 3 })
        ));
    }
}
