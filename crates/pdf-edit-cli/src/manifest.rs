//! JSON inputs for `annotate` and `compose`
//!
//! Annotations use the engine's JSON form. A signature may name an image
//! file with `image_path` instead of carrying its bytes inline.

use anyhow::{Context, Result, bail};
use pdf_edit::{Annotation, AnnotationStore, PageModification};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// A whole editing session: working order plus annotations
#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    /// Working order; omitted means every source page once, unrotated
    #[serde(default)]
    pub pages: Option<Vec<PageModification>>,
    #[serde(default)]
    pub annotations: Vec<Value>,
}

impl Manifest {
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))
    }

    /// Resolve image paths relative to `base_dir` and build the store
    pub async fn annotation_store(&self, base_dir: &Path) -> Result<AnnotationStore> {
        let mut store = AnnotationStore::new();
        for raw in &self.annotations {
            store.add(parse_annotation(raw.clone(), base_dir).await?);
        }
        Ok(store)
    }
}

/// Read a bare JSON array of annotations
pub async fn load_annotations(path: &Path) -> Result<AnnotationStore> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read annotations {}", path.display()))?;
    let annotations: Vec<Value> = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse annotations {}", path.display()))?;
    let manifest = Manifest {
        pages: None,
        annotations,
    };
    manifest.annotation_store(base_dir(path)).await
}

pub fn base_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

async fn parse_annotation(mut raw: Value, base_dir: &Path) -> Result<Annotation> {
    if let Some(obj) = raw.as_object_mut() {
        if let Some(image_path) = obj.remove("image_path") {
            let Some(image_path) = image_path.as_str() else {
                bail!("image_path must be a string");
            };
            let bytes = tokio::fs::read(base_dir.join(image_path))
                .await
                .with_context(|| format!("Failed to read signature image {}", image_path))?;
            obj.insert(
                "image".to_string(),
                Value::Array(bytes.into_iter().map(Value::from).collect()),
            );
        }
    }
    serde_json::from_value(raw).context("Invalid annotation")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_edit::ShapeKind;

    #[tokio::test]
    async fn test_image_path_is_inlined() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("sig.png"), [1u8, 2, 3]).await.unwrap();

        let raw = serde_json::json!({
            "kind": "signature",
            "page_index": 0,
            "x": 1, "y": 2, "width": 30, "height": 10,
            "image_path": "sig.png"
        });
        match parse_annotation(raw, dir.path()).await.unwrap() {
            Annotation::Signature(sig) => assert_eq!(sig.image, vec![1, 2, 3]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_manifest_pages_are_optional() {
        let manifest: Manifest = serde_json::from_str(
            r#"{ "annotations": [ { "kind": "shape", "page_index": 0, "x": 0, "y": 0, "size": 8, "type": "cross" } ] }"#,
        )
        .unwrap();
        assert!(manifest.pages.is_none());
        assert_eq!(manifest.annotations.len(), 1);

        let shape: Annotation = serde_json::from_value(manifest.annotations[0].clone()).unwrap();
        assert!(matches!(shape, Annotation::Shape(s) if s.kind == ShapeKind::Cross));
    }

    #[test]
    fn test_manifest_pages_parse() {
        let manifest: Manifest = serde_json::from_str(
            r#"{ "pages": [ { "original_index": 2, "rotation": 90 }, { "original_index": 0, "deleted": true } ] }"#,
        )
        .unwrap();
        let pages = manifest.pages.unwrap();
        assert_eq!(pages[0].rotation, 90);
        assert!(pages[1].deleted);
    }
}
