//! The immutable uploaded document

use crate::types::*;
use lopdf::Document;
use std::path::Path;
use std::sync::Arc;

/// Original PDF bytes plus the page count observed at load time.
///
/// Cloning is cheap: the bytes are shared, never copied.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    bytes: Arc<[u8]>,
    page_count: usize,
}

impl SourceDocument {
    /// Validate and wrap PDF bytes.
    ///
    /// Fails with [`EditError::SourceLoad`] for unparseable or encrypted input.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let bytes = bytes.into();
        let doc = parse(&bytes)?;
        let page_count = doc.get_pages().len();
        Ok(Self { bytes, page_count })
    }

    /// Read and validate a PDF file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes: Arc<[u8]> = tokio::fs::read(path.as_ref()).await?.into();
        let page_count = {
            let bytes = Arc::clone(&bytes);
            tokio::task::spawn_blocking(move || parse(&bytes).map(|d| d.get_pages().len()))
                .await??
        };
        Ok(Self { bytes, page_count })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Parse a fresh lopdf document from the source bytes
    pub(crate) fn parse(&self) -> Result<Document> {
        parse(&self.bytes)
    }
}

fn parse(bytes: &[u8]) -> Result<Document> {
    let doc = Document::load_mem(bytes).map_err(|e| EditError::SourceLoad(e.to_string()))?;
    // lopdf decrypts files that open with an empty user password and drops
    // /Encrypt from the trailer, leaving only the encryption state behind
    if doc.trailer.get(b"Encrypt").is_ok() || doc.encryption_state.is_some() {
        return Err(EditError::SourceLoad("document is encrypted".to_string()));
    }
    Ok(doc)
}
