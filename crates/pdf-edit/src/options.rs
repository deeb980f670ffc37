use crate::constants::{
    DEFAULT_THUMBNAIL_CACHE_PAGES, DEFAULT_THUMBNAIL_CONCURRENCY, DEFAULT_THUMBNAIL_SCALE,
};
use crate::types::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What the compositor does with a signature image it cannot embed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SignatureFailurePolicy {
    /// Fail the whole export with [`EditError::ImageEmbed`]
    #[default]
    Abort,
    /// Draw a labelled box in place of the image and keep going
    Placeholder,
}

/// Editor configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EditorOptions {
    // Export
    pub signature_failure: SignatureFailurePolicy,
    pub compress_output: bool,

    // Thumbnails
    pub thumbnail_scale: f32,
    pub thumbnail_concurrency: usize,
    /// Rendered pages kept in memory across renders
    pub thumbnail_cache_pages: usize,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            signature_failure: SignatureFailurePolicy::Abort,
            compress_output: true,
            thumbnail_scale: DEFAULT_THUMBNAIL_SCALE,
            thumbnail_concurrency: DEFAULT_THUMBNAIL_CONCURRENCY,
            thumbnail_cache_pages: DEFAULT_THUMBNAIL_CACHE_PAGES,
        }
    }
}

impl EditorOptions {
    /// Load options from JSON file
    #[cfg(feature = "serde")]
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let options: Self = serde_json::from_slice(&bytes)
            .map_err(|e| EditError::Config(format!("Failed to parse config: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Save options to JSON file
    #[cfg(feature = "serde")]
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EditError::Config(format!("Failed to serialize config: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if !(self.thumbnail_scale.is_finite() && self.thumbnail_scale > 0.0) {
            return Err(EditError::Config(format!(
                "Thumbnail scale must be positive, got {}",
                self.thumbnail_scale
            )));
        }

        if self.thumbnail_concurrency == 0 {
            return Err(EditError::Config(
                "Thumbnail concurrency must be at least 1".to_string(),
            ));
        }

        if self.thumbnail_cache_pages == 0 {
            return Err(EditError::Config(
                "Thumbnail cache must hold at least 1 page".to_string(),
            ));
        }

        Ok(())
    }
}
