//! Shared constants for page compositing
//!
//! This module centralizes magic numbers used by the compositor and the
//! thumbnail renderer.

// =============================================================================
// Default Page Dimensions
// =============================================================================

/// Default page width in points (US Letter: 8.5" × 11")
pub const DEFAULT_PAGE_WIDTH_PT: f32 = 612.0;

/// Default page height in points (US Letter)
pub const DEFAULT_PAGE_HEIGHT_PT: f32 = 792.0;

/// Default page dimensions as tuple (width, height)
pub const DEFAULT_PAGE_DIMENSIONS: (f32, f32) = (DEFAULT_PAGE_WIDTH_PT, DEFAULT_PAGE_HEIGHT_PT);

// =============================================================================
// Text
// =============================================================================

/// Line advance for text containing explicit newlines, as a multiple of font size
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Approximate average glyph width ratios, used for alignment and underline
/// length since annotation text is laid out without font metrics.
pub const HELVETICA_CHAR_WIDTH_RATIO: f32 = 0.5;
pub const TIMES_CHAR_WIDTH_RATIO: f32 = 0.45;
pub const COURIER_CHAR_WIDTH_RATIO: f32 = 0.6;

/// Underline offset below the baseline, as a multiple of font size
pub const UNDERLINE_OFFSET_FACTOR: f32 = 0.12;

/// Underline stroke width, as a multiple of font size
pub const UNDERLINE_WIDTH_FACTOR: f32 = 0.06;

// =============================================================================
// Shapes
// =============================================================================

/// Stroke width for check and cross shapes (points)
pub const SHAPE_LINE_WIDTH: f32 = 2.0;

/// Stroke colour of checkmarks
pub const CHECK_COLOR: (f32, f32, f32) = (0.13, 0.77, 0.31);

/// Stroke colour of crosses
pub const CROSS_COLOR: (f32, f32, f32) = (0.93, 0.27, 0.27);

// =============================================================================
// Signature Placeholder
// =============================================================================

/// Label drawn when a signature image could not be embedded
pub const PLACEHOLDER_LABEL: &str = "Signature unavailable";

/// Border width of the placeholder box (points)
pub const PLACEHOLDER_BORDER_WIDTH: f32 = 1.0;

/// Maximum label size inside the placeholder box (points)
pub const PLACEHOLDER_MAX_FONT_SIZE: f32 = 10.0;

// =============================================================================
// Thumbnails
// =============================================================================

/// Scale used for sidebar thumbnails
pub const DEFAULT_THUMBNAIL_SCALE: f32 = 0.3;

/// Number of page rasterizations allowed in flight at once
pub const DEFAULT_THUMBNAIL_CONCURRENCY: usize = 4;

/// Maximum number of page rasters kept by a thumbnail renderer
pub const DEFAULT_THUMBNAIL_CACHE_PAGES: usize = 200;
