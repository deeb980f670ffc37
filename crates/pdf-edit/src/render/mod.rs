//! PDF rendering modules for compositing
//!
//! This module handles all PDF-specific operations:
//! - Copying source pages (and everything they reference) into the output
//! - Decoding and embedding signature images
//! - Building annotation overlay content streams

mod copy;
mod image;
mod overlay;

pub(crate) use copy::{CopiedPage, copy_page};
pub(crate) use image::ImageXObject;
pub(crate) use overlay::{Overlay, standard_font_dict};
