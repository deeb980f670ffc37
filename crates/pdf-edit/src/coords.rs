//! UI ⇄ PDF coordinate mapping
//!
//! The editor UI places annotations with the origin at the top-left corner and
//! y growing downward. PDF user space has its origin at the bottom-left and y
//! growing upward. Both share the x axis.

use crate::types::is_quarter_turn;

/// A point in either coordinate space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Flip a UI point into PDF space for a page of the given height.
#[inline]
pub fn to_pdf_space(x: f32, y: f32, page_height: f32) -> Point {
    Point::new(x, page_height - y)
}

/// Flip a PDF point back into UI space. Inverse of [`to_pdf_space`].
#[inline]
pub fn to_ui_space(x: f32, y: f32, page_height: f32) -> Point {
    Point::new(x, page_height - y)
}

/// Page size as it appears in the output, after rotation is applied.
///
/// Quarter turns swap width and height.
pub fn oriented_size(width: f32, height: f32, rotation: u16) -> (f32, f32) {
    if is_quarter_turn(rotation) {
        (height, width)
    } else {
        (width, height)
    }
}
