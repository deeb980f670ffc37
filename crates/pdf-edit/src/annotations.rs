//! User annotations and their per-session store
//!
//! Annotations are keyed by the *source* page they were placed on, so
//! reordering pages never rewrites them. Geometry is stored in UI space
//! (top-left origin) and is not validated here.

use crate::constants::{
    COURIER_CHAR_WIDTH_RATIO, HELVETICA_CHAR_WIDTH_RATIO, TIMES_CHAR_WIDTH_RATIO,
};
use crate::types::*;
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// =============================================================================
// Colour
// =============================================================================

/// 8-bit RGB colour, serialized as `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `rrggbb`. Anything else is black.
    pub fn from_hex(hex: &str) -> Self {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Self::BLACK;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).unwrap_or(0);
        Self::new(channel(0), channel(2), channel(4))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Channels scaled into `0.0..=1.0` for PDF colour operators
    pub fn normalized(self) -> (f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        )
    }
}

impl From<String> for Rgb {
    fn from(hex: String) -> Self {
        Rgb::from_hex(&hex)
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_hex()
    }
}

// =============================================================================
// Fonts
// =============================================================================

/// Standard font faces available to text annotations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FontFace {
    #[default]
    Helvetica,
    TimesRoman,
    Courier,
}

impl FontFace {
    /// Map a UI font family name onto a face. Unknown names fall back to
    /// Helvetica.
    pub fn lookup(family: &str) -> Self {
        match family.trim() {
            "Arial" | "Helvetica" => FontFace::Helvetica,
            "Times New Roman" | "Times" | "Georgia" => FontFace::TimesRoman,
            "Courier New" | "Courier" => FontFace::Courier,
            other => {
                log::debug!("Unsupported font family {:?}, using Helvetica", other);
                FontFace::Helvetica
            }
        }
    }

    /// Standard-14 BaseFont name for the requested style
    pub fn base_font(self, bold: bool, italic: bool) -> &'static str {
        match (self, bold, italic) {
            (FontFace::Helvetica, false, false) => "Helvetica",
            (FontFace::Helvetica, true, false) => "Helvetica-Bold",
            (FontFace::Helvetica, false, true) => "Helvetica-Oblique",
            (FontFace::Helvetica, true, true) => "Helvetica-BoldOblique",
            (FontFace::TimesRoman, false, false) => "Times-Roman",
            (FontFace::TimesRoman, true, false) => "Times-Bold",
            (FontFace::TimesRoman, false, true) => "Times-Italic",
            (FontFace::TimesRoman, true, true) => "Times-BoldItalic",
            (FontFace::Courier, false, false) => "Courier",
            (FontFace::Courier, true, false) => "Courier-Bold",
            (FontFace::Courier, false, true) => "Courier-Oblique",
            (FontFace::Courier, true, true) => "Courier-BoldOblique",
        }
    }

    pub fn char_width_ratio(self) -> f32 {
        match self {
            FontFace::Helvetica => HELVETICA_CHAR_WIDTH_RATIO,
            FontFace::TimesRoman => TIMES_CHAR_WIDTH_RATIO,
            FontFace::Courier => COURIER_CHAR_WIDTH_RATIO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

// =============================================================================
// Annotation Kinds
// =============================================================================

fn default_font_family() -> String {
    "Helvetica".to_string()
}

fn default_font_size() -> f32 {
    12.0
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TextAnnotation {
    #[cfg_attr(feature = "serde", serde(alias = "page_index"))]
    pub source_page_index: usize,
    pub x: f32,
    pub y: f32,
    pub text: String,
    #[cfg_attr(feature = "serde", serde(default = "default_font_size"))]
    pub font_size: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub color: Rgb,
    #[cfg_attr(feature = "serde", serde(default = "default_font_family"))]
    pub font_family: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub bold: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub italic: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub underline: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub align: TextAlign,
}

impl TextAnnotation {
    /// Plain 12pt black Helvetica text
    pub fn new(source_page_index: usize, x: f32, y: f32, text: impl Into<String>) -> Self {
        Self {
            source_page_index,
            x,
            y,
            text: text.into(),
            font_size: default_font_size(),
            color: Rgb::BLACK,
            font_family: default_font_family(),
            bold: false,
            italic: false,
            underline: false,
            align: TextAlign::Left,
        }
    }

    pub fn face(&self) -> FontFace {
        FontFace::lookup(&self.font_family)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ShapeKind {
    Check,
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapeAnnotation {
    #[cfg_attr(feature = "serde", serde(alias = "page_index"))]
    pub source_page_index: usize,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: ShapeKind,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SignatureAnnotation {
    #[cfg_attr(feature = "serde", serde(alias = "page_index"))]
    pub source_page_index: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Encoded PNG (or JPEG) bytes
    pub image: Vec<u8>,
    /// Counter-clockwise rotation about the image's bottom-left corner
    #[cfg_attr(feature = "serde", serde(default))]
    pub rotation: f32,
}

/// Any annotation the compositor knows how to draw
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "lowercase"))]
pub enum Annotation {
    Text(TextAnnotation),
    Shape(ShapeAnnotation),
    Signature(SignatureAnnotation),
}

impl Annotation {
    pub fn source_page_index(&self) -> usize {
        match self {
            Annotation::Text(a) => a.source_page_index,
            Annotation::Shape(a) => a.source_page_index,
            Annotation::Signature(a) => a.source_page_index,
        }
    }
}

impl From<TextAnnotation> for Annotation {
    fn from(a: TextAnnotation) -> Self {
        Annotation::Text(a)
    }
}

impl From<ShapeAnnotation> for Annotation {
    fn from(a: ShapeAnnotation) -> Self {
        Annotation::Shape(a)
    }
}

impl From<SignatureAnnotation> for Annotation {
    fn from(a: SignatureAnnotation) -> Self {
        Annotation::Signature(a)
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnnotationId(pub u64);

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Overlays for a single source page, grouped in drawing order
#[derive(Debug, Default)]
pub struct PageAnnotations<'a> {
    pub text: Vec<&'a TextAnnotation>,
    pub shapes: Vec<&'a ShapeAnnotation>,
    pub signatures: Vec<&'a SignatureAnnotation>,
}

impl PageAnnotations<'_> {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.shapes.is_empty() && self.signatures.is_empty()
    }
}

/// The three annotation collections of an editing session.
///
/// Within a collection entries keep id (insertion) order; across collections
/// the drawing order is fixed by [`PageAnnotations`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationStore {
    text: BTreeMap<AnnotationId, TextAnnotation>,
    shapes: BTreeMap<AnnotationId, ShapeAnnotation>,
    signatures: BTreeMap<AnnotationId, SignatureAnnotation>,
    next_id: u64,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an annotation under a fresh id
    pub fn add(&mut self, annotation: impl Into<Annotation>) -> AnnotationId {
        let id = AnnotationId(self.next_id);
        self.next_id += 1;
        self.insert(id, annotation.into());
        id
    }

    pub fn remove(&mut self, id: AnnotationId) -> Result<Annotation> {
        if let Some(a) = self.text.remove(&id) {
            return Ok(Annotation::Text(a));
        }
        if let Some(a) = self.shapes.remove(&id) {
            return Ok(Annotation::Shape(a));
        }
        if let Some(a) = self.signatures.remove(&id) {
            return Ok(Annotation::Signature(a));
        }
        Err(EditError::AnnotationNotFound(id))
    }

    /// Replace the annotation stored under `id`, keeping the id.
    pub fn update(&mut self, id: AnnotationId, annotation: impl Into<Annotation>) -> Result<()> {
        self.remove(id)?;
        self.insert(id, annotation.into());
        Ok(())
    }

    pub fn get(&self, id: AnnotationId) -> Option<Annotation> {
        self.text
            .get(&id)
            .cloned()
            .map(Annotation::Text)
            .or_else(|| self.shapes.get(&id).copied().map(Annotation::Shape))
            .or_else(|| self.signatures.get(&id).cloned().map(Annotation::Signature))
    }

    pub fn by_page(&self, source_page_index: usize) -> PageAnnotations<'_> {
        PageAnnotations {
            text: self
                .text
                .values()
                .filter(|a| a.source_page_index == source_page_index)
                .collect(),
            shapes: self
                .shapes
                .values()
                .filter(|a| a.source_page_index == source_page_index)
                .collect(),
            signatures: self
                .signatures
                .values()
                .filter(|a| a.source_page_index == source_page_index)
                .collect(),
        }
    }

    /// Highest source page index referenced by any annotation
    pub fn max_page_index(&self) -> Option<usize> {
        let text = self.text.values().map(|a| a.source_page_index);
        let shapes = self.shapes.values().map(|a| a.source_page_index);
        let signatures = self.signatures.values().map(|a| a.source_page_index);
        text.chain(shapes).chain(signatures).max()
    }

    pub fn len(&self) -> usize {
        self.text.len() + self.shapes.len() + self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.shapes.clear();
        self.signatures.clear();
    }

    fn insert(&mut self, id: AnnotationId, annotation: Annotation) {
        match annotation {
            Annotation::Text(a) => {
                self.text.insert(id, a);
            }
            Annotation::Shape(a) => {
                self.shapes.insert(id, a);
            }
            Annotation::Signature(a) => {
                self.signatures.insert(id, a);
            }
        }
    }
}

impl<A: Into<Annotation>> FromIterator<A> for AnnotationStore {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        let mut store = AnnotationStore::new();
        for annotation in iter {
            store.add(annotation);
        }
        store
    }
}
