//! Annotation drawing for a single output page
//!
//! An [`Overlay`] accumulates content stream operators for one page together
//! with the font and image resources they refer to. Resource names are
//! chosen so they never collide with names already used by the page.

use crate::annotations::{ShapeAnnotation, ShapeKind, SignatureAnnotation, TextAlign, TextAnnotation};
use crate::constants::*;
use crate::coords::{Point, to_pdf_space};
use lopdf::{Dictionary, Object, ObjectId};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

pub(crate) struct Overlay {
    ops: String,
    page_height: f32,
    used_names: HashSet<Vec<u8>>,
    /// BaseFont -> resource name
    fonts: BTreeMap<&'static str, String>,
    /// Resource name -> image object
    images: BTreeMap<String, ObjectId>,
    next_name: usize,
}

impl Overlay {
    /// Start an overlay for a page whose output height is `page_height`.
    pub fn new(resources: &Dictionary, page_height: f32) -> Self {
        let mut used_names = HashSet::new();
        for category in [b"Font".as_slice(), b"XObject".as_slice()] {
            if let Ok(Object::Dictionary(dict)) = resources.get(category) {
                used_names.extend(dict.iter().map(|(k, _)| k.clone()));
            }
        }

        Self {
            ops: String::new(),
            page_height,
            used_names,
            fonts: BTreeMap::new(),
            images: BTreeMap::new(),
            next_name: 1,
        }
    }

    fn fresh_name(&mut self, prefix: &str) -> String {
        loop {
            let name = format!("{}{}", prefix, self.next_name);
            self.next_name += 1;
            if self.used_names.insert(name.as_bytes().to_vec()) {
                return name;
            }
        }
    }

    fn font_resource(&mut self, base_font: &'static str) -> String {
        if let Some(name) = self.fonts.get(base_font) {
            return name.clone();
        }
        let name = self.fresh_name("EdF");
        self.fonts.insert(base_font, name.clone());
        name
    }

    fn pdf_point(&self, x: f32, y: f32) -> Point {
        to_pdf_space(x, y, self.page_height)
    }

    // =========================================================================
    // Text
    // =========================================================================

    pub fn draw_text(&mut self, ann: &TextAnnotation) {
        if ann.text.is_empty() {
            return;
        }

        let face = ann.face();
        let font = self.font_resource(face.base_font(ann.bold, ann.italic));
        let (r, g, b) = ann.color.normalized();
        let origin = self.pdf_point(ann.x, ann.y);

        for (line_no, line) in ann.text.split('\n').enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let width = approximate_width(line, ann.font_size, face.char_width_ratio());
            let x = match ann.align {
                TextAlign::Left => origin.x,
                TextAlign::Center => origin.x - width / 2.0,
                TextAlign::Right => origin.x - width,
            };
            let y = origin.y - line_no as f32 * ann.font_size * LINE_HEIGHT_FACTOR;

            let _ = writeln!(
                self.ops,
                "BT /{} {} Tf {} {} {} rg {} {} Td <{}> Tj ET",
                font,
                ann.font_size,
                r,
                g,
                b,
                x,
                y,
                encode_win_ansi_hex(line)
            );

            if ann.underline {
                let underline_y = y - ann.font_size * UNDERLINE_OFFSET_FACTOR;
                let _ = writeln!(
                    self.ops,
                    "q {} {} {} RG {} w {} {} m {} {} l S Q",
                    r,
                    g,
                    b,
                    ann.font_size * UNDERLINE_WIDTH_FACTOR,
                    x,
                    underline_y,
                    x + width,
                    underline_y
                );
            }
        }
    }

    // =========================================================================
    // Shapes
    // =========================================================================

    pub fn draw_shape(&mut self, shape: &ShapeAnnotation) {
        let (x, y, s) = (shape.x, shape.y, shape.size);
        let (r, g, b) = match shape.kind {
            ShapeKind::Check => CHECK_COLOR,
            ShapeKind::Cross => CROSS_COLOR,
        };

        let _ = write!(self.ops, "q {} {} {} RG {} w ", r, g, b, SHAPE_LINE_WIDTH);
        match shape.kind {
            ShapeKind::Check => {
                // Short stroke down-right, then a long stroke up-right
                let start = self.pdf_point(x, y + s * 0.5);
                let valley = self.pdf_point(x + s * 0.3, y + s);
                let end = self.pdf_point(x + s, y);
                let _ = write!(
                    self.ops,
                    "{} {} m {} {} l {} {} l S ",
                    start.x, start.y, valley.x, valley.y, end.x, end.y
                );
            }
            ShapeKind::Cross => {
                let top_left = self.pdf_point(x, y);
                let bottom_right = self.pdf_point(x + s, y + s);
                let top_right = self.pdf_point(x + s, y);
                let bottom_left = self.pdf_point(x, y + s);
                let _ = write!(
                    self.ops,
                    "{} {} m {} {} l S {} {} m {} {} l S ",
                    top_left.x,
                    top_left.y,
                    bottom_right.x,
                    bottom_right.y,
                    top_right.x,
                    top_right.y,
                    bottom_left.x,
                    bottom_left.y
                );
            }
        }
        self.ops.push_str("Q\n");
    }

    // =========================================================================
    // Signatures
    // =========================================================================

    /// Draw an embedded image stretched to the signature's box.
    pub fn draw_image(&mut self, sig: &SignatureAnnotation, image_id: ObjectId) {
        let name = match self.images.iter().find(|(_, id)| **id == image_id) {
            Some((name, _)) => name.clone(),
            None => {
                let name = self.fresh_name("EdIm");
                self.images.insert(name.clone(), image_id);
                name
            }
        };

        // The UI anchors the image by its top-left corner
        let bottom_left = self.pdf_point(sig.x, sig.y + sig.height);
        let (w, h) = (sig.width, sig.height);

        if sig.rotation.abs() > f32::EPSILON {
            let (sin, cos) = sig.rotation.to_radians().sin_cos();
            let _ = writeln!(
                self.ops,
                "q {} {} {} {} {} {} cm /{} Do Q",
                w * cos,
                w * sin,
                -h * sin,
                h * cos,
                bottom_left.x,
                bottom_left.y,
                name
            );
        } else {
            let _ = writeln!(
                self.ops,
                "q {} 0 0 {} {} {} cm /{} Do Q",
                w, h, bottom_left.x, bottom_left.y, name
            );
        }
    }

    /// Draw a labelled box where a signature image could not be embedded.
    pub fn draw_placeholder(&mut self, sig: &SignatureAnnotation) {
        let font = self.font_resource("Helvetica");
        let bottom_left = self.pdf_point(sig.x, sig.y + sig.height);
        let (r, g, b) = CROSS_COLOR;

        let label_size = PLACEHOLDER_MAX_FONT_SIZE.min(sig.height.abs() * 0.5).max(1.0);
        let label_x = bottom_left.x + PLACEHOLDER_BORDER_WIDTH * 2.0;
        let label_y = bottom_left.y + (sig.height - label_size) / 2.0;

        let _ = writeln!(
            self.ops,
            "q {} {} {} RG {} w {} {} {} {} re S BT /{} {} Tf {} {} {} rg {} {} Td <{}> Tj ET Q",
            r,
            g,
            b,
            PLACEHOLDER_BORDER_WIDTH,
            bottom_left.x,
            bottom_left.y,
            sig.width,
            sig.height,
            font,
            label_size,
            r,
            g,
            b,
            label_x,
            label_y,
            encode_win_ansi_hex(PLACEHOLDER_LABEL)
        );
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Register the overlay's resources on the page and return its operators.
    ///
    /// `font_ids` resolves a BaseFont to the shared font object in the output.
    pub fn finish(
        self,
        resources: &mut Dictionary,
        mut font_ids: impl FnMut(&'static str) -> ObjectId,
    ) -> Vec<u8> {
        if !self.fonts.is_empty() {
            let mut font_dict = match resources.get(b"Font") {
                Ok(Object::Dictionary(d)) => d.clone(),
                _ => Dictionary::new(),
            };
            for (base_font, name) in &self.fonts {
                font_dict.set(name.as_bytes().to_vec(), Object::Reference(font_ids(base_font)));
            }
            resources.set("Font", Object::Dictionary(font_dict));
        }

        if !self.images.is_empty() {
            let mut xobject_dict = match resources.get(b"XObject") {
                Ok(Object::Dictionary(d)) => d.clone(),
                _ => Dictionary::new(),
            };
            for (name, id) in &self.images {
                xobject_dict.set(name.as_bytes().to_vec(), Object::Reference(*id));
            }
            resources.set("XObject", Object::Dictionary(xobject_dict));
        }

        self.ops.into_bytes()
    }
}

/// Width estimate for a line of text without font metrics
pub(crate) fn approximate_width(text: &str, font_size: f32, char_width_ratio: f32) -> f32 {
    text.chars().count() as f32 * font_size * char_width_ratio
}

/// Encode text for a standard font with WinAnsiEncoding, as hex digits.
///
/// Characters outside the encoding are replaced with `?`.
pub(crate) fn encode_win_ansi_hex(text: &str) -> String {
    let mut hex = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        let _ = write!(hex, "{:02X}", win_ansi_byte(c));
    }
    hex
}

fn win_ansi_byte(c: char) -> u8 {
    match c {
        '\t' => b' ',
        ' '..='~' => c as u8,
        '\u{A0}'..='\u{FF}' => c as u32 as u8,
        '\u{20AC}' => 0x80,
        '\u{2026}' => 0x85,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        _ => b'?',
    }
}

/// Font dictionary for a standard-14 font
pub(crate) fn standard_font_dict(base_font: &str) -> Dictionary {
    Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(base_font.as_bytes().to_vec())),
        ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::Rgb;

    fn ops_of(overlay: Overlay) -> String {
        let mut resources = Dictionary::new();
        String::from_utf8(overlay.finish(&mut resources, |_| (99, 0))).unwrap()
    }

    #[test]
    fn test_win_ansi_encoding() {
        assert_eq!(encode_win_ansi_hex("Hi"), "4869");
        assert_eq!(encode_win_ansi_hex("é€"), "E980");
        assert_eq!(encode_win_ansi_hex("✓"), "3F");
    }

    #[test]
    fn test_text_is_flipped_against_page_height() {
        let mut overlay = Overlay::new(&Dictionary::new(), 792.0);
        let mut ann = TextAnnotation::new(0, 50.0, 100.0, "Hi");
        ann.color = Rgb::new(255, 0, 0);
        overlay.draw_text(&ann);

        let ops = ops_of(overlay);
        assert!(ops.contains("1 0 0 rg 50 692 Td <4869> Tj"), "{}", ops);
    }

    #[test]
    fn test_bold_italic_selects_variant_font() {
        let mut overlay = Overlay::new(&Dictionary::new(), 792.0);
        let mut ann = TextAnnotation::new(0, 0.0, 0.0, "x");
        ann.font_family = "Georgia".to_string();
        ann.bold = true;
        ann.italic = true;
        overlay.draw_text(&ann);

        let mut resources = Dictionary::new();
        let mut requested = Vec::new();
        overlay.finish(&mut resources, |base| {
            requested.push(base);
            (1, 0)
        });
        assert_eq!(requested, vec!["Times-BoldItalic"]);
    }

    #[test]
    fn test_underline_draws_stroke() {
        let mut overlay = Overlay::new(&Dictionary::new(), 100.0);
        let mut ann = TextAnnotation::new(0, 10.0, 10.0, "abcd");
        ann.underline = true;
        overlay.draw_text(&ann);
        let ops = ops_of(overlay);
        // Four chars of 12pt Helvetica at 0.5 ratio is 24pt wide
        assert!(ops.contains(" m 34 "), "{}", ops);
        assert!(ops.contains(" l S Q"), "{}", ops);
    }

    #[test]
    fn test_right_alignment_shifts_start() {
        let mut overlay = Overlay::new(&Dictionary::new(), 100.0);
        let mut ann = TextAnnotation::new(0, 100.0, 0.0, "ab");
        ann.align = TextAlign::Right;
        overlay.draw_text(&ann);
        assert!(ops_of(overlay).contains("88 100 Td"));
    }

    #[test]
    fn test_check_geometry() {
        let mut overlay = Overlay::new(&Dictionary::new(), 100.0);
        overlay.draw_shape(&ShapeAnnotation {
            source_page_index: 0,
            x: 10.0,
            y: 10.0,
            size: 20.0,
            kind: ShapeKind::Check,
        });
        let ops = ops_of(overlay);
        assert!(ops.contains("0.13 0.77 0.31 RG 2 w"));
        assert!(ops.contains("10 80 m 16 70 l 30 90 l S"), "{}", ops);
    }

    #[test]
    fn test_cross_geometry() {
        let mut overlay = Overlay::new(&Dictionary::new(), 100.0);
        overlay.draw_shape(&ShapeAnnotation {
            source_page_index: 0,
            x: 0.0,
            y: 0.0,
            size: 10.0,
            kind: ShapeKind::Cross,
        });
        let ops = ops_of(overlay);
        assert!(ops.contains("0.93 0.27 0.27 RG"));
        assert!(ops.contains("0 100 m 10 90 l S 10 100 m 0 90 l S"), "{}", ops);
    }

    #[test]
    fn test_resource_names_avoid_existing() {
        let mut fonts = Dictionary::new();
        fonts.set("EdF1", Object::Null);
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let mut overlay = Overlay::new(&resources, 100.0);
        overlay.draw_text(&TextAnnotation::new(0, 0.0, 0.0, "x"));
        let ops = String::from_utf8(overlay.finish(&mut resources, |_| (5, 0))).unwrap();

        assert!(ops.contains("/EdF2 12 Tf"));
        let font_dict = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(font_dict.has(b"EdF1"));
        assert!(font_dict.has(b"EdF2"));
    }

    #[test]
    fn test_image_placement_uses_top_left_anchor() {
        let mut overlay = Overlay::new(&Dictionary::new(), 792.0);
        let sig = SignatureAnnotation {
            source_page_index: 0,
            x: 100.0,
            y: 200.0,
            width: 150.0,
            height: 50.0,
            image: Vec::new(),
            rotation: 0.0,
        };
        overlay.draw_image(&sig, (7, 0));
        let ops = ops_of(overlay);
        assert!(ops.contains("q 150 0 0 50 100 542 cm /EdIm1 Do Q"), "{}", ops);
    }
}
