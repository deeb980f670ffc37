//! Image XObjects for signature annotations

use crate::types::{EditError, Result};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::{DynamicImage, ImageFormat};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

/// A decoded raster ready to be written as an image XObject
#[derive(Debug, Clone)]
pub(crate) struct ImageXObject {
    pub width: u32,
    pub height: u32,
    /// "DeviceRGB" or "DeviceGray"
    pub color_space: &'static str,
    /// Zlib-compressed samples
    pub data: Vec<u8>,
    /// Zlib-compressed alpha samples, present when the source had transparency
    pub alpha: Option<Vec<u8>>,
}

impl ImageXObject {
    /// Decode PNG or JPEG bytes.
    ///
    /// Any other format, or bytes that fail to decode, is an
    /// [`EditError::ImageEmbed`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let format = image::guess_format(bytes)
            .map_err(|e| EditError::ImageEmbed(format!("unrecognized image data: {}", e)))?;
        if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
            return Err(EditError::ImageEmbed(format!(
                "unsupported image format {:?} (only PNG or JPEG allowed)",
                format
            )));
        }

        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| EditError::ImageEmbed(e.to_string()))?;
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(EditError::ImageEmbed("image has no pixels".to_string()));
        }

        let has_alpha = image.color().has_alpha();
        let is_gray = !image.color().has_color();

        let (samples, color_space) = if is_gray {
            (image.to_luma8().into_raw(), "DeviceGray")
        } else {
            (image.to_rgb8().into_raw(), "DeviceRGB")
        };

        let alpha = if has_alpha {
            Some(compress(&alpha_channel(&image))?)
        } else {
            None
        };

        Ok(Self {
            width,
            height,
            color_space,
            data: compress(&samples)?,
            alpha,
        })
    }

    /// Add the image (and its soft mask, if any) to `doc`.
    pub fn embed(self, doc: &mut Document) -> ObjectId {
        let mut dict = image_dict(self.width, self.height, self.color_space);

        if let Some(alpha) = self.alpha {
            let mask_dict = image_dict(self.width, self.height, "DeviceGray");
            let mask_id = doc.add_object(Stream::new(mask_dict, alpha).with_compression(false));
            dict.set("SMask", Object::Reference(mask_id));
        }

        doc.add_object(Stream::new(dict, self.data).with_compression(false))
    }
}

fn image_dict(width: u32, height: u32, color_space: &str) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.as_bytes().to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    dict
}

fn alpha_channel(image: &DynamicImage) -> Vec<u8> {
    image.to_rgba8().pixels().map(|p| p[3]).collect()
}

fn compress(raw: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use std::io::Cursor;

    fn png_bytes(alpha: u8) -> Vec<u8> {
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(4, 2, Rgba([10, 20, 30, alpha]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png_with_alpha() {
        let xobj = ImageXObject::decode(&png_bytes(128)).unwrap();
        assert_eq!((xobj.width, xobj.height), (4, 2));
        assert_eq!(xobj.color_space, "DeviceRGB");
        assert!(xobj.alpha.is_some());
    }

    #[test]
    fn test_truncated_png_is_rejected() {
        let bytes = png_bytes(255);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            ImageXObject::decode(truncated),
            Err(EditError::ImageEmbed(_))
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            ImageXObject::decode(b"definitely not an image"),
            Err(EditError::ImageEmbed(_))
        ));
    }
}
