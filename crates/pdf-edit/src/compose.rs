//! Compositing - producing the final PDF
//!
//! The compositor is the only place where the three index spaces meet:
//! 1. Walk the working order, copying each slot's source page
//! 2. Add the slot's rotation on top of the page's own
//! 3. Draw the source page's annotations (text, then shapes, then signatures)
//! 4. Serialize the output once
//!
//! All of it happens on a fresh output document; nothing is written back to
//! the source.

use crate::annotations::{AnnotationStore, PageAnnotations};
use crate::coords::oriented_size;
use crate::options::{EditorOptions, SignatureFailurePolicy};
use crate::render::{CopiedPage, ImageXObject, Overlay, copy_page, standard_font_dict};
use crate::source::SourceDocument;
use crate::tracker::PageModificationTracker;
use crate::types::*;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::{BTreeMap, HashMap};

/// Build the output PDF for the current editing state.
///
/// All-or-nothing: any failure aborts the export and no bytes are returned.
/// The inputs are copied before the work moves off the async executor, so
/// callers may keep editing their own state while this runs.
pub async fn composite(
    source: &SourceDocument,
    pages: &PageModificationTracker,
    annotations: &AnnotationStore,
    options: &EditorOptions,
) -> Result<Vec<u8>> {
    options.validate()?;

    let source = source.clone();
    let working_order = pages.working_order();
    let annotations = annotations.clone();
    let options = options.clone();

    tokio::task::spawn_blocking(move || {
        composite_sync(&source, &working_order, &annotations, &options)
    })
    .await?
}

pub(crate) fn composite_sync(
    source: &SourceDocument,
    working_order: &[PageModification],
    annotations: &AnnotationStore,
    options: &EditorOptions,
) -> Result<Vec<u8>> {
    let doc = source.parse()?;
    let source_pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    let page_count = source_pages.len();

    for entry in working_order {
        if entry.original_index >= page_count {
            return Err(EditError::PageIndexOutOfRange {
                index: entry.original_index,
                page_count,
            });
        }
    }
    if let Some(index) = annotations.max_page_index() {
        if index >= page_count {
            return Err(EditError::PageIndexOutOfRange { index, page_count });
        }
    }
    if working_order.is_empty() {
        return Err(EditError::NoPages);
    }

    let mut compositor = Compositor::new(&doc, options);
    for entry in working_order {
        compositor.add_page(
            source_pages[entry.original_index],
            entry,
            annotations.by_page(entry.original_index),
        )?;
    }

    let bytes = compositor.finish()?;
    log::info!(
        "Composited {} pages ({} annotations, {} bytes)",
        working_order.len(),
        annotations.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Output document under construction
struct Compositor<'a> {
    source: &'a Document,
    options: &'a EditorOptions,
    output: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    /// Source object -> output object, shared across all copied pages
    copied: HashMap<ObjectId, ObjectId>,
    /// BaseFont -> shared font object
    fonts: BTreeMap<&'static str, ObjectId>,
    /// Encoded signature bytes -> embedded image, or the decode failure
    images: HashMap<&'a [u8], std::result::Result<ObjectId, String>>,
}

impl<'a> Compositor<'a> {
    fn new(source: &'a Document, options: &'a EditorOptions) -> Self {
        let mut output = Document::with_version("1.7");
        let pages_id = output.new_object_id();
        Self {
            source,
            options,
            output,
            pages_id,
            kids: Vec::new(),
            copied: HashMap::new(),
            fonts: BTreeMap::new(),
            images: HashMap::new(),
        }
    }

    fn add_page(
        &mut self,
        source_page: ObjectId,
        entry: &PageModification,
        annotations: PageAnnotations<'a>,
    ) -> Result<()> {
        let copied = copy_page(&mut self.output, self.source, source_page, &mut self.copied)?;
        let rotation = (copied.rotate + entry.rotation as i64).rem_euclid(360);
        let (_, height) = oriented_size(copied.width(), copied.height(), rotation as u16);

        let CopiedPage {
            mut dict,
            mut resources,
            media_box,
            crop_box,
            contents,
            ..
        } = copied;

        let contents = if annotations.is_empty() {
            contents
        } else {
            let overlay = self.draw_annotations(&resources, height, &annotations)?;
            let ops = overlay.finish(&mut resources, |base_font| {
                *self.fonts.entry(base_font).or_insert_with(|| {
                    self.output
                        .add_object(Object::Dictionary(standard_font_dict(base_font)))
                })
            });

            // Isolate the original graphics state from the overlay
            let mut wrapped = Vec::with_capacity(contents.len() + 3);
            wrapped.push(self.add_content(b"q\n".to_vec()));
            wrapped.extend(contents);
            wrapped.push(self.add_content(b"\nQ\n".to_vec()));
            wrapped.push(self.add_content(ops));
            wrapped
        };

        dict.set("Type", Object::Name(b"Page".to_vec()));
        dict.set("Parent", Object::Reference(self.pages_id));
        dict.set(
            "MediaBox",
            Object::Array(media_box.iter().map(|&v| Object::Real(v)).collect()),
        );
        if let Some(crop_box) = crop_box {
            dict.set("CropBox", crop_box);
        }
        if rotation != 0 {
            dict.set("Rotate", Object::Integer(rotation));
        }
        dict.set("Resources", Object::Dictionary(resources));
        match contents.as_slice() {
            [] => {}
            [single] => {
                dict.set("Contents", Object::Reference(*single));
            }
            many => {
                let refs = many.iter().map(|&id| Object::Reference(id)).collect();
                dict.set("Contents", Object::Array(refs));
            }
        }

        let page_id = self.output.add_object(Object::Dictionary(dict));
        self.kids.push(Object::Reference(page_id));
        Ok(())
    }

    fn add_content(&mut self, ops: Vec<u8>) -> ObjectId {
        self.output.add_object(Stream::new(Dictionary::new(), ops))
    }

    fn draw_annotations(
        &mut self,
        resources: &Dictionary,
        page_height: f32,
        annotations: &PageAnnotations<'a>,
    ) -> Result<Overlay> {
        let mut overlay = Overlay::new(resources, page_height);

        for text in &annotations.text {
            overlay.draw_text(text);
        }
        for shape in &annotations.shapes {
            overlay.draw_shape(shape);
        }
        for &signature in &annotations.signatures {
            match self.embed_image(&signature.image) {
                Ok(image_id) => overlay.draw_image(signature, image_id),
                Err(reason) => match self.options.signature_failure {
                    SignatureFailurePolicy::Abort => {
                        return Err(EditError::ImageEmbed(reason));
                    }
                    SignatureFailurePolicy::Placeholder => {
                        log::warn!(
                            "Signature on source page {} replaced by placeholder: {}",
                            signature.source_page_index,
                            reason
                        );
                        overlay.draw_placeholder(signature);
                    }
                },
            }
        }

        Ok(overlay)
    }

    /// Embed an image once per distinct byte string
    fn embed_image(&mut self, bytes: &'a [u8]) -> std::result::Result<ObjectId, String> {
        if let Some(result) = self.images.get(bytes) {
            return result.clone();
        }
        let result = match ImageXObject::decode(bytes) {
            Ok(image) => Ok(image.embed(&mut self.output)),
            Err(e) => Err(e.to_string()),
        };
        self.images.insert(bytes, result.clone());
        result
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        let count = self.kids.len() as i64;
        let pages_dict = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(self.kids)),
            ("Count", Object::Integer(count)),
        ]);
        self.output
            .objects
            .insert(self.pages_id, Object::Dictionary(pages_dict));

        let catalog_id = self.output.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]));
        self.output.trailer.set("Root", Object::Reference(catalog_id));

        if self.options.compress_output {
            self.output.compress();
        }

        let mut bytes = Vec::new();
        self.output
            .save_to(&mut bytes)
            .map_err(|e| EditError::Serialize(e.to_string()))?;
        Ok(bytes)
    }
}
