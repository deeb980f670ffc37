#![allow(dead_code)]

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::Cursor;

/// Letter-sized pages whose content names their source index
pub fn create_test_pdf(num_pages: usize) -> Document {
    let mut doc = Document::with_version("1.7");

    // Create page tree root ID
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for i in 0..num_pages {
        let content = format!("BT 72 720 Td (source-{}) Tj ET", i);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let page_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Resources", Object::Dictionary(Dictionary::new())),
            ("Contents", Object::Reference(content_id)),
        ]));
        kids.push(Object::Reference(page_id));
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(num_pages as i64)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));

    doc.trailer.set("Root", catalog_id);

    doc
}

pub fn create_test_pdf_bytes(num_pages: usize) -> Vec<u8> {
    to_bytes(create_test_pdf(num_pages))
}

pub fn to_bytes(mut doc: Document) -> Vec<u8> {
    let mut writer = Vec::new();
    doc.save_to(&mut writer).unwrap();
    writer
}

/// Output pages in order
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

/// Content streams of a page, in drawing order
pub fn content_stream_ids(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let page = doc.get_dictionary(page_id).unwrap();
    match page.get(b"Contents").unwrap() {
        Object::Reference(id) => vec![*id],
        Object::Array(refs) => refs.iter().map(|r| r.as_reference().unwrap()).collect(),
        other => panic!("unexpected /Contents {:?}", other),
    }
}

/// Decoded content of a page, all streams joined
pub fn page_content(doc: &Document, page_id: ObjectId) -> String {
    content_stream_ids(doc, page_id)
        .into_iter()
        .map(|id| {
            let stream = doc.get_object(id).unwrap().as_stream().unwrap();
            let bytes = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            String::from_utf8_lossy(&bytes).into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Which source page each output page was copied from
pub fn source_markers(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    page_ids(&doc)
        .into_iter()
        .map(|id| {
            let content = page_content(&doc, id);
            let start = content.find("(source-").unwrap() + 1;
            let end = start + content[start..].find(')').unwrap();
            content[start..end].to_string()
        })
        .collect()
}

pub fn page_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    doc.get_dictionary(page_id)
        .unwrap()
        .get(b"Rotate")
        .and_then(|r| r.as_i64())
        .unwrap_or(0)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_pixel(width, height, Rgba([20, 40, 200, 180]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub fn truncated_png() -> Vec<u8> {
    let bytes = png_bytes(8, 8);
    bytes[..bytes.len() / 2].to_vec()
}
