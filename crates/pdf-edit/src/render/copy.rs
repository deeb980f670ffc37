//! Copying source pages into the output document
//!
//! Each copy produces a brand-new page object with its own copies of the
//! source content streams, so a source page that appears twice in the
//! working order is never aliased. Content streams keep their filters and
//! encoded bytes. Other objects reachable from the page (fonts, images,
//! forms) are deep copied once and shared through the cache.

use crate::constants::DEFAULT_PAGE_DIMENSIONS;
use crate::types::Result;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;

/// Attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Page keys rebuilt by the compositor rather than copied verbatim
const REBUILT_KEYS: [&[u8]; 6] = [
    b"Parent",
    b"Contents",
    b"Resources",
    b"MediaBox",
    b"CropBox",
    b"Rotate",
];

/// Maximum depth followed when resolving inherited attributes
const MAX_TREE_DEPTH: usize = 32;

/// A source page transplanted into the output document, not yet attached to
/// the output page tree.
pub(crate) struct CopiedPage {
    /// Remaining page entries (annotations, group, user unit, ...)
    pub dict: Dictionary,
    /// Inline resources dictionary, safe to extend per page
    pub resources: Dictionary,
    pub media_box: [f32; 4],
    pub crop_box: Option<Object>,
    /// The source page's own rotation, snapped to a multiple of 90
    pub rotate: i64,
    /// Page-local copies of the page's content streams, in drawing order
    pub contents: Vec<ObjectId>,
}

impl CopiedPage {
    pub fn width(&self) -> f32 {
        (self.media_box[2] - self.media_box[0]).abs()
    }

    pub fn height(&self) -> f32 {
        (self.media_box[3] - self.media_box[1]).abs()
    }
}

/// Copy a page from `source` into `output`.
pub(crate) fn copy_page(
    output: &mut Document,
    source: &Document,
    page_id: ObjectId,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> Result<CopiedPage> {
    let page_dict = source.get_dictionary(page_id)?;

    let mut dict = Dictionary::new();
    for (key, value) in page_dict.iter() {
        if REBUILT_KEYS.contains(&key.as_slice()) {
            continue;
        }
        if let Some(copied) = copy_object_deep(output, source, value, cache)? {
            dict.set(key.clone(), copied);
        }
    }

    let mut resources = match inherited(source, page_id, b"Resources")? {
        Some(obj) => match copy_object_deep(output, source, resolve(source, obj)?, cache)? {
            Some(Object::Dictionary(d)) => d,
            _ => Dictionary::new(),
        },
        None => Dictionary::new(),
    };
    inline_resource_maps(output, &mut resources);

    let media_box = match inherited(source, page_id, b"MediaBox")? {
        Some(obj) => parse_rect(resolve(source, obj)?).unwrap_or_else(default_media_box),
        None => default_media_box(),
    };

    let crop_box = match inherited(source, page_id, b"CropBox")? {
        Some(obj) => Some(resolve(source, obj)?.clone()),
        None => None,
    };

    let rotate = match inherited(source, page_id, b"Rotate")? {
        Some(obj) => snap_rotation(extract_number(resolve(source, obj)?).unwrap_or(0.0)),
        None => 0,
    };

    let contents = copy_page_contents(output, source, page_dict, cache)?;

    Ok(CopiedPage {
        dict,
        resources,
        media_box,
        crop_box,
        rotate,
        contents,
    })
}

/// Find an inheritable attribute on the page or its nearest ancestor.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Result<Option<&'a Object>> {
    debug_assert!(INHERITABLE_KEYS.contains(&key));

    let mut current = doc.get_dictionary(page_id)?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Ok(Some(value));
        }
        match current.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => current = doc.get_dictionary(*parent_id)?,
            _ => break,
        }
    }
    Ok(None)
}

/// Replace indirect /Font and /XObject maps with page-local copies.
///
/// Overlays add entries to these maps, and the referenced originals may be
/// shared with other pages.
fn inline_resource_maps(output: &Document, resources: &mut Dictionary) {
    for key in [b"Font".as_slice(), b"XObject".as_slice()] {
        let target = match resources.get(key) {
            Ok(Object::Reference(id)) => *id,
            _ => continue,
        };
        if let Ok(Object::Dictionary(map)) = output.get_object(target) {
            let map = map.clone();
            resources.set(key, Object::Dictionary(map));
        }
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

/// Default MediaBox for US Letter size
fn default_media_box() -> [f32; 4] {
    [0.0, 0.0, DEFAULT_PAGE_DIMENSIONS.0, DEFAULT_PAGE_DIMENSIONS.1]
}

fn parse_rect(obj: &Object) -> Option<[f32; 4]> {
    let arr = obj.as_array().ok()?;
    if arr.len() < 4 {
        return None;
    }
    Some([
        extract_number(&arr[0])?,
        extract_number(&arr[1])?,
        extract_number(&arr[2])?,
        extract_number(&arr[3])?,
    ])
}

/// Round a /Rotate value to the nearest quarter turn in `0..360`.
fn snap_rotation(degrees: f32) -> i64 {
    let quarter_turns = (degrees / 90.0).round() as i64;
    (quarter_turns * 90).rem_euclid(360)
}

/// Extract numeric value from a PDF object
pub(crate) fn extract_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

// =============================================================================
// Page Content Extraction
// =============================================================================

/// Copy every content stream of a page as a new object.
///
/// Streams are copied per page rather than through the shared cache. Their
/// bytes are never decoded, so filters lopdf cannot decode survive intact.
fn copy_page_contents(
    output: &mut Document,
    source: &Document,
    page_dict: &Dictionary,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Vec<ObjectId>> {
    let mut streams = Vec::new();
    match page_dict.get(b"Contents") {
        Ok(contents) => collect_content_streams(source, contents, &mut streams)?,
        Err(_) => return Ok(Vec::new()), // No content = blank page
    }

    let mut copied = Vec::with_capacity(streams.len());
    for stream in streams {
        let encoded = stream.dict.has(b"Filter");
        let stream = Stream {
            dict: copy_dictionary(output, source, &stream.dict, cache)?,
            content: stream.content.clone(),
            allows_compression: stream.allows_compression && !encoded,
            start_position: None,
        };
        copied.push(output.add_object(Object::Stream(stream)));
    }
    Ok(copied)
}

fn collect_content_streams<'a>(
    doc: &'a Document,
    contents: &'a Object,
    streams: &mut Vec<&'a Stream>,
) -> Result<()> {
    match contents {
        Object::Reference(id) => match doc.get_object(*id)? {
            Object::Stream(stream) => streams.push(stream),
            Object::Array(arr) => push_stream_refs(doc, arr, streams)?,
            _ => {}
        },
        Object::Array(arr) => push_stream_refs(doc, arr, streams)?,
        Object::Stream(stream) => streams.push(stream),
        _ => {}
    }
    Ok(())
}

fn push_stream_refs<'a>(
    doc: &'a Document,
    refs: &'a [Object],
    streams: &mut Vec<&'a Stream>,
) -> Result<()> {
    for obj in refs {
        if let Object::Reference(id) = obj {
            if let Ok(stream) = doc.get_object(*id)?.as_stream() {
                streams.push(stream);
            }
        }
    }
    Ok(())
}

// =============================================================================
// Deep Copy
// =============================================================================

/// Deep copy an object from source to output document, following references.
///
/// References into the source page tree (page and pages nodes) are dropped:
/// they would drag the entire source tree along and are rebuilt by the
/// compositor. `None` means the value was dropped.
pub(crate) fn copy_object_deep(
    output: &mut Document,
    source: &Document,
    obj: &Object,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Option<Object>> {
    match obj {
        Object::Reference(id) => {
            if let Some(&new_id) = cache.get(id) {
                return Ok(Some(Object::Reference(new_id)));
            }

            let referenced = match source.get_object(*id) {
                Ok(o) => o,
                // Dangling references are treated as null by readers
                Err(_) => return Ok(None),
            };
            if is_page_tree_node(referenced) {
                return Ok(None);
            }

            // Reserve the id first so reference cycles terminate
            let new_id = output.new_object_id();
            cache.insert(*id, new_id);
            let copied = copy_object_deep(output, source, referenced, cache)?.unwrap_or(Object::Null);
            output.objects.insert(new_id, copied);

            Ok(Some(Object::Reference(new_id)))
        }
        Object::Dictionary(dict) => Ok(Some(Object::Dictionary(copy_dictionary(
            output, source, dict, cache,
        )?))),
        Object::Array(arr) => {
            let mut new_arr = Vec::with_capacity(arr.len());
            for item in arr {
                new_arr.push(copy_object_deep(output, source, item, cache)?.unwrap_or(Object::Null));
            }
            Ok(Some(Object::Array(new_arr)))
        }
        Object::Stream(stream) => Ok(Some(Object::Stream(Stream {
            dict: copy_dictionary(output, source, &stream.dict, cache)?,
            content: stream.content.clone(),
            allows_compression: stream.allows_compression,
            start_position: None,
        }))),
        // Primitive types: just clone
        _ => Ok(Some(obj.clone())),
    }
}

fn copy_dictionary(
    output: &mut Document,
    source: &Document,
    dict: &Dictionary,
    cache: &mut HashMap<ObjectId, ObjectId>,
) -> Result<Dictionary> {
    let mut new_dict = Dictionary::new();
    for (key, value) in dict.iter() {
        if let Some(copied) = copy_object_deep(output, source, value, cache)? {
            new_dict.set(key.clone(), copied);
        }
    }
    Ok(new_dict)
}

fn is_page_tree_node(obj: &Object) -> bool {
    let dict = match obj.as_dict() {
        Ok(d) => d,
        Err(_) => return false,
    };
    matches!(
        dict.get(b"Type"),
        Ok(Object::Name(name)) if name.as_slice() == b"Page" || name.as_slice() == b"Pages"
    )
}
