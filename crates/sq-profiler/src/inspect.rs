//! Structural walk over a parsed PDF.

use lopdf::content::Content;
use lopdf::{Dictionary, Document as PdfDocument, Object, ObjectId};

/// Resources may be inherited from ancestor page-tree nodes.
const MAX_INHERIT_DEPTH: usize = 32;

const TEXT_OPERATORS: &[&str] = &["Tj", "TJ", "'", "\""];

/// Per-page findings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    pub images: u32,
    pub largest_image_pixels: u64,
    pub has_text: bool,
}

pub(crate) fn resolve<'a>(pdf: &'a PdfDocument, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => pdf.get_object(*id).ok(),
        other => Some(other),
    }
}

fn dict_entry<'a>(pdf: &'a PdfDocument, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|obj| resolve(pdf, obj))
}

fn dict_i64(pdf: &PdfDocument, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict_entry(pdf, dict, key).and_then(|obj| obj.as_i64().ok())
}

pub(crate) fn is_image(dict: &Dictionary) -> bool {
    dict.get(b"Subtype")
        .and_then(|obj| obj.as_name())
        .map(|name| name == b"Image")
        .unwrap_or(false)
}

/// Resolve the effective `/Resources` dictionary for a page.
pub fn page_resources(pdf: &PdfDocument, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = pdf.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Some(res) = dict_entry(pdf, node, b"Resources") {
            return res.as_dict().ok();
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = pdf.get_dictionary(parent).ok()?;
    }
    None
}

/// Inspect one page, looking at no more than `sample_limit` XObjects.
pub fn inspect_page(pdf: &PdfDocument, page_id: ObjectId, sample_limit: usize) -> PageStats {
    let mut stats = PageStats::default();

    let xobjects = page_resources(pdf, page_id)
        .and_then(|res| dict_entry(pdf, res, b"XObject"))
        .and_then(|obj| obj.as_dict().ok());

    if let Some(xobjects) = xobjects {
        for (_, obj) in xobjects.iter().take(sample_limit) {
            let Some(stream) = resolve(pdf, obj).and_then(|o| o.as_stream().ok()) else {
                continue;
            };
            if !is_image(&stream.dict) {
                continue;
            }
            let width = dict_i64(pdf, &stream.dict, b"Width").unwrap_or(0).max(0) as u64;
            let height = dict_i64(pdf, &stream.dict, b"Height").unwrap_or(0).max(0) as u64;
            stats.images += 1;
            stats.largest_image_pixels = stats.largest_image_pixels.max(width.saturating_mul(height));
        }
    }

    stats.has_text = pdf
        .get_page_content(page_id)
        .ok()
        .and_then(|raw| Content::decode(&raw).ok())
        .map(|content| {
            content
                .operations
                .iter()
                .any(|op| TEXT_OPERATORS.contains(&op.operator.as_str()))
        })
        .unwrap_or(false);

    stats
}
