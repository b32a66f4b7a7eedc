//! Local PDF text extraction for digitally-authored documents.
//!
//! Walks each page's content stream tracking the text-matrix vertical
//! coordinate, then groups fragments sharing a vertical coordinate into
//! one line and inserts a line break on coordinate change. This is a
//! simple single-pass reading-order heuristic, not true layout analysis.

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};

use crate::error::ExtractError;

use super::ExtractedPage;

/// Fragments within this vertical distance are treated as one line.
const Y_TOLERANCE: f32 = 0.5;

/// Fallback line leading when the content stream never sets `TL`.
const DEFAULT_LEADING: f32 = 12.0;

/// A positioned run of text from a page content stream.
#[derive(Debug, Clone)]
struct TextFragment {
    y: f32,
    text: String,
}

/// Extracts page-aligned text. Unlike the density probe, failures here are
/// surfaced: the probe already confirmed this document has a usable text
/// layer, so a second failure is a genuine defect worth reporting.
pub fn extract(bytes: &[u8]) -> Result<Vec<ExtractedPage>, ExtractError> {
    let doc = Document::load_mem(bytes).map_err(|e| ExtractError::PdfParse(e.to_string()))?;

    let mut pages = Vec::new();
    for (page_number, page_id) in doc.get_pages() {
        let fragments = collect_fragments(&doc, page_id)?;
        let text = if fragments.is_empty() {
            // No recognizable text operators; fall back to the library's
            // own extraction for this page.
            doc.extract_text(&[page_number])
                .map(|t| t.trim_end().to_string())
                .unwrap_or_default()
        } else {
            assemble_lines(&fragments)
        };
        pages.push(ExtractedPage {
            page_number,
            text,
            layout: None,
        });
    }

    Ok(pages)
}

/// Collects positioned text fragments from one page's content stream.
fn collect_fragments(doc: &Document, page_id: ObjectId) -> Result<Vec<TextFragment>, ExtractError> {
    let data = doc
        .get_page_content(page_id)
        .map_err(|e| ExtractError::PdfParse(e.to_string()))?;
    let content = Content::decode(&data).map_err(|e| ExtractError::PdfParse(e.to_string()))?;

    let mut fragments = Vec::new();
    let mut y = 0.0f32;
    let mut leading = DEFAULT_LEADING;

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "BT" => y = 0.0,
            "Tm" => {
                if operands.len() == 6 {
                    y = float_operand(&operands[5]).unwrap_or(y);
                }
            }
            "Td" => {
                if operands.len() == 2 {
                    y += float_operand(&operands[1]).unwrap_or(0.0);
                }
            }
            "TD" => {
                if operands.len() == 2 {
                    let ty = float_operand(&operands[1]).unwrap_or(0.0);
                    leading = -ty;
                    y += ty;
                }
            }
            "TL" => {
                if let Some(l) = operands.first().and_then(float_operand) {
                    leading = l;
                }
            }
            "T*" => y -= leading,
            "Tj" => {
                if let Some(text) = operands.first().and_then(shown_text) {
                    fragments.push(TextFragment { y, text });
                }
            }
            "TJ" => {
                if let Some(text) = operands.first().and_then(shown_text) {
                    fragments.push(TextFragment { y, text });
                }
            }
            "'" => {
                y -= leading;
                if let Some(text) = operands.first().and_then(shown_text) {
                    fragments.push(TextFragment { y, text });
                }
            }
            "\"" => {
                y -= leading;
                if let Some(text) = operands.get(2).and_then(shown_text) {
                    fragments.push(TextFragment { y, text });
                }
            }
            _ => {}
        }
    }

    Ok(fragments)
}

/// Groups fragments with the same vertical coordinate into one line,
/// inserting a line break on coordinate change.
fn assemble_lines(fragments: &[TextFragment]) -> String {
    let mut text = String::new();
    let mut last_y: Option<f32> = None;

    for fragment in fragments {
        if let Some(prev) = last_y {
            if (fragment.y - prev).abs() > Y_TOLERANCE {
                text.push('\n');
            }
        }
        text.push_str(&fragment.text);
        last_y = Some(fragment.y);
    }

    text
}

fn float_operand(obj: &Object) -> Option<f32> {
    obj.as_float().ok()
}

/// Decodes the text shown by a `Tj`/`TJ`/`'`/`"` operand. `TJ` arrays mix
/// strings with kerning adjustments; only the strings carry text.
fn shown_text(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Object::Array(items) => {
            let mut text = String::new();
            for item in items {
                if let Object::String(bytes, _) = item {
                    text.push_str(&String::from_utf8_lossy(bytes));
                }
            }
            if text.is_empty() {
                None
            } else {
                Some(text)
            }
        }
        _ => None,
    }
}
