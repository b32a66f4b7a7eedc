//! Plaintext passthrough: the upload already is its own text layer.

use super::ExtractedPage;

pub fn extract(bytes: &[u8]) -> Vec<ExtractedPage> {
    vec![ExtractedPage {
        page_number: 1,
        text: String::from_utf8_lossy(bytes).into_owned(),
        layout: None,
    }]
}
