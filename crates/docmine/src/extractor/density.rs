//! Text-density heuristic deciding the extraction strategy for PDFs.
//!
//! A digitally-authored PDF carries a text layer; a scanned one is mostly
//! images. Characters-per-page from a best-effort local parse separates
//! the two well enough to route between the cheap local parser and the
//! cloud OCR service. The threshold is a deliberate, tunable heuristic,
//! not a guarantee of precision.

use lopdf::Document;

/// Characters-per-page above which a PDF is treated as digital.
pub const DENSITY_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentClass {
    /// Local parse found a usable text layer.
    Digital,
    /// Little or no text layer; route to cloud OCR.
    ScannedOrHybrid,
}

#[derive(Debug, Clone, Copy)]
pub struct DensityMeasurement {
    pub num_pages: usize,
    pub text_length: usize,
    pub density: f64,
    pub class: DocumentClass,
}

/// Classifies from an already-measured page count and text length.
pub fn classify(num_pages: usize, text_length: usize, threshold: f64) -> DensityMeasurement {
    let density = if num_pages == 0 {
        0.0
    } else {
        text_length as f64 / num_pages as f64
    };
    let class = if density > threshold {
        DocumentClass::Digital
    } else {
        DocumentClass::ScannedOrHybrid
    };
    DensityMeasurement {
        num_pages,
        text_length,
        density,
        class,
    }
}

/// Best-effort local parse of a PDF buffer, yielding a classification.
///
/// A parse failure here must never abort the pipeline; it is only a
/// routing signal (density 0, cloud branch).
pub fn probe_pdf(bytes: &[u8], threshold: f64) -> DensityMeasurement {
    let (num_pages, text_length) = match Document::load_mem(bytes) {
        Ok(doc) => {
            let pages = doc.get_pages();
            let mut total = 0usize;
            for page_num in pages.keys() {
                if let Ok(text) = doc.extract_text(&[*page_num]) {
                    total += text.trim().len();
                }
            }
            (pages.len(), total)
        }
        Err(e) => {
            tracing::debug!(error = %e, "local parse failed during density probe");
            (0, 0)
        }
    };

    classify(num_pages, text_length, threshold)
}
