//! Document text extraction.
//!
//! The coordinator routes an uploaded document to one of two strategies:
//! a local parse for digitally-authored files, or the cloud
//! document-intelligence service for scanned/image content. Both return
//! the same page-aligned shape so chunking and persistence stay
//! branch-agnostic.

pub mod cloud;
pub mod density;
pub mod docx;
pub mod pdf;
pub mod plain;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::OcrServiceConfig;
use crate::error::ExtractError;
use crate::sanitize;

use cloud::CloudOcrExtractor;
use density::DocumentClass;

/// Input to extraction: either a file on disk or an in-memory buffer
/// (e.g. straight from a multipart upload).
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl DocumentSource {
    /// Normalizes to a byte buffer. A missing or unreadable path is an
    /// input error.
    pub fn into_bytes(self) -> Result<Vec<u8>, ExtractError> {
        match self {
            DocumentSource::Bytes(bytes) => Ok(bytes),
            DocumentSource::Path(path) => {
                std::fs::read(&path).map_err(|e| ExtractError::Input { path, source: e })
            }
        }
    }

    fn label(&self) -> String {
        match self {
            DocumentSource::Path(path) => sanitize::redact_path(path),
            DocumentSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

/// Supported upload file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Doc,
    Png,
    Jpg,
    Jpeg,
    Tiff,
    Bmp,
    Txt,
}

impl FileType {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::Doc),
            "png" => Some(Self::Png),
            "jpg" => Some(Self::Jpg),
            "jpeg" => Some(Self::Jpeg),
            "tiff" | "tif" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Doc => "doc",
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
            Self::Txt => "txt",
        }
    }

    /// Image formats have no local text layer and always go to the cloud.
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Png | Self::Jpg | Self::Jpeg | Self::Tiff | Self::Bmp)
    }
}

/// Which strategy produced a job's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    CloudOcr,
    PdfLocal,
    Docx,
    Plaintext,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CloudOcr => "cloud-ocr",
            Self::PdfLocal => "pdf-local",
            Self::Docx => "docx",
            Self::Plaintext => "plaintext",
        }
    }
}

/// A line with its bounding polygon, reported by the cloud service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLine {
    pub content: String,
    pub polygon: Vec<f64>,
}

/// Layout signals available on the cloud path only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLayout {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub unit: Option<String>,
    pub table_count: u32,
    pub paragraph_count: u32,
    pub lines: Vec<PageLine>,
}

/// One physical page of extracted text, 1-indexed.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub page_number: u32,
    pub text: String,
    pub layout: Option<PageLayout>,
}

/// Uniform result of either extraction branch.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub full_text: String,
    pub method: ExtractionMethod,
    pub pages: Vec<ExtractedPage>,
    /// Remote operation handle, set on the cloud path only.
    pub operation_id: Option<String>,
}

impl ExtractedDocument {
    fn from_pages(method: ExtractionMethod, mut pages: Vec<ExtractedPage>) -> Self {
        // A parser must not be assumed to yield pages in order.
        pages.sort_by_key(|p| p.page_number);
        let full_text = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Self {
            full_text,
            method,
            pages,
            operation_id: None,
        }
    }
}

/// Routes a document to the local or cloud extraction strategy and runs it.
pub struct ExtractionCoordinator {
    ocr: OcrServiceConfig,
    density_threshold: f64,
}

impl ExtractionCoordinator {
    pub fn new(ocr: OcrServiceConfig) -> Self {
        Self {
            ocr,
            density_threshold: density::DENSITY_THRESHOLD,
        }
    }

    /// Overrides the chars-per-page routing threshold.
    pub fn with_density_threshold(mut self, threshold: f64) -> Self {
        self.density_threshold = threshold;
        self
    }

    /// Extracts page-aligned text from the given source.
    ///
    /// PDFs are density-classified first (see [`density`]); a failed local
    /// probe is never surfaced, it only routes the document to the cloud.
    /// A parse failure *after* the probe chose the local branch is
    /// surfaced, since the probe already confirmed a usable text layer.
    pub async fn extract_text(
        &self,
        file_type: FileType,
        source: DocumentSource,
        cancel: &CancellationToken,
    ) -> Result<ExtractedDocument, ExtractError> {
        let label = source.label();
        let _span =
            tracing::info_span!("extract", file = %label, file_type = file_type.as_str())
                .entered();

        let bytes = source.into_bytes()?;

        match file_type {
            FileType::Txt => Ok(ExtractedDocument::from_pages(
                ExtractionMethod::Plaintext,
                plain::extract(&bytes),
            )),
            FileType::Docx | FileType::Doc => Ok(ExtractedDocument::from_pages(
                ExtractionMethod::Docx,
                docx::extract(&bytes)?,
            )),
            FileType::Pdf => {
                let measurement = density::probe_pdf(&bytes, self.density_threshold);
                info!(
                    num_pages = measurement.num_pages,
                    text_length = measurement.text_length,
                    density = measurement.density,
                    branch = match measurement.class {
                        DocumentClass::Digital => "local",
                        DocumentClass::ScannedOrHybrid => "cloud",
                    },
                    "density classification"
                );
                match measurement.class {
                    DocumentClass::Digital => Ok(ExtractedDocument::from_pages(
                        ExtractionMethod::PdfLocal,
                        pdf::extract(&bytes)?,
                    )),
                    DocumentClass::ScannedOrHybrid => self.extract_cloud(&bytes, cancel).await,
                }
            }
            // Remaining types are images: no local text layer exists.
            _ => {
                debug_assert!(file_type.is_image());
                info!(branch = "cloud", "image upload, no local text layer");
                self.extract_cloud(&bytes, cancel).await
            }
        }
    }

    async fn extract_cloud(
        &self,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<ExtractedDocument, ExtractError> {
        let extractor = CloudOcrExtractor::from_config(&self.ocr)?;
        extractor.extract(bytes, cancel).await
    }
}
