//! Cloud document-intelligence extraction for scanned/image documents.
//!
//! Submits the raw bytes as base64, then long-polls the returned
//! operation handle until the analysis completes. The service returns one
//! concatenated document-level `content` string; per-page text is
//! *derived* by resolving each page's `{offset, length}` spans into that
//! string — this indirection is the service's contract and is preserved
//! here.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::OcrServiceConfig;
use crate::error::ExtractError;

use super::{ExtractedDocument, ExtractedPage, ExtractionMethod, PageLayout, PageLine};

/// Maximum length of an error body echoed into error messages.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Header carrying the API key.
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

fn truncate_error_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let cut = body
            .char_indices()
            .take_while(|(i, _)| *i < MAX_ERROR_BODY_LENGTH)
            .map(|(i, c)| i + c.len_utf8())
            .last()
            .unwrap_or(0);
        format!("{}... (truncated)", &body[..cut])
    } else {
        body.to_string()
    }
}

/// Response envelope of the operation-status endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    content: String,
    #[serde(default)]
    pages: Vec<OcrPage>,
    #[serde(default)]
    tables: Vec<OcrTable>,
    #[serde(default)]
    paragraphs: Vec<OcrParagraph>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OcrPage {
    page_number: u32,
    #[serde(default)]
    spans: Vec<OcrSpan>,
    #[serde(default)]
    lines: Vec<OcrLine>,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
    #[serde(default)]
    unit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OcrSpan {
    offset: usize,
    length: usize,
}

#[derive(Debug, Deserialize)]
struct OcrLine {
    #[serde(default)]
    content: String,
    #[serde(default)]
    polygon: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OcrTable {
    #[serde(default)]
    bounding_regions: Vec<OcrBoundingRegion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OcrParagraph {
    #[serde(default)]
    bounding_regions: Vec<OcrBoundingRegion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OcrBoundingRegion {
    page_number: u32,
}

/// Client for the cloud OCR service.
pub struct CloudOcrExtractor {
    client: Client,
    endpoint: String,
    api_key: String,
    model_id: String,
    api_version: String,
    poll_interval: Duration,
    poll_max_attempts: u32,
}

impl CloudOcrExtractor {
    /// Fails with a configuration error when the endpoint or key is absent.
    pub fn from_config(config: &OcrServiceConfig) -> Result<Self, ExtractError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or(ExtractError::MissingConfig("endpoint"))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or(ExtractError::MissingConfig("api_key"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            model_id: config.model_id.clone(),
            api_version: config.api_version.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            poll_max_attempts: config.poll_max_attempts.max(1),
        })
    }

    /// Submits the document and polls until analysis completes.
    ///
    /// Polling is bounded: `poll_max_attempts` at `poll_interval` apart.
    /// If `cancel` fires mid-poll the remote operation may still complete
    /// on its own; the caller gets [`ExtractError::Cancelled`] and decides
    /// whether to retry.
    pub async fn extract(
        &self,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<ExtractedDocument, ExtractError> {
        let operation_url = self.submit(bytes).await?;
        let operation_id = parse_operation_id(&operation_url);
        debug!(operation_id = operation_id.as_deref().unwrap_or("<unparsed>"), "analysis submitted");

        let result = self.poll(&operation_url, cancel).await?;
        let mut document = build_document(result)?;
        document.operation_id = operation_id;
        Ok(document)
    }

    async fn submit(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        let url = format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            self.endpoint, self.model_id, self.api_version
        );
        let body = serde_json::json!({ "base64Source": BASE64.encode(bytes) });

        let response = self
            .client
            .post(&url)
            .header(KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::RemoteService(format!(
                "analyze submission rejected ({}): {}",
                status,
                truncate_error_body(&body)
            )));
        }

        response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ExtractError::RemoteService(
                    "analyze response carried no Operation-Location header".to_string(),
                )
            })
    }

    async fn poll(
        &self,
        operation_url: &str,
        cancel: &CancellationToken,
    ) -> Result<AnalyzeResult, ExtractError> {
        for attempt in 1..=self.poll_max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(attempt, "poll cancelled by caller");
                    return Err(ExtractError::Cancelled);
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            let response = self
                .client
                .get(operation_url)
                .header(KEY_HEADER, &self.api_key)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ExtractError::RemoteService(format!(
                    "operation status request failed ({}): {}",
                    status,
                    truncate_error_body(&body)
                )));
            }

            let operation: AnalyzeOperation = response.json().await?;
            match operation.status.as_str() {
                "succeeded" => {
                    return operation.analyze_result.ok_or(ExtractError::EmptyResult);
                }
                "failed" => {
                    let detail = operation
                        .error
                        .map(|e| truncate_error_body(&e.to_string()))
                        .unwrap_or_else(|| "no error detail".to_string());
                    return Err(ExtractError::RemoteService(format!(
                        "analysis failed: {}",
                        detail
                    )));
                }
                other => {
                    debug!(attempt, status = other, "analysis still running");
                }
            }
        }

        warn!(
            attempts = self.poll_max_attempts,
            "poll budget exhausted before the operation completed"
        );
        Err(ExtractError::RemoteService(format!(
            "operation did not complete within {} poll attempts",
            self.poll_max_attempts
        )))
    }
}

/// Extracts the result id from an Operation-Location URL
/// (`.../analyzeResults/{id}?api-version=...`).
fn parse_operation_id(url: &str) -> Option<String> {
    let path = url.split('?').next().unwrap_or(url);
    let id = path.rsplit('/').next()?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Maps the service result onto the uniform extraction shape.
fn build_document(result: AnalyzeResult) -> Result<ExtractedDocument, ExtractError> {
    if result.content.is_empty() && result.pages.is_empty() {
        return Err(ExtractError::EmptyResult);
    }

    let mut pages: Vec<ExtractedPage> = result
        .pages
        .iter()
        .map(|page| {
            let text = derive_page_text(&result.content, &page.spans);
            let layout = PageLayout {
                width: page.width,
                height: page.height,
                unit: page.unit.clone(),
                table_count: count_regions(&result.tables, page.page_number),
                paragraph_count: paragraph_regions(&result.paragraphs, page.page_number),
                lines: page
                    .lines
                    .iter()
                    .map(|l| PageLine {
                        content: l.content.clone(),
                        polygon: l.polygon.clone(),
                    })
                    .collect(),
            };
            ExtractedPage {
                page_number: page.page_number,
                text,
                layout: Some(layout),
            }
        })
        .collect();
    pages.sort_by_key(|p| p.page_number);

    Ok(ExtractedDocument {
        full_text: result.content,
        method: ExtractionMethod::CloudOcr,
        pages,
        operation_id: None,
    })
}

/// Concatenates the substrings addressed by a page's spans. Spans
/// reference offsets into the document-level content string; out-of-range
/// or boundary-splitting spans are skipped rather than panicking.
fn derive_page_text(content: &str, spans: &[OcrSpan]) -> String {
    let mut text = String::new();
    for span in spans {
        match content.get(span.offset..span.offset + span.length) {
            Some(slice) => text.push_str(slice),
            None => {
                warn!(
                    offset = span.offset,
                    length = span.length,
                    content_len = content.len(),
                    "span does not address a valid content range; skipping"
                );
            }
        }
    }
    text
}

fn count_regions(tables: &[OcrTable], page_number: u32) -> u32 {
    tables
        .iter()
        .filter(|t| t.bounding_regions.iter().any(|r| r.page_number == page_number))
        .count() as u32
}

fn paragraph_regions(paragraphs: &[OcrParagraph], page_number: u32) -> u32 {
    paragraphs
        .iter()
        .filter(|p| p.bounding_regions.iter().any(|r| r.page_number == page_number))
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, Method::POST, MockServer};
    use serde_json::json;

    fn test_config(server: &MockServer) -> OcrServiceConfig {
        OcrServiceConfig {
            endpoint: Some(server.base_url()),
            api_key: Some("test-key".to_string()),
            poll_interval_secs: 0,
            poll_max_attempts: 5,
            ..OcrServiceConfig::default()
        }
    }

    fn operation_url(server: &MockServer) -> String {
        format!(
            "{}/documentintelligence/documentModels/prebuilt-layout/analyzeResults/op-123?api-version=2024-11-30",
            server.base_url()
        )
    }

    const ANALYZE_PATH: &str = "/documentintelligence/documentModels/prebuilt-layout:analyze";
    const RESULT_PATH: &str =
        "/documentintelligence/documentModels/prebuilt-layout/analyzeResults/op-123";

    #[test]
    fn test_missing_endpoint_is_configuration_error() {
        let config = OcrServiceConfig {
            api_key: Some("key".to_string()),
            ..OcrServiceConfig::default()
        };
        let result = CloudOcrExtractor::from_config(&config);
        assert!(matches!(result, Err(ExtractError::MissingConfig("endpoint"))));
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let config = OcrServiceConfig {
            endpoint: Some("https://ocr.local".to_string()),
            ..OcrServiceConfig::default()
        };
        let result = CloudOcrExtractor::from_config(&config);
        assert!(matches!(result, Err(ExtractError::MissingConfig("api_key"))));
    }

    #[test]
    fn test_parse_operation_id() {
        assert_eq!(
            parse_operation_id("https://x/analyzeResults/abc-123?api-version=1"),
            Some("abc-123".to_string())
        );
        assert_eq!(parse_operation_id("https://x/analyzeResults/abc"), Some("abc".to_string()));
    }

    #[test]
    fn test_derive_page_text_skips_invalid_spans() {
        let spans = vec![
            OcrSpan { offset: 0, length: 5 },
            OcrSpan { offset: 100, length: 5 },
            OcrSpan { offset: 6, length: 5 },
        ];
        assert_eq!(derive_page_text("Hello world", &spans), "Helloworld");
    }

    #[tokio::test]
    async fn test_successful_extraction_derives_pages_from_spans() {
        let server = MockServer::start_async().await;

        let submit = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(ANALYZE_PATH)
                    .query_param("api-version", "2024-11-30")
                    .header(KEY_HEADER, "test-key")
                    .body_contains("base64Source");
                then.status(202)
                    .header("Operation-Location", operation_url(&server));
            })
            .await;

        let poll = server
            .mock_async(|when, then| {
                when.method(GET).path(RESULT_PATH).header(KEY_HEADER, "test-key");
                then.status(200).json_body(json!({
                    "status": "succeeded",
                    "analyzeResult": {
                        "content": "First page text\nSecond page text",
                        "pages": [
                            {
                                "pageNumber": 2,
                                "spans": [{ "offset": 16, "length": 16 }],
                                "width": 8.5, "height": 11.0, "unit": "inch",
                                "lines": [
                                    { "content": "Second page text", "polygon": [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0] }
                                ]
                            },
                            {
                                "pageNumber": 1,
                                "spans": [{ "offset": 0, "length": 15 }],
                                "lines": []
                            }
                        ],
                        "tables": [
                            { "boundingRegions": [{ "pageNumber": 2 }] }
                        ],
                        "paragraphs": [
                            { "boundingRegions": [{ "pageNumber": 1 }] },
                            { "boundingRegions": [{ "pageNumber": 2 }] }
                        ]
                    }
                }));
            })
            .await;

        let extractor = CloudOcrExtractor::from_config(&test_config(&server)).unwrap();
        let doc = extractor
            .extract(b"scanned bytes", &CancellationToken::new())
            .await
            .unwrap();

        submit.assert_async().await;
        poll.assert_async().await;

        assert_eq!(doc.method, ExtractionMethod::CloudOcr);
        assert_eq!(doc.operation_id.as_deref(), Some("op-123"));
        assert_eq!(doc.full_text, "First page text\nSecond page text");
        // Pages are sorted even though the service returned them reversed.
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[0].page_number, 1);
        assert_eq!(doc.pages[0].text, "First page text");
        assert_eq!(doc.pages[1].text, "Second page text");

        let layout = doc.pages[1].layout.as_ref().unwrap();
        assert_eq!(layout.table_count, 1);
        assert_eq!(layout.paragraph_count, 1);
        assert_eq!(layout.unit.as_deref(), Some("inch"));
        assert_eq!(layout.lines.len(), 1);
        let layout_p1 = doc.pages[0].layout.as_ref().unwrap();
        assert_eq!(layout_p1.table_count, 0);
    }

    #[tokio::test]
    async fn test_rejected_submission_is_remote_service_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(ANALYZE_PATH);
                then.status(403).body("invalid subscription key");
            })
            .await;

        let extractor = CloudOcrExtractor::from_config(&test_config(&server)).unwrap();
        let result = extractor.extract(b"bytes", &CancellationToken::new()).await;
        match result {
            Err(ExtractError::RemoteService(msg)) => {
                assert!(msg.contains("403"), "unexpected message: {msg}");
            }
            other => panic!("expected RemoteService error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_operation_location_is_remote_service_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(ANALYZE_PATH);
                then.status(202);
            })
            .await;

        let extractor = CloudOcrExtractor::from_config(&test_config(&server)).unwrap();
        let result = extractor.extract(b"bytes", &CancellationToken::new()).await;
        match result {
            Err(ExtractError::RemoteService(msg)) => {
                assert!(msg.contains("Operation-Location"), "unexpected message: {msg}");
            }
            other => panic!("expected RemoteService error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_analysis_is_remote_service_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(ANALYZE_PATH);
                then.status(202)
                    .header("Operation-Location", operation_url(&server));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(RESULT_PATH);
                then.status(200).json_body(json!({
                    "status": "failed",
                    "error": { "code": "InvalidContent", "message": "unreadable" }
                }));
            })
            .await;

        let extractor = CloudOcrExtractor::from_config(&test_config(&server)).unwrap();
        let result = extractor.extract(b"bytes", &CancellationToken::new()).await;
        match result {
            Err(ExtractError::RemoteService(msg)) => {
                assert!(msg.contains("InvalidContent"), "unexpected message: {msg}");
            }
            other => panic!("expected RemoteService error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_result_is_empty_result_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(ANALYZE_PATH);
                then.status(202)
                    .header("Operation-Location", operation_url(&server));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(RESULT_PATH);
                then.status(200).json_body(json!({
                    "status": "succeeded",
                    "analyzeResult": { "content": "", "pages": [] }
                }));
            })
            .await;

        let extractor = CloudOcrExtractor::from_config(&test_config(&server)).unwrap();
        let result = extractor.extract(b"bytes", &CancellationToken::new()).await;
        assert!(matches!(result, Err(ExtractError::EmptyResult)));
    }

    #[tokio::test]
    async fn test_poll_budget_exhaustion_is_remote_service_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(ANALYZE_PATH);
                then.status(202)
                    .header("Operation-Location", operation_url(&server));
            })
            .await;
        let poll = server
            .mock_async(|when, then| {
                when.method(GET).path(RESULT_PATH);
                then.status(200).json_body(json!({ "status": "running" }));
            })
            .await;

        let mut config = test_config(&server);
        config.poll_max_attempts = 3;
        let extractor = CloudOcrExtractor::from_config(&config).unwrap();
        let result = extractor.extract(b"bytes", &CancellationToken::new()).await;

        match result {
            Err(ExtractError::RemoteService(msg)) => {
                assert!(msg.contains("3 poll attempts"), "unexpected message: {msg}");
            }
            other => panic!("expected RemoteService error, got {other:?}"),
        }
        assert_eq!(poll.hits_async().await, 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_polling() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(ANALYZE_PATH);
                then.status(202)
                    .header("Operation-Location", operation_url(&server));
            })
            .await;
        let poll = server
            .mock_async(|when, then| {
                when.method(GET).path(RESULT_PATH);
                then.status(200).json_body(json!({ "status": "running" }));
            })
            .await;

        let extractor = CloudOcrExtractor::from_config(&test_config(&server)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = extractor.extract(b"bytes", &cancel).await;

        assert!(matches!(result, Err(ExtractError::Cancelled)));
        assert_eq!(poll.hits_async().await, 0);
    }
}
