//! Splits page-aligned document text into overlapping, page-traceable
//! chunks sized for LLM context windows.
//!
//! Downstream terminology mining calls an LLM with a bounded context
//! window; chunks must stay under a token budget, carry enough trailing
//! overlap that terms spanning a boundary are not lost, and remain
//! traceable to source pages for citation.

use serde::{Deserialize, Serialize};

/// Approximate characters per token. This is a documented approximation,
/// not a real tokenizer; it materially changes output and must stay
/// stable for golden-file comparisons.
pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

/// Upper bound on the boundary-seeking lookback window, in characters.
pub const DEFAULT_LOOKBACK_CAP: usize = 2000;

/// Fraction of the chunk size searched backward for a break point.
pub const DEFAULT_LOOKBACK_FRACTION: f64 = 0.15;

/// Hard cap on chunking iterations. Guards against any arithmetic edge
/// case producing zero forward progress; reaching it is a defect, not a
/// success path.
const MAX_ITERATIONS: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Token budget per chunk.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Tokens of trailing context repeated at the start of the next chunk.
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
    #[serde(default = "default_lookback_cap")]
    pub lookback_cap: usize,
    #[serde(default = "default_lookback_fraction")]
    pub lookback_fraction: f64,
}

fn default_max_tokens() -> usize {
    4000
}

fn default_overlap_tokens() -> usize {
    500
}

fn default_chars_per_token() -> usize {
    DEFAULT_CHARS_PER_TOKEN
}

fn default_lookback_cap() -> usize {
    DEFAULT_LOOKBACK_CAP
}

fn default_lookback_fraction() -> f64 {
    DEFAULT_LOOKBACK_FRACTION
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap_tokens(),
            chars_per_token: default_chars_per_token(),
            lookback_cap: default_lookback_cap(),
            lookback_fraction: default_lookback_fraction(),
        }
    }
}

impl ChunkerConfig {
    fn chunk_size_chars(&self) -> usize {
        self.max_tokens * self.chars_per_token
    }

    fn overlap_chars(&self) -> usize {
        self.overlap_tokens * self.chars_per_token
    }

    fn lookback_chars(&self) -> usize {
        let fraction = (self.chunk_size_chars() as f64 * self.lookback_fraction) as usize;
        self.lookback_cap.min(fraction)
    }
}

/// One page of input text, as persisted by extraction.
#[derive(Debug, Clone)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
}

/// A bounded, overlapping slice of the flattened document text.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    /// 1-based; sequence order is significant.
    pub chunk_id: u32,
    pub text: String,
    /// Page numbers whose span overlaps this chunk, sorted ascending.
    pub page_range: Vec<u32>,
    pub token_estimate: usize,
}

/// Half-open range `[start, end)` a page occupies in the flattened buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSpan {
    pub page_number: u32,
    pub start: usize,
    pub end: usize,
}

/// Flattens pages into one buffer with normalized line endings and a
/// blank-line separator between consecutive pages, recording where each
/// page lands.
pub fn flatten_pages(pages: &[PageText]) -> (String, Vec<PageSpan>) {
    let mut buffer = String::new();
    let mut spans = Vec::with_capacity(pages.len());

    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            buffer.push_str("\n\n");
        }
        let normalized = page.text.replace("\r\n", "\n");
        let start = buffer.len();
        buffer.push_str(&normalized);
        spans.push(PageSpan {
            page_number: page.page_number,
            start,
            end: buffer.len(),
        });
    }

    (buffer, spans)
}

/// Splits `pages` into ordered, overlapping chunks.
///
/// Every byte of the flattened text falls in at least one chunk; chunk ids
/// are 1-based and strictly increasing. Empty input yields an empty Vec; a
/// document shorter than the chunk size yields exactly one chunk covering
/// the full page set.
pub fn chunk_document(pages: &[PageText], config: &ChunkerConfig) -> Vec<Chunk> {
    if pages.is_empty() {
        return Vec::new();
    }

    let (buffer, spans) = flatten_pages(pages);
    if buffer.is_empty() {
        return Vec::new();
    }

    let chunk_size = config.chunk_size_chars().max(1);
    let overlap = config.overlap_chars();
    let lookback = config.lookback_chars();
    let len = buffer.len();

    let mut chunks = Vec::new();
    let mut cursor = 0usize;
    let mut iterations = 0usize;

    while cursor < len {
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            tracing::warn!(
                iterations = MAX_ITERATIONS,
                cursor,
                buffer_len = len,
                "chunking hit the iteration safety cap; emitting partial result"
            );
            break;
        }

        let mut end = floor_char_boundary(&buffer, (cursor + chunk_size).min(len));

        // Not the final chunk: seek a natural break inside the lookback
        // window, preferring paragraph > sentence > line breaks.
        if end < len {
            if let Some(adjusted) = seek_break(&buffer, cursor, end, lookback) {
                end = adjusted;
            }
        }

        let text = &buffer[cursor..end];
        let page_range = pages_overlapping(&spans, cursor, end);
        let token_estimate = text.len().div_ceil(config.chars_per_token.max(1));

        chunks.push(Chunk {
            chunk_id: chunks.len() as u32 + 1,
            text: text.to_string(),
            page_range,
            token_estimate,
        });

        if end >= len {
            break;
        }

        let next = floor_char_boundary(&buffer, end.saturating_sub(overlap));
        // Overlap would cause non-progress (chunk smaller than its own
        // overlap); force the cursor forward instead.
        cursor = if next <= cursor { end } else { next };
    }

    chunks
}

/// Searches backward within the lookback window before `end` for the best
/// break point: double newline, then `". "`, then single newline. Returns
/// the position just after the last occurrence of the first marker class
/// found, or None when no marker occurs in the window.
fn seek_break(buffer: &str, cursor: usize, end: usize, lookback: usize) -> Option<usize> {
    let window_start = end.saturating_sub(lookback).max(cursor);
    let window_start = ceil_char_boundary(buffer, window_start);
    if window_start >= end {
        return None;
    }
    let window = &buffer[window_start..end];

    for (marker, skip) in [("\n\n", 2), (". ", 2), ("\n", 1)] {
        if let Some(pos) = window.rfind(marker) {
            let adjusted = window_start + pos + skip;
            // A break at or before the cursor would yield an empty chunk.
            if adjusted > cursor && adjusted < end {
                return Some(adjusted);
            }
            return None;
        }
    }

    None
}

/// Page numbers whose `[start, end)` range overlaps `[cursor, end)`,
/// sorted ascending.
fn pages_overlapping(spans: &[PageSpan], start: usize, end: usize) -> Vec<u32> {
    let mut range: Vec<u32> = spans
        .iter()
        .filter(|s| start < s.end && end > s.start)
        .map(|s| s.page_number)
        .collect();
    range.sort_unstable();
    range
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    i = i.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i.min(s.len())
}
