//! Job lifecycle orchestration.
//!
//! Owns the `DocumentJob`/`DocumentPage` records and the `extracting →
//! extracted` leg: it wraps the extraction coordinator, persists one page
//! row per returned page atomically, and records failure. Chunking is
//! exposed over the persisted pages; chunk persistence and mining belong
//! to downstream collaborators, which drive the remaining transitions
//! through [`JobService::complete_job`] / [`JobService::fail_job`].

pub mod status;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn};

use crate::chunker::{self, Chunk, ChunkerConfig, PageText, DEFAULT_CHARS_PER_TOKEN};
use crate::db::{self, job_repo, page_repo, Database};
use crate::error::{ExtractError, JobError};
use crate::extractor::{
    DocumentSource, ExtractedPage, ExtractionCoordinator, FileType,
};

pub use status::JobStatus;

/// Jobs and their pages are purged this long after creation.
pub const JOB_TTL_HOURS: i64 = 24;

/// Upload metadata for a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub file_name: String,
    pub file_type: FileType,
    pub file_size_bytes: i64,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub domain: Option<String>,
    pub project: Option<String>,
}

/// Orchestrates extraction and chunking for persisted jobs.
pub struct JobService {
    db: Database,
    coordinator: ExtractionCoordinator,
}

impl JobService {
    pub fn new(db: Database, coordinator: ExtractionCoordinator) -> Self {
        Self { db, coordinator }
    }

    /// Creates a job in `uploaded` with a 24-hour TTL.
    pub fn create_job(&self, new: NewJob) -> Result<job_repo::JobRow, JobError> {
        let now = Utc::now();
        let job = job_repo::JobRow {
            job_id: uuid::Uuid::new_v4().to_string(),
            file_name: new.file_name,
            file_type: new.file_type.as_str().to_string(),
            file_size_bytes: new.file_size_bytes,
            status: JobStatus::Uploaded.as_str().to_string(),
            ocr_operation_id: None,
            extraction_method: None,
            page_count: None,
            total_characters: None,
            total_token_estimate: None,
            source_lang: new.source_lang,
            target_lang: new.target_lang,
            domain: new.domain,
            project: new.project,
            error_message: None,
            created_at: db::timestamp(now),
            updated_at: db::timestamp(now),
            extracting_at: None,
            extracted_at: None,
            chunking_at: None,
            mining_at: None,
            completed_at: None,
            failed_at: None,
            expires_at: db::timestamp(now + Duration::hours(JOB_TTL_HOURS)),
        };
        job_repo::insert(&self.db, &job)?;
        info!(job_id = %job.job_id, file_type = %job.file_type, "job created");
        Ok(job)
    }

    pub fn get_job(&self, job_id: &str) -> Result<Option<job_repo::JobRow>, JobError> {
        Ok(job_repo::find_by_id(&self.db, job_id)?)
    }

    pub fn list_pages(&self, job_id: &str) -> Result<Vec<page_repo::PageRow>, JobError> {
        Ok(page_repo::list_by_job(&self.db, job_id)?)
    }

    /// Includes or excludes a page from downstream chunking.
    pub fn set_page_selected(
        &self,
        job_id: &str,
        page_number: u32,
        selected: bool,
    ) -> Result<(), JobError> {
        if page_repo::set_selected(&self.db, job_id, page_number, selected)? {
            Ok(())
        } else {
            Err(JobError::NotFound(format!("{job_id}/page {page_number}")))
        }
    }

    /// Runs extraction for a job and persists the result.
    ///
    /// Pages and job aggregates are written in one transaction: a failed
    /// attempt leaves no partial page set behind. Surfaced extraction
    /// errors move the job to `failed` with a human-readable message; a
    /// cancelled cloud poll leaves the job in `extracting` (safe to
    /// retry, since the remote operation may still complete).
    pub async fn run_extraction(
        &self,
        job_id: &str,
        source: DocumentSource,
        cancel: &CancellationToken,
    ) -> Result<job_repo::JobRow, JobError> {
        let mut job = job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        let _span = info_span!("run_extraction", job_id = %job.job_id).entered();

        let file_type = FileType::from_extension(&job.file_type).ok_or_else(|| {
            JobError::InvalidTransition {
                from: job.status.clone(),
                to: format!("extracting unsupported type '{}'", job.file_type),
            }
        })?;

        // A job left in `extracting` by a cancelled attempt may be retried
        // without a transition.
        if JobStatus::parse(&job.status) != Some(JobStatus::Extracting) {
            self.transition(&mut job, JobStatus::Extracting)?;
            job_repo::update(&self.db, &job)?;
        }

        let document = match self.coordinator.extract_text(file_type, source, cancel).await {
            Ok(document) => document,
            Err(ExtractError::Cancelled) => {
                // The remote operation may still complete; keep the job
                // retryable instead of failing it.
                warn!(job_id = %job.job_id, "extraction cancelled; job left in extracting");
                return Err(JobError::Extract(ExtractError::Cancelled));
            }
            Err(e) => {
                let message = e.to_string();
                self.transition(&mut job, JobStatus::Failed)?;
                job.error_message = Some(message);
                job_repo::update(&self.db, &job)?;
                return Err(JobError::Extract(e));
            }
        };

        let pages: Vec<page_repo::PageRow> = document
            .pages
            .iter()
            .map(|p| build_page_row(&job.job_id, p))
            .collect();

        job.extraction_method = Some(document.method.as_str().to_string());
        job.ocr_operation_id = document.operation_id.clone();
        job.page_count = Some(pages.len() as i64);
        job.total_characters = Some(pages.iter().map(|p| p.char_count).sum());
        job.total_token_estimate = Some(pages.iter().map(|p| p.token_estimate).sum());
        self.transition(&mut job, JobStatus::Extracted)?;

        job_repo::record_extraction(&self.db, &job, &pages)?;
        info!(
            job_id = %job.job_id,
            method = document.method.as_str(),
            page_count = pages.len(),
            "extraction recorded"
        );
        Ok(job)
    }

    /// Chunks a job's selected pages, driving `extracted → chunking →
    /// mining`. The returned chunks are handed to the downstream mining
    /// step; persisting them is its concern, not ours.
    pub fn chunk_job(
        &self,
        job_id: &str,
        config: &ChunkerConfig,
    ) -> Result<Vec<Chunk>, JobError> {
        let mut job = job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        let _span = info_span!("chunk_job", job_id = %job.job_id).entered();

        self.transition(&mut job, JobStatus::Chunking)?;
        job_repo::update(&self.db, &job)?;

        let pages: Vec<PageText> = page_repo::selected_pages(&self.db, job_id)?
            .into_iter()
            .map(|p| PageText {
                page_number: p.page_number,
                text: p.clean_text,
            })
            .collect();

        let chunks = chunker::chunk_document(&pages, config);

        self.transition(&mut job, JobStatus::Mining)?;
        job_repo::update(&self.db, &job)?;
        info!(job_id = %job.job_id, chunk_count = chunks.len(), "chunking finished");
        Ok(chunks)
    }

    /// Marks the externally-run mining step finished.
    pub fn complete_job(&self, job_id: &str) -> Result<job_repo::JobRow, JobError> {
        let mut job = job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        self.transition(&mut job, JobStatus::Completed)?;
        job_repo::update(&self.db, &job)?;
        Ok(job)
    }

    /// Fails a job from any in-flight state with a message.
    pub fn fail_job(&self, job_id: &str, message: &str) -> Result<job_repo::JobRow, JobError> {
        let mut job = job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        self.transition(&mut job, JobStatus::Failed)?;
        job.error_message = Some(message.to_string());
        job_repo::update(&self.db, &job)?;
        Ok(job)
    }

    /// Deletes jobs (and their pages) whose 24-hour TTL has elapsed.
    pub fn purge_expired(&self) -> Result<u64, JobError> {
        self.purge_expired_as_of(&db::now_timestamp())
    }

    /// Purge variant with an explicit cutoff timestamp, for schedulers
    /// that batch their sweeps.
    pub fn purge_expired_as_of(&self, cutoff: &str) -> Result<u64, JobError> {
        let purged = job_repo::purge_expired(&self.db, cutoff)?;
        if purged > 0 {
            info!(purged, "expired jobs purged");
        }
        Ok(purged)
    }

    /// Applies a transition, stamping the phase timestamp. Does not write
    /// to the database; callers persist the row when their unit of work
    /// is complete.
    fn transition(&self, job: &mut job_repo::JobRow, to: JobStatus) -> Result<(), JobError> {
        let from = JobStatus::parse(&job.status).ok_or_else(|| JobError::InvalidTransition {
            from: job.status.clone(),
            to: to.as_str().to_string(),
        })?;
        if !from.can_transition(to) {
            return Err(JobError::InvalidTransition {
                from: job.status.clone(),
                to: to.as_str().to_string(),
            });
        }

        let now = db::now_timestamp();
        job.status = to.as_str().to_string();
        job.updated_at = now.clone();
        match to {
            JobStatus::Extracting => job.extracting_at = Some(now),
            JobStatus::Extracted => job.extracted_at = Some(now),
            JobStatus::Chunking => job.chunking_at = Some(now),
            JobStatus::Mining => job.mining_at = Some(now),
            JobStatus::Completed => job.completed_at = Some(now),
            JobStatus::Failed => job.failed_at = Some(now),
            JobStatus::Uploaded => {}
        }
        Ok(())
    }
}

/// Builds a persistable page row from an extracted page.
fn build_page_row(job_id: &str, page: &ExtractedPage) -> page_repo::PageRow {
    let clean = clean_text(&page.text);
    let char_count = clean.chars().count() as i64;
    let token_estimate = (clean.chars().count()).div_ceil(DEFAULT_CHARS_PER_TOKEN) as i64;
    let word_count = clean.split_whitespace().count() as i64;
    let line_count = if clean.is_empty() { 0 } else { clean.lines().count() as i64 };

    let (has_table, table_count, paragraph_count, width, height, unit, lines_json) =
        match &page.layout {
            Some(layout) => (
                layout.table_count > 0,
                layout.table_count as i64,
                layout.paragraph_count as i64,
                layout.width,
                layout.height,
                layout.unit.clone(),
                if layout.lines.is_empty() {
                    None
                } else {
                    serde_json::to_string(&layout.lines).ok()
                },
            ),
            None => (false, 0, 0, None, None, None, None),
        };

    page_repo::PageRow {
        job_id: job_id.to_string(),
        page_number: page.page_number,
        raw_text: page.text.clone(),
        clean_text: clean,
        char_count,
        token_estimate,
        word_count,
        line_count,
        has_table,
        table_count,
        paragraph_count,
        width,
        height,
        unit,
        lines_json,
        is_selected: true,
    }
}

/// Normalizes raw page text: `\r\n → \n`, trailing whitespace stripped per
/// line, runs of blank lines collapsed to one.
fn clean_text(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n");
    let mut cleaned: String = normalized
        .split('\n')
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    while cleaned.contains("\n\n\n") {
        cleaned = cleaned.replace("\n\n\n", "\n\n");
    }
    cleaned.trim_end().to_string()
}
