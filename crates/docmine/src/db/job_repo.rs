//! Job repository — CRUD operations for the `jobs` table.

use rusqlite::{params, Row};

use super::{page_repo, Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub job_id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size_bytes: i64,
    pub status: String,
    pub ocr_operation_id: Option<String>,
    pub extraction_method: Option<String>,
    pub page_count: Option<i64>,
    pub total_characters: Option<i64>,
    pub total_token_estimate: Option<i64>,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub domain: Option<String>,
    pub project: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub extracting_at: Option<String>,
    pub extracted_at: Option<String>,
    pub chunking_at: Option<String>,
    pub mining_at: Option<String>,
    pub completed_at: Option<String>,
    pub failed_at: Option<String>,
    pub expires_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            job_id: row.get("job_id")?,
            file_name: row.get("file_name")?,
            file_type: row.get("file_type")?,
            file_size_bytes: row.get("file_size_bytes")?,
            status: row.get("status")?,
            ocr_operation_id: row.get("ocr_operation_id")?,
            extraction_method: row.get("extraction_method")?,
            page_count: row.get("page_count")?,
            total_characters: row.get("total_characters")?,
            total_token_estimate: row.get("total_token_estimate")?,
            source_lang: row.get("source_lang")?,
            target_lang: row.get("target_lang")?,
            domain: row.get("domain")?,
            project: row.get("project")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            extracting_at: row.get("extracting_at")?,
            extracted_at: row.get("extracted_at")?,
            chunking_at: row.get("chunking_at")?,
            mining_at: row.get("mining_at")?,
            completed_at: row.get("completed_at")?,
            failed_at: row.get("failed_at")?,
            expires_at: row.get("expires_at")?,
        })
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (job_id, file_name, file_type, file_size_bytes, status,
             ocr_operation_id, extraction_method, page_count, total_characters,
             total_token_estimate, source_lang, target_lang, domain, project,
             error_message, created_at, updated_at, extracting_at, extracted_at,
             chunking_at, mining_at, completed_at, failed_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
            params![
                job.job_id,
                job.file_name,
                job.file_type,
                job.file_size_bytes,
                job.status,
                job.ocr_operation_id,
                job.extraction_method,
                job.page_count,
                job.total_characters,
                job.total_token_estimate,
                job.source_lang,
                job.target_lang,
                job.domain,
                job.project,
                job.error_message,
                job.created_at,
                job.updated_at,
                job.extracting_at,
                job.extracted_at,
                job.chunking_at,
                job.mining_at,
                job.completed_at,
                job.failed_at,
                job.expires_at,
            ],
        )?;
        Ok(())
    })
}

/// Updates an existing job row. All fields except `job_id` and
/// `created_at` are overwritten.
pub fn update(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        update_in_conn(conn, job)?;
        Ok(())
    })
}

fn update_in_conn(conn: &rusqlite::Connection, job: &JobRow) -> Result<usize, rusqlite::Error> {
    conn.execute(
        "UPDATE jobs SET file_name=?2, file_type=?3, file_size_bytes=?4, status=?5,
         ocr_operation_id=?6, extraction_method=?7, page_count=?8, total_characters=?9,
         total_token_estimate=?10, source_lang=?11, target_lang=?12, domain=?13,
         project=?14, error_message=?15, updated_at=?16, extracting_at=?17,
         extracted_at=?18, chunking_at=?19, mining_at=?20, completed_at=?21,
         failed_at=?22, expires_at=?23
         WHERE job_id=?1",
        params![
            job.job_id,
            job.file_name,
            job.file_type,
            job.file_size_bytes,
            job.status,
            job.ocr_operation_id,
            job.extraction_method,
            job.page_count,
            job.total_characters,
            job.total_token_estimate,
            job.source_lang,
            job.target_lang,
            job.domain,
            job.project,
            job.error_message,
            job.updated_at,
            job.extracting_at,
            job.extracted_at,
            job.chunking_at,
            job.mining_at,
            job.completed_at,
            job.failed_at,
            job.expires_at,
        ],
    )
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, job_id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE job_id = ?1")?;
        let mut rows = stmt.query_map(params![job_id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Atomically records a completed extraction: replaces any pages for the
/// job and writes the updated job row in one transaction, so a failed
/// attempt never leaves a partial page set behind.
pub fn record_extraction(
    db: &Database,
    job: &JobRow,
    pages: &[page_repo::PageRow],
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        page_repo::delete_for_job_tx(&tx, &job.job_id)?;
        for page in pages {
            page_repo::insert_tx(&tx, page)?;
        }
        update_in_conn(&tx, job)?;
        tx.commit()?;
        Ok(())
    })
}

/// Deletes jobs (and their pages, via cascade) whose TTL has elapsed.
/// Returns the number of jobs purged.
pub fn purge_expired(db: &Database, now: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute("DELETE FROM jobs WHERE expires_at <= ?1", params![now])?;
        Ok(deleted as u64)
    })
}
