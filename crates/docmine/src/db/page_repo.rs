//! Page repository — per-page rows belonging to a job.

use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};

/// A raw page row from the database. `page_number` is 1-indexed and
/// unique per job.
#[derive(Debug, Clone)]
pub struct PageRow {
    pub job_id: String,
    pub page_number: u32,
    pub raw_text: String,
    pub clean_text: String,
    pub char_count: i64,
    pub token_estimate: i64,
    pub word_count: i64,
    pub line_count: i64,
    pub has_table: bool,
    pub table_count: i64,
    pub paragraph_count: i64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub unit: Option<String>,
    /// JSON array of `{content, polygon}` line records from the cloud path.
    pub lines_json: Option<String>,
    /// Whether this page feeds downstream chunking and mining.
    /// User-controllable, default true.
    pub is_selected: bool,
}

impl PageRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            job_id: row.get("job_id")?,
            page_number: row.get("page_number")?,
            raw_text: row.get("raw_text")?,
            clean_text: row.get("clean_text")?,
            char_count: row.get("char_count")?,
            token_estimate: row.get("token_estimate")?,
            word_count: row.get("word_count")?,
            line_count: row.get("line_count")?,
            has_table: row.get("has_table")?,
            table_count: row.get("table_count")?,
            paragraph_count: row.get("paragraph_count")?,
            width: row.get("width")?,
            height: row.get("height")?,
            unit: row.get("unit")?,
            lines_json: row.get("lines_json")?,
            is_selected: row.get("is_selected")?,
        })
    }
}

/// Inserts a page within a caller-managed transaction.
pub(crate) fn insert_tx(conn: &Connection, page: &PageRow) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO pages (job_id, page_number, raw_text, clean_text, char_count,
         token_estimate, word_count, line_count, has_table, table_count,
         paragraph_count, width, height, unit, lines_json, is_selected)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            page.job_id,
            page.page_number,
            page.raw_text,
            page.clean_text,
            page.char_count,
            page.token_estimate,
            page.word_count,
            page.line_count,
            page.has_table,
            page.table_count,
            page.paragraph_count,
            page.width,
            page.height,
            page.unit,
            page.lines_json,
            page.is_selected,
        ],
    )?;
    Ok(())
}

/// Deletes all pages for a job within a caller-managed transaction.
pub(crate) fn delete_for_job_tx(conn: &Connection, job_id: &str) -> Result<(), rusqlite::Error> {
    conn.execute("DELETE FROM pages WHERE job_id = ?1", params![job_id])?;
    Ok(())
}

/// All pages for a job, ordered by page number.
pub fn list_by_job(db: &Database, job_id: &str) -> Result<Vec<PageRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT * FROM pages WHERE job_id = ?1 ORDER BY page_number ASC")?;
        let rows: Vec<PageRow> = stmt
            .query_map(params![job_id], PageRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// One page by `(job_id, page_number)`.
pub fn find(
    db: &Database,
    job_id: &str,
    page_number: u32,
) -> Result<Option<PageRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM pages WHERE job_id = ?1 AND page_number = ?2")?;
        let mut rows = stmt.query_map(params![job_id, page_number], PageRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Flips the downstream-selection flag on a page. Returns false when the
/// page does not exist.
pub fn set_selected(
    db: &Database,
    job_id: &str,
    page_number: u32,
    selected: bool,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE pages SET is_selected = ?3 WHERE job_id = ?1 AND page_number = ?2",
            params![job_id, page_number, selected],
        )?;
        Ok(changed > 0)
    })
}

/// Pages currently selected for downstream mining, ordered by page number.
pub fn selected_pages(db: &Database, job_id: &str) -> Result<Vec<PageRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM pages WHERE job_id = ?1 AND is_selected = 1
             ORDER BY page_number ASC",
        )?;
        let rows: Vec<PageRow> = stmt
            .query_map(params![job_id], PageRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
