//! End-to-end lifecycle tests over the local extraction strategies:
//! upload, extract, chunk, and purge against a real (in-memory) database.

mod common;

use docmine::{ChunkerConfig, DocumentSource, FileType, JobError};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn digital_pdf_runs_the_full_lifecycle() {
    let service = common::service();
    let page_one = common::pdf_page_with_lines(&[
        "Inspection report 2026-031 for gearbox housing GH-400.",
        "All measured diameters within tolerance.",
    ]);
    let page_two = common::pdf_page_with_lines(&[
        "Surface roughness Ra 1.6 confirmed on sealing face.",
        "Released for assembly by QA.",
    ]);
    let bytes = common::build_pdf(&[&page_one, &page_two]);

    let job_id = common::upload(&service, "report.pdf", FileType::Pdf, bytes.len() as i64);
    let job = service
        .run_extraction(&job_id, DocumentSource::Bytes(bytes), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(job.status, "extracted");
    assert_eq!(job.extraction_method.as_deref(), Some("pdf-local"));
    assert_eq!(job.page_count, Some(2));
    assert!(job.ocr_operation_id.is_none());

    let pages = service.list_pages(&job_id).unwrap();
    assert_eq!(pages.len(), 2);
    assert!(pages[0].clean_text.contains("gearbox housing GH-400"));
    assert!(pages[1].clean_text.contains("Released for assembly"));
    assert_eq!(pages[0].line_count, 2);
    assert!(!pages[0].has_table);

    let chunks = service.chunk_job(&job_id, &ChunkerConfig::default()).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].page_range, vec![1, 2]);
    assert!(chunks[0].text.contains("within tolerance"));
    assert!(chunks[0].text.contains("sealing face"));

    let done = service.complete_job(&job_id).unwrap();
    assert_eq!(done.status, "completed");
    assert!(done.completed_at.is_some());
}

#[tokio::test]
async fn docx_upload_is_extracted_as_one_page() {
    let service = common::service();
    let bytes = common::build_docx(&[
        "Pruefprotokoll Welle 12-88.",
        "Durchmesser 12,00 mm, Toleranz h7.",
    ]);

    let job_id = common::upload(&service, "protokoll.docx", FileType::Docx, bytes.len() as i64);
    let job = service
        .run_extraction(&job_id, DocumentSource::Bytes(bytes), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(job.extraction_method.as_deref(), Some("docx"));
    assert_eq!(job.page_count, Some(1));

    let pages = service.list_pages(&job_id).unwrap();
    assert_eq!(pages[0].clean_text, "Pruefprotokoll Welle 12-88.\nDurchmesser 12,00 mm, Toleranz h7.");
    assert_eq!(pages[0].word_count, 8);
}

#[tokio::test]
async fn unreadable_pdf_without_ocr_credentials_fails_the_job() {
    let service = common::service();
    let job_id = common::upload(&service, "scan.pdf", FileType::Pdf, 9);

    let result = service
        .run_extraction(
            &job_id,
            DocumentSource::Bytes(b"not a pdf".to_vec()),
            &CancellationToken::new(),
        )
        .await;
    assert!(result.is_err());

    let job = service.get_job(&job_id).unwrap().unwrap();
    assert_eq!(job.status, "failed");
    assert!(job.error_message.is_some());
    // The probe failed, so the local strategy must never be recorded.
    assert_ne!(job.extraction_method.as_deref(), Some("pdf-local"));
    assert!(service.list_pages(&job_id).unwrap().is_empty());
}

#[tokio::test]
async fn deselected_pages_are_excluded_from_chunking() {
    let service = common::service();
    let page_one = common::pdf_page_with_lines(&[
        "This cover sheet repeats boilerplate and should be skipped entirely here.",
    ]);
    let page_two = common::pdf_page_with_lines(&[
        "Hardness test HRC 58 on the cam lobe surface, within specification.",
    ]);
    let bytes = common::build_pdf(&[&page_one, &page_two]);

    let job_id = common::upload(&service, "report.pdf", FileType::Pdf, bytes.len() as i64);
    service
        .run_extraction(&job_id, DocumentSource::Bytes(bytes), &CancellationToken::new())
        .await
        .unwrap();

    service.set_page_selected(&job_id, 1, false).unwrap();
    let chunks = service.chunk_job(&job_id, &ChunkerConfig::default()).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].page_range, vec![2]);
    assert!(!chunks[0].text.contains("cover sheet"));
}

#[tokio::test]
async fn selecting_a_missing_page_is_not_found() {
    let service = common::service();
    let job_id = common::upload(&service, "report.pdf", FileType::Pdf, 1);
    let result = service.set_page_selected(&job_id, 7, false);
    assert!(matches!(result, Err(JobError::NotFound(_))));
}

#[tokio::test]
async fn chunking_before_extraction_is_rejected() {
    let service = common::service();
    let job_id = common::upload(&service, "report.pdf", FileType::Pdf, 1);
    let result = service.chunk_job(&job_id, &ChunkerConfig::default());
    assert!(matches!(result, Err(JobError::InvalidTransition { .. })));

    // The failed attempt must not have moved the job.
    let job = service.get_job(&job_id).unwrap().unwrap();
    assert_eq!(job.status, "uploaded");
}

#[tokio::test]
async fn expired_jobs_are_purged_with_their_pages() {
    let service = common::service();
    let bytes = common::build_docx(&["Short-lived content."]);
    let expiring = common::upload(&service, "old.docx", FileType::Docx, bytes.len() as i64);
    service
        .run_extraction(&expiring, DocumentSource::Bytes(bytes), &CancellationToken::new())
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let fresh = common::upload(&service, "fresh.docx", FileType::Docx, 10);

    // Nothing has actually aged past the 24-hour TTL yet.
    assert_eq!(service.purge_expired().unwrap(), 0);

    // Sweep with a cutoff between the two expiry timestamps.
    let cutoff = service.get_job(&expiring).unwrap().unwrap().expires_at;
    assert_eq!(service.purge_expired_as_of(&cutoff).unwrap(), 1);

    assert!(service.get_job(&expiring).unwrap().is_none());
    assert!(service.list_pages(&expiring).unwrap().is_empty());
    assert!(service.get_job(&fresh).unwrap().is_some());
}
