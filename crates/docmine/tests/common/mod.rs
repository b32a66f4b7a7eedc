//! Shared fixtures for docmine integration tests.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::io::Write;

use lopdf::{dictionary, Document, Object, Stream};
use zip::write::SimpleFileOptions;

use docmine::config::OcrServiceConfig;
use docmine::{Database, ExtractionCoordinator, FileType, JobService, NewJob};

/// Builds a single-font PDF with one content stream per page.
pub fn build_pdf(page_contents: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for content in page_contents {
        let content_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {},
            content.as_bytes().to_vec(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let kids_len = kids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => kids_len as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Wraps each string in a text-showing operator block on its own line.
pub fn pdf_page_with_lines(lines: &[&str]) -> String {
    let mut content = String::from("BT /F1 12 Tf 50 750 Td ");
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            content.push_str("0 -20 Td ");
        }
        content.push_str(&format!("({}) Tj ", line));
    }
    content.push_str("ET");
    content
}

/// Builds a minimal DOCX archive with one `<w:p>` per paragraph.
pub fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
    let mut body = String::new();
    for p in paragraphs {
        body.push_str(&format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p));
    }
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>{}</w:body></w:document>"#,
        body
    );

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document.as_bytes()).unwrap();
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

/// Service over an in-memory database with the given OCR config.
pub fn service_with_ocr(ocr: OcrServiceConfig) -> JobService {
    let db = Database::open_in_memory().unwrap();
    JobService::new(db, ExtractionCoordinator::new(ocr))
}

/// Service over an in-memory database with no OCR credentials.
pub fn service() -> JobService {
    service_with_ocr(OcrServiceConfig::default())
}

/// Creates a job for an uploaded file of the given type.
pub fn upload(service: &JobService, file_name: &str, file_type: FileType, size: i64) -> String {
    service
        .create_job(NewJob {
            file_name: file_name.to_string(),
            file_type,
            file_size_bytes: size,
            source_lang: Some("de".to_string()),
            target_lang: Some("en".to_string()),
            domain: Some("automotive".to_string()),
            project: None,
        })
        .unwrap()
        .job_id
}
