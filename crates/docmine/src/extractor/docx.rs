//! DOCX text extraction.
//!
//! A DOCX file is a ZIP archive; the body text lives in
//! `word/document.xml`. Text runs (`<w:t>`) are concatenated and each
//! paragraph (`<w:p>`) becomes one line. DOCX has no fixed pagination,
//! so the result is a single logical page.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ExtractError;

use super::ExtractedPage;

pub fn extract(bytes: &[u8]) -> Result<Vec<ExtractedPage>, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::DocxParse(format!("Failed to open DOCX archive: {}", e)))?;

    let mut document_xml = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::DocxParse(format!("Failed to find document.xml: {}", e)))?;

    let mut xml_content = String::new();
    document_xml
        .read_to_string(&mut xml_content)
        .map_err(|e| ExtractError::DocxParse(format!("Failed to read document.xml: {}", e)))?;

    let text = parse_document_xml(&xml_content)?;

    Ok(vec![ExtractedPage {
        page_number: 1,
        text,
        layout: None,
    }])
}

fn parse_document_xml(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut text = String::new();
    let mut in_text_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_element = true;
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = false,
                b"p" => {
                    if !text.is_empty() && !text.ends_with('\n') {
                        text.push('\n');
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"br" {
                    text.push('\n');
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_text_element {
                    let content = e
                        .unescape()
                        .map_err(|err| ExtractError::DocxParse(format!("Invalid XML text: {}", err)))?;
                    text.push_str(&content);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::DocxParse(format!("XML parse error: {}", e)));
            }
            _ => {}
        }
    }

    Ok(text.trim_end().to_string())
}
