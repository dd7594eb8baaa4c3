//! DOCX text extraction.
//!
//! A `.docx` file is a ZIP container; the body text lives in
//! `word/document.xml`. Runs (`<w:t>`) are concatenated per paragraph and
//! each paragraph ends with a newline.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;
use zip::ZipArchive;

use crate::error::{ExtractError, Result};
use crate::registry::Extractor;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extracts the body text of a Word document.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxExtractor;

impl Extractor for DocxExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;

        let xml = match archive.by_name(DOCUMENT_PART) {
            Ok(mut part) => {
                let mut s = String::new();
                part.read_to_string(&mut s)?;
                s
            }
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(ExtractError::MissingPart(format!(
                    "{DOCUMENT_PART} in {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let text = document_text(&xml)?;
        debug!("DOCX extracted: {} chars from {}", text.len(), path.display());
        Ok(text)
    }
}

/// Walk `word/document.xml` and collect its visible text.
fn document_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_text => {
                out.push_str(&e.unescape()?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}
