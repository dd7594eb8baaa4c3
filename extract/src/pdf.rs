//! PDF text extraction via `pdf-extract`.
//!
//! Glyphs are collected with their page positions and laid out again:
//! lines top to bottom, glyphs left to right within a line. Lines and pages
//! are both separated by a single `\n`.

use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use pdf_extract::{Document, MediaBox, OutputDev, OutputError, Transform};
use tracing::debug;

use crate::error::{ExtractError, Result};
use crate::registry::Extractor;

/// Glyphs whose baselines differ by less than this fraction of the font
/// size share a line.
const LINE_TOLERANCE: f64 = 0.5;

/// A horizontal gap wider than this fraction of the font size is a space.
const SPACE_THRESHOLD: f64 = 0.1;

/// Extracts the text layer of a PDF document in visual reading order.
///
/// The whole file is loaded into memory before parsing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path)?;
        debug!("Loaded PDF {} ({} bytes)", path.display(), bytes.len());

        // pdf-extract panics on some malformed inputs instead of erroring.
        let pages = panic::catch_unwind(AssertUnwindSafe(|| collect_pages(&bytes)))
            .map_err(|_| ExtractError::Pdf(format!("parser panicked on {}", path.display())))?
            .map_err(|e| ExtractError::Pdf(format!("{}: {e}", path.display())))?;

        let text = pages
            .into_iter()
            .map(layout_page)
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let text = normalize_newlines(&text);
        debug!("PDF extracted: {} chars", text.len());
        Ok(text)
    }
}

/// Parse `bytes` and return the positioned glyphs of every page.
fn collect_pages(bytes: &[u8]) -> std::result::Result<Vec<Vec<Glyph>>, OutputError> {
    let mut doc = Document::load_mem(bytes)?;
    if doc.is_encrypted() {
        doc.decrypt("")?;
    }

    let mut collector = GlyphCollector::default();
    pdf_extract::output_doc(&doc, &mut collector)?;
    Ok(collector.pages)
}

/// One decoded character and where it was drawn, in PDF user space
/// (y grows upwards).
#[derive(Debug, Clone, PartialEq)]
struct Glyph {
    x: f64,
    y: f64,
    end: f64,
    size: f64,
    text: String,
}

#[derive(Debug, Default)]
struct GlyphCollector {
    pages: Vec<Vec<Glyph>>,
    current: Vec<Glyph>,
}

impl OutputDev for GlyphCollector {
    fn begin_page(
        &mut self,
        _page_num: u32,
        _media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> std::result::Result<(), OutputError> {
        self.current.clear();
        Ok(())
    }

    fn end_page(&mut self) -> std::result::Result<(), OutputError> {
        self.pages.push(mem::take(&mut self.current));
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        char: &str,
    ) -> std::result::Result<(), OutputError> {
        let scale = (trm.m11 * trm.m22 - trm.m12 * trm.m21).abs().sqrt();
        let size = match font_size.abs() * scale {
            s if s > 0.0 => s,
            _ => 1.0,
        };

        self.current.push(Glyph {
            x: trm.m31,
            y: trm.m32,
            end: trm.m31 + width * size,
            size,
            text: char.to_string(),
        });
        Ok(())
    }

    fn begin_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }
}

/// Lay out one page: group glyphs into lines by baseline, order lines top
/// to bottom and glyphs left to right.
fn layout_page(mut glyphs: Vec<Glyph>) -> String {
    glyphs.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut lines: Vec<Vec<Glyph>> = Vec::new();
    for glyph in glyphs {
        match lines.last_mut() {
            Some(line) if same_line(&line[0], &glyph) => line.push(glyph),
            _ => lines.push(vec![glyph]),
        }
    }

    lines
        .into_iter()
        .map(layout_line)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn same_line(first: &Glyph, glyph: &Glyph) -> bool {
    let tolerance = first.size.max(glyph.size) * LINE_TOLERANCE;
    (first.y - glyph.y).abs() < tolerance
}

fn layout_line(mut glyphs: Vec<Glyph>) -> String {
    glyphs.sort_by(|a, b| a.x.total_cmp(&b.x));

    let mut out = String::new();
    let mut last_end: Option<f64> = None;
    for glyph in glyphs {
        if let Some(end) = last_end {
            let gap = glyph.x - end;
            let spaced = out.ends_with(char::is_whitespace)
                || glyph.text.starts_with(char::is_whitespace);
            if gap > glyph.size * SPACE_THRESHOLD && !spaced {
                out.push(' ');
            }
        }
        out.push_str(&glyph.text);
        last_end = Some(glyph.end);
    }

    out.trim().to_string()
}

/// Collapse CRLF, CR and form feeds into `\n`.
fn normalize_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            '\u{c}' => out.push('\n'),
            _ => out.push(c),
        }
    }

    out
}
