//! Text extraction: recovers plain text from PDF and DOCX containers.
//!
//! Both routines are CPU-bound and synchronous; callers run them on the blocking pool.

use std::io::{Cursor, Read};
use std::panic::{self, AssertUnwindSafe};

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ingest::format::FileFormat;

const DOCX_BODY_PART: &str = "word/document.xml";

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("not a readable PDF: {0}")]
    Pdf(String),

    #[error("not a readable DOCX: {0}")]
    Docx(String),
}

/// Plain text recovered from one uploaded file. `text` may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub format: FileFormat,
}

impl ExtractedText {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

pub fn extract_text(format: FileFormat, data: &[u8]) -> Result<ExtractedText, FormatError> {
    let raw = match format {
        FileFormat::Pdf => extract_pdf_text(data)?,
        FileFormat::Docx => extract_docx_text(data)?,
    };
    Ok(ExtractedText {
        text: clean_text(&raw),
        format,
    })
}

fn clean_text(raw: &str) -> String {
    raw.replace('\0', "").trim().to_string()
}

/// Validates the container with lopdf, then extracts all pages in document order with
/// pdf-extract. pdf-extract panics on some font programs; when it fails or panics on a
/// container lopdf could read, text is pulled page by page through lopdf instead.
pub fn extract_pdf_text(data: &[u8]) -> Result<String, FormatError> {
    let document =
        lopdf::Document::load_mem(data).map_err(|e| FormatError::Pdf(e.to_string()))?;
    let pages = document.get_pages();
    debug!("PDF container has {} page(s)", pages.len());

    let primary = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(data)
    }));

    match primary {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => {
            warn!("pdf-extract failed: {e}, falling back to per-page extraction");
            Ok(extract_pdf_pages(&document))
        }
        Err(_) => {
            warn!("pdf-extract panicked, falling back to per-page extraction");
            Ok(extract_pdf_pages(&document))
        }
    }
}

/// Page texts joined in page-number order. Pages that cannot be decoded contribute nothing.
fn extract_pdf_pages(document: &lopdf::Document) -> String {
    let mut pages = Vec::new();
    // get_pages() is a BTreeMap keyed by page number, so iteration is in document order.
    for page_number in document.get_pages().keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text.trim().to_string()),
            Err(e) => debug!("Could not extract text of page {page_number}: {e}"),
        }
    }
    pages.retain(|p| !p.is_empty());
    pages.join("\n\n")
}

/// Raw text of the document body: runs concatenated, tabs and breaks preserved,
/// paragraphs separated by a blank line.
pub fn extract_docx_text(data: &[u8]) -> Result<String, FormatError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(data)).map_err(|e| FormatError::Docx(e.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY_PART)
        .map_err(|e| FormatError::Docx(format!("{DOCX_BODY_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| FormatError::Docx(format!("{DOCX_BODY_PART}: {e}")))?;

    document_xml_to_text(&xml)
}

/// A `<w:p>` still being read. Paragraphs nested inside it (text box content) are
/// emitted right after it.
#[derive(Default)]
struct OpenParagraph {
    text: String,
    nested: Vec<String>,
}

/// `w:pPr`, `w:rPr`, `w:sectPr` and friends hold formatting only. Their `w:tab`
/// children are tab-stop definitions, not tab characters.
fn is_property_element(local_name: &[u8]) -> bool {
    local_name.ends_with(b"Pr")
}

fn close_paragraph(open: &mut Vec<OpenParagraph>, paragraphs: &mut Vec<String>) {
    let Some(closed) = open.pop() else {
        return;
    };
    let target = match open.last_mut() {
        Some(parent) => &mut parent.nested,
        None => paragraphs,
    };
    target.push(closed.text);
    target.extend(closed.nested);
}

fn push_char(open: &mut [OpenParagraph], c: char) {
    if let Some(paragraph) = open.last_mut() {
        paragraph.text.push(c);
    }
}

fn document_xml_to_text(xml: &str) -> Result<String, FormatError> {
    let mut reader = Reader::from_str(xml);

    let mut paragraphs: Vec<String> = Vec::new();
    let mut open: Vec<OpenParagraph> = Vec::new();
    let mut property_depth = 0usize;
    // mc:Fallback repeats the content of the mc:Choice before it.
    let mut fallback_depth = 0usize;
    let mut in_text = false;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(FormatError::Docx(format!(
                    "malformed {DOCX_BODY_PART} at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        };

        if fallback_depth > 0 {
            match &event {
                Event::Start(e) if e.local_name().as_ref() == b"Fallback" => fallback_depth += 1,
                Event::End(e) if e.local_name().as_ref() == b"Fallback" => fallback_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"Fallback" => fallback_depth += 1,
                b"p" => open.push(OpenParagraph::default()),
                b"t" => in_text = property_depth == 0 && !open.is_empty(),
                name if is_property_element(name) => property_depth += 1,
                _ => {}
            },
            Event::Empty(e) if property_depth == 0 => match e.local_name().as_ref() {
                b"tab" => push_char(&mut open, '\t'),
                b"br" | b"cr" => push_char(&mut open, '\n'),
                // <w:p/> is an empty paragraph
                b"p" => {
                    open.push(OpenParagraph::default());
                    close_paragraph(&mut open, &mut paragraphs);
                }
                _ => {}
            },
            Event::Text(e) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| FormatError::Docx(format!("bad text run: {err}")))?;
                if let Some(paragraph) = open.last_mut() {
                    paragraph.text.push_str(&text);
                }
            }
            Event::CData(e) if in_text => {
                if let Some(paragraph) = open.last_mut() {
                    paragraph.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => close_paragraph(&mut open, &mut paragraphs),
                name if is_property_element(name) => {
                    property_depth = property_depth.saturating_sub(1)
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n\n"))
}
