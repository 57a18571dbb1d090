//! Page-wise text extraction for uploaded documents (PDF, DOCX, TXT).
//!
//! Every parser returns `Vec<Page>` with 1-based page numbers, trimmed
//! text, and no blank pages. DOCX and TXT have no page structure and come
//! back as a single page 1.

use std::io::{Cursor, Read};
use std::path::Path;

use thiserror::Error;
use ultradoc_core::models::Page;
use walkdir::WalkDir;

/// Maximum decompressed bytes to read from `word/document.xml` (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unsupported document type: {0}")]
    Unsupported(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Txt,
}

impl DocumentKind {
    /// Kind by file extension, case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".pdf") {
            Some(DocumentKind::Pdf)
        } else if lower.ends_with(".docx") {
            Some(DocumentKind::Docx)
        } else if lower.ends_with(".txt") {
            Some(DocumentKind::Txt)
        } else {
            None
        }
    }
}

/// A parsed file from the upload directory.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub pages: Vec<Page>,
}

pub fn parse_bytes(kind: DocumentKind, bytes: &[u8]) -> Result<Vec<Page>, ParseError> {
    match kind {
        DocumentKind::Pdf => parse_pdf(bytes),
        DocumentKind::Docx => parse_docx(bytes),
        DocumentKind::Txt => Ok(single_page(&String::from_utf8_lossy(bytes))),
    }
}

pub fn parse_file(path: &Path) -> Result<Vec<Page>, ParseError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let kind = DocumentKind::from_name(&name).ok_or(ParseError::Unsupported(name))?;
    let bytes = std::fs::read(path)?;
    parse_bytes(kind, &bytes)
}

/// Parse every supported file directly inside `dir`, sorted by file name.
///
/// A missing directory yields no documents. Files that fail to parse are
/// skipped with a warning.
pub fn parse_directory(dir: &Path) -> anyhow::Result<Vec<Document>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut docs = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if DocumentKind::from_name(&name).is_none() {
            continue;
        }
        match parse_file(entry.path()) {
            Ok(pages) => docs.push(Document { name, pages }),
            Err(e) => tracing::warn!(file = %name, error = %e, "skipping unparsable document"),
        }
    }
    Ok(docs)
}

/// Full text of all documents: each page followed by a newline.
pub fn full_text(docs: &[Document]) -> String {
    let mut out = String::new();
    for page in docs.iter().flat_map(|d| &d.pages) {
        out.push_str(&page.text);
        out.push('\n');
    }
    out
}

fn single_page(text: &str) -> Vec<Page> {
    let text = text.trim();
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Page::new(1, text)]
    }
}

fn parse_pdf(bytes: &[u8]) -> Result<Vec<Page>, ParseError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ParseError::Pdf(e.to_string()))?;
    Ok(pages
        .iter()
        .enumerate()
        .filter_map(|(i, text)| {
            let text = text.trim();
            (!text.is_empty()).then(|| Page::new(i as u32 + 1, text))
        })
        .collect())
}

fn parse_docx(bytes: &[u8]) -> Result<Vec<Page>, ParseError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ParseError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| ParseError::Docx(e.to_string()))?;
    let mut xml = Vec::new();
    entry.take(MAX_XML_ENTRY_BYTES).read_to_end(&mut xml)?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ParseError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    let paragraphs = docx_paragraphs(&xml)?;
    Ok(single_page(&paragraphs.join("\n")))
}

/// Text of each non-blank `w:p`, concatenating its `w:t` runs.
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, ParseError> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !current.trim().is_empty() {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| ParseError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !current.trim().is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn docx(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_kind_from_name() {
        assert_eq!(DocumentKind::from_name("a.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_name("b.docx"), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::from_name("c.txt"), Some(DocumentKind::Txt));
        assert_eq!(DocumentKind::from_name("d.md"), None);
    }

    #[test]
    fn test_txt_single_trimmed_page() {
        let pages = parse_bytes(DocumentKind::Txt, b"\n  Shipper: Acme \n").unwrap();
        assert_eq!(pages, vec![Page::new(1, "Shipper: Acme")]);
        assert!(parse_bytes(DocumentKind::Txt, b"  \n\t").unwrap().is_empty());
    }

    #[test]
    fn test_docx_paragraphs_joined_by_newline() {
        let bytes = docx(&["Shipper: Acme", "", "Consignee: Beta &amp; Co"]);
        let pages = parse_bytes(DocumentKind::Docx, &bytes).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].text, "Shipper: Acme\nConsignee: Beta & Co");
    }

    #[test]
    fn test_invalid_inputs_are_errors() {
        assert!(matches!(
            parse_bytes(DocumentKind::Docx, b"not a zip"),
            Err(ParseError::Docx(_))
        ));
        assert!(matches!(
            parse_bytes(DocumentKind::Pdf, b"not a pdf"),
            Err(ParseError::Pdf(_))
        ));
        assert!(matches!(
            parse_file(Path::new("notes.md")),
            Err(ParseError::Unsupported(_))
        ));
    }

    #[test]
    fn test_parse_directory_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.txt"), "second").unwrap();
        fs::write(tmp.path().join("a.txt"), "first").unwrap();
        fs::write(tmp.path().join("ignored.md"), "nope").unwrap();
        fs::write(tmp.path().join("broken.docx"), "garbage").unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();
        fs::write(tmp.path().join("nested").join("c.txt"), "deep").unwrap();

        let docs = parse_directory(tmp.path()).unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(full_text(&docs), "first\nsecond\n");
    }

    #[test]
    fn test_parse_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(parse_directory(&tmp.path().join("missing")).unwrap().is_empty());
    }
}
