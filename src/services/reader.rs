//! Word document text extraction.
//!
//! A `.docx` file is a zip archive; the body lives in `word/document.xml` as
//! WordprocessingML. Only top-level body paragraphs are read: tables, text
//! boxes and drawings are skipped.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::ReadError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extensions accepted by [`DocumentReader::validate`].
pub const SUPPORTED_EXTENSIONS: &[&str] = &["docx"];

/// Elements whose paragraphs are not part of the body text.
const SKIPPED_CONTAINERS: &[&[u8]] = &[b"tbl", b"txbxContent", b"drawing", b"pict"];

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentReader;

impl DocumentReader {
    pub fn new() -> Self {
        Self
    }

    /// Check that `path` exists and looks like a Word document.
    pub fn validate(&self, path: &Path) -> Result<PathBuf, ReadError> {
        if !path.exists() {
            return Err(ReadError::NotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ReadError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: if extension.is_empty() {
                    "<none>".to_string()
                } else {
                    format!(".{extension}")
                },
            });
        }

        Ok(path.to_path_buf())
    }

    /// Read all body paragraphs, trimmed, non-empty, joined with `\n`.
    pub fn read(&self, path: &Path) -> Result<String, ReadError> {
        let path = self.validate(path)?;
        let xml = read_document_part(&path)?;
        let paragraphs = extract_paragraphs(&xml).map_err(|reason| ReadError::InvalidDocument {
            path: path.clone(),
            reason,
        })?;

        let text = paragraphs.join("\n");
        if text.trim().is_empty() {
            return Err(ReadError::Empty(path));
        }

        tracing::debug!(
            "read {} paragraphs ({} chars) from {}",
            paragraphs.len(),
            text.chars().count(),
            path.display()
        );
        Ok(text)
    }
}

fn read_document_part(path: &Path) -> Result<String, ReadError> {
    let file = File::open(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let invalid = |reason: String| ReadError::InvalidDocument {
        path: path.to_path_buf(),
        reason,
    };

    let mut archive =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|e| invalid(e.to_string()))?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| invalid(format!("{DOCUMENT_PART}: {e}")))?;

    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| invalid(format!("{DOCUMENT_PART}: {e}")))?;
    Ok(xml)
}

/// Pull paragraph text out of a WordprocessingML body.
///
/// Matching is on local names, so any namespace prefix works.
pub fn extract_paragraphs(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut skip_depth = 0usize;
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at byte {}: {e}", reader.buffer_position()))?;

        match event {
            Event::Start(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                if SKIPPED_CONTAINERS.contains(&name) {
                    skip_depth += 1;
                } else if skip_depth == 0 {
                    match name {
                        b"p" => current = Some(String::new()),
                        b"t" => in_text = current.is_some(),
                        _ => {}
                    }
                }
            }
            Event::Empty(e) => {
                if skip_depth > 0 {
                    continue;
                }
                if let Some(paragraph) = current.as_mut() {
                    match e.local_name().as_ref() {
                        b"tab" => paragraph.push('\t'),
                        b"br" | b"cr" => paragraph.push('\n'),
                        _ => {}
                    }
                }
            }
            Event::Text(t) => {
                if in_text && skip_depth == 0
                    && let Some(paragraph) = current.as_mut()
                {
                    let text = t.unescape().map_err(|e| e.to_string())?;
                    paragraph.push_str(&text);
                }
            }
            Event::CData(t) => {
                if in_text && skip_depth == 0
                    && let Some(paragraph) = current.as_mut()
                {
                    paragraph.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => {
                let name = e.local_name();
                let name = name.as_ref();
                if SKIPPED_CONTAINERS.contains(&name) {
                    skip_depth = skip_depth.saturating_sub(1);
                } else if skip_depth == 0 {
                    match name {
                        b"t" => in_text = false,
                        b"p" => {
                            if let Some(paragraph) = current.take() {
                                let trimmed = paragraph.trim();
                                if !trimmed.is_empty() {
                                    paragraphs.push(trimmed.to_string());
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    pub(crate) fn body(inner: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}"><w:body>{inner}</w:body></w:document>"#
        )
    }

    pub(crate) fn para(text: &str) -> String {
        format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
    }

    /// Write a minimal `.docx` containing `document_xml` to `path`.
    pub(crate) fn write_docx(path: &Path, document_xml: &str) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(b"<Types/>").unwrap();
        zip.start_file(DOCUMENT_PART, options).unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_paragraphs_in_order() {
        let xml = body(&format!("{}{}{}", para("First"), para("  "), para(" Second ")));
        assert_eq!(extract_paragraphs(&xml).unwrap(), vec!["First", "Second"]);
    }

    #[test]
    fn test_runs_are_concatenated_and_entities_unescaped() {
        let xml = body(
            r#"<w:p><w:r><w:t>Fish &amp; </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>chips</w:t></w:r></w:p>"#,
        );
        assert_eq!(extract_paragraphs(&xml).unwrap(), vec!["Fish & chips"]);
    }

    #[test]
    fn test_tabs_and_breaks() {
        let xml = body(r#"<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>"#);
        assert_eq!(extract_paragraphs(&xml).unwrap(), vec!["a\tb\nc"]);
    }

    #[test]
    fn test_tables_and_text_boxes_are_skipped() {
        let table = format!("<w:tbl><w:tr><w:tc>{}</w:tc></w:tr></w:tbl>", para("cell"));
        let text_box = format!(
            r#"<w:p><w:r><w:t>Caption</w:t><w:drawing><w:txbxContent>{}</w:txbxContent></w:drawing></w:r></w:p>"#,
            para("boxed")
        );
        let xml = body(&format!("{}{}{}", para("Intro"), table, text_box));
        assert_eq!(extract_paragraphs(&xml).unwrap(), vec!["Intro", "Caption"]);
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(extract_paragraphs("<w:document><w:body><w:p></w:body>").is_err());
    }

    #[test]
    fn test_read_docx_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Guía.docx");
        write_docx(&path, &body(&format!("{}{}", para("Hola"), para("Mundo"))));

        let text = DocumentReader::new().read(&path).unwrap();
        assert_eq!(text, "Hola\nMundo");
    }

    #[test]
    fn test_missing_file() {
        let err = DocumentReader::new()
            .read(Path::new("/definitely/not/here.docx"))
            .unwrap_err();
        assert!(matches!(err, ReadError::NotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.doc");
        std::fs::write(&path, b"\xD0\xCF\x11\xE0").unwrap();

        let err = DocumentReader::new().read(&path).unwrap_err();
        assert!(matches!(err, ReadError::UnsupportedFormat { ref extension, .. } if extension == ".doc"));
    }

    #[test]
    fn test_not_a_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, "plain text, not a zip").unwrap();

        let err = DocumentReader::new().read(&path).unwrap_err();
        assert!(matches!(err, ReadError::InvalidDocument { .. }));
    }

    #[test]
    fn test_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.docx");
        write_docx(&path, &body("<w:p/><w:p><w:r><w:t> </w:t></w:r></w:p>"));

        let err = DocumentReader::new().read(&path).unwrap_err();
        assert!(matches!(err, ReadError::Empty(_)));
    }
}
