//! Multi-format text extraction for files and web pages.
//!
//! Inputs dispatch on the declared extension: PDF (one unit per page),
//! Word via the OOXML `word/document.xml` text runs, CSV (one unit per
//! row), anything else as plain UTF-8 text. URLs are fetched with a
//! bounded timeout, stripped of script/style markup, and whitespace
//! normalized. Every unit carries `{source, conversation_id}` provenance.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use scraper::Html;

use crate::config::FetchConfig;
use crate::error::{RagError, Result};
use crate::models::{FileKind, TextUnit};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extract a local file into text units.
pub async fn extract_file(path: &Path, name: &str, conversation_id: &str) -> Result<Vec<TextUnit>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        RagError::Extraction(format!("failed to read {}: {}", path.display(), e))
    })?;

    let texts = match FileKind::from_name(name) {
        FileKind::Pdf => pdf_pages(&bytes)?,
        FileKind::Word => vec![docx_text(&bytes)?],
        FileKind::Csv => csv_rows(&bytes)?,
        FileKind::Text => vec![plain_text(&bytes)?],
    };

    Ok(to_units(texts, name, conversation_id))
}

/// Fetch a URL and extract its visible text as a single unit.
///
/// Non-2xx status and transport failures (including the timeout) surface
/// as [`RagError::Fetch`].
pub async fn extract_url(
    url: &str,
    conversation_id: &str,
    fetch: &FetchConfig,
) -> Result<Vec<TextUnit>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(fetch.timeout_secs))
        .build()
        .map_err(|e| RagError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| RagError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(RagError::Fetch {
            url: url.to_string(),
            reason: format!("HTTP {}", status),
        });
    }

    let body = response.text().await.map_err(|e| RagError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    Ok(to_units(vec![html_to_text(&body)], url, conversation_id))
}

fn to_units(texts: Vec<String>, source: &str, conversation_id: &str) -> Vec<TextUnit> {
    texts
        .into_iter()
        .map(|t| normalize_whitespace(&t))
        .filter(|t| !t.is_empty())
        .map(|text| TextUnit {
            text,
            source: source.to_string(),
            conversation_id: conversation_id.to_string(),
        })
        .collect()
}

fn pdf_pages(bytes: &[u8]) -> Result<Vec<String>> {
    pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| RagError::Extraction(format!("PDF extraction failed: {}", e)))
}

fn docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| RagError::Extraction(format!("not a valid docx archive: {}", e)))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| RagError::Extraction("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| RagError::Extraction(e.to_string()))?;
    }
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(RagError::Extraction(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    // Collect <w:t> runs; paragraph ends become line breaks so the
    // chunker sees the document's structure.
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(doc_xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                return Err(RagError::Extraction(format!("docx parse error: {}", e)));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn csv_rows(bytes: &[u8]) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|e| RagError::Extraction(format!("CSV header error: {}", e)))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| RagError::Extraction(format!("CSV row error: {}", e)))?;
        let lines: Vec<String> = record
            .iter()
            .enumerate()
            .map(|(i, field)| format!("{}: {}", headers.get(i).unwrap_or(""), field))
            .collect();
        rows.push(lines.join("\n"));
    }
    Ok(rows)
}

fn plain_text(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(|s| s.to_string())
        .map_err(|_| RagError::Extraction("file is not valid UTF-8".to_string()))
}

/// Visible text of an HTML page, with script/style subtrees dropped.
fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    for node in document.root_element().descendants() {
        if let Some(text) = node.value().as_text() {
            let skipped = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| matches!(e.name(), "script" | "style"))
            });
            if !skipped {
                out.push_str(text);
                out.push('\n');
            }
        }
    }
    out
}

/// Trim every line, split double-space runs, drop empty fragments,
/// rejoin with single newlines.
pub fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .flat_map(|line| line.trim().split("  "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_blank_lines_and_trims() {
        let raw = "  first line  \n\n\n   \n  second   \t\nthird  ";
        assert_eq!(normalize_whitespace(raw), "first line\nsecond\nthird");
    }

    #[test]
    fn normalize_splits_double_space_runs() {
        assert_eq!(normalize_whitespace("left  right"), "left\nright");
        assert_eq!(normalize_whitespace("a b  c d"), "a b\nc d");
    }

    #[test]
    fn html_strips_script_and_style() {
        let html = r#"<html><head><style>body { color: red; }</style></head>
            <body><p>Visible text.</p><script>var hidden = 1;</script></body></html>"#;
        let text = normalize_whitespace(&html_to_text(html));
        assert!(text.contains("Visible text."));
        assert!(!text.contains("hidden"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn csv_yields_one_unit_per_row() {
        let data = b"city,population\nParis,2100000\nLyon,520000\n";
        let rows = csv_rows(data).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], "city: Paris\npopulation: 2100000");
        assert_eq!(rows[1], "city: Lyon\npopulation: 520000");
    }

    #[test]
    fn invalid_utf8_is_an_extraction_error() {
        let err = plain_text(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, RagError::Extraction(_)));
    }

    #[test]
    fn invalid_docx_is_an_extraction_error() {
        let err = docx_text(b"not a zip").unwrap_err();
        assert!(matches!(err, RagError::Extraction(_)));
    }

    #[test]
    fn invalid_pdf_is_an_extraction_error() {
        let err = pdf_pages(b"not a pdf").unwrap_err();
        assert!(matches!(err, RagError::Extraction(_)));
    }

    #[tokio::test]
    async fn url_fetch_non_2xx_is_a_fetch_error() {
        let server = httpmock::MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/missing");
            then.status(404);
        });

        let err = extract_url(
            &server.url("/missing"),
            "c1",
            &FetchConfig { timeout_secs: 5 },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RagError::Fetch { .. }));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn url_fetch_extracts_visible_text_with_provenance() {
        let server = httpmock::MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/page");
            then.status(200)
                .header("content-type", "text/html")
                .body("<html><body><h1>Title</h1><script>skip()</script><p>Body text.</p></body></html>");
        });

        let url = server.url("/page");
        let units = extract_url(&url, "c42", &FetchConfig { timeout_secs: 5 })
            .await
            .unwrap();
        assert_eq!(units.len(), 1);
        assert!(units[0].text.contains("Title"));
        assert!(units[0].text.contains("Body text."));
        assert!(!units[0].text.contains("skip"));
        assert_eq!(units[0].source, url);
        assert_eq!(units[0].conversation_id, "c42");
    }
}
