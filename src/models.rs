//! Core data types that flow through the ingestion and query pipelines.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Message author role. Only user/assistant messages participate in the
/// conversational window used for query rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One turn of a conversation, as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Epoch milliseconds.
    #[serde(default)]
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// A raw unit handed to the ingestion pipeline: a local file with a known
/// extension, or a URL. Upload transport is the caller's problem.
#[derive(Debug, Clone)]
pub enum SourceInput {
    File { path: PathBuf, name: String },
    Url { url: String },
}

impl SourceInput {
    /// Interpret a CLI argument: anything with an http(s) scheme is a URL,
    /// everything else is a local path.
    pub fn parse(arg: &str) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            SourceInput::Url {
                url: arg.to_string(),
            }
        } else {
            let path = PathBuf::from(arg);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| arg.to_string());
            SourceInput::File { path, name }
        }
    }

    /// Display name recorded with the document: file name or URL.
    pub fn display_name(&self) -> &str {
        match self {
            SourceInput::File { name, .. } => name,
            SourceInput::Url { url } => url,
        }
    }

    /// Record kind: `"document"` for files, `"website"` for URLs.
    pub fn kind_label(&self) -> &'static str {
        match self {
            SourceInput::File { .. } => "document",
            SourceInput::Url { .. } => "website",
        }
    }
}

/// File format, derived from the declared extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Word,
    Csv,
    Text,
}

impl FileKind {
    pub fn from_name(name: &str) -> Self {
        let ext = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => FileKind::Pdf,
            "docx" | "doc" => FileKind::Word,
            "csv" => FileKind::Csv,
            _ => FileKind::Text,
        }
    }
}

/// Extracted text with provenance, produced by the extractor before
/// chunking. One unit per PDF page or CSV row; one per docx/text file
/// or web page.
#[derive(Debug, Clone)]
pub struct TextUnit {
    pub text: String,
    pub source: String,
    pub conversation_id: String,
}

/// A bounded slice of a source unit's text, ready for embedding.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub conversation_id: String,
    pub source: String,
    pub chunk_index: i64,
    pub text: String,
}

/// A retrieved chunk with its distance to the query.
/// Distance is 1 − cosine similarity: lower means more similar.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub distance: f32,
}

/// Write-once metadata row recorded after a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub conversation_id: String,
    /// File name or URL.
    pub name: String,
    /// `"document"` or `"website"`.
    pub kind: String,
    pub chunk_count: i64,
    /// Epoch seconds.
    pub processed_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_url_input() {
        let input = SourceInput::parse("https://example.com/docs");
        assert!(matches!(input, SourceInput::Url { .. }));
        assert_eq!(input.display_name(), "https://example.com/docs");
        assert_eq!(input.kind_label(), "website");
    }

    #[test]
    fn parse_file_input_uses_file_name() {
        let input = SourceInput::parse("/tmp/reports/q3.pdf");
        assert_eq!(input.display_name(), "q3.pdf");
        assert_eq!(input.kind_label(), "document");
    }

    #[test]
    fn file_kind_dispatch() {
        assert_eq!(FileKind::from_name("a.pdf"), FileKind::Pdf);
        assert_eq!(FileKind::from_name("a.PDF"), FileKind::Pdf);
        assert_eq!(FileKind::from_name("a.docx"), FileKind::Word);
        assert_eq!(FileKind::from_name("a.doc"), FileKind::Word);
        assert_eq!(FileKind::from_name("a.csv"), FileKind::Csv);
        assert_eq!(FileKind::from_name("notes.md"), FileKind::Text);
        assert_eq!(FileKind::from_name("no_extension"), FileKind::Text);
    }

    #[test]
    fn role_serde_round_trip() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"assistant","content":"hi","timestamp":5}"#).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""role":"assistant""#));
    }
}
