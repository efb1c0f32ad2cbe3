//! Attachment encoding for Acervo
//!
//! Files picked by the user become [`Attachment::Real`] (raw bytes plus a
//! detected media type, sent as inline data). The library's downloaded
//! documents are stand-ins held in memory ([`MockDocument`]) and become
//! [`Attachment::Mock`], whose text is inlined into the prompt instead.

use crate::error::{AcervoError, Result};
use crate::providers::{Content, Part, Role};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Media type substring that marks a transport-encoded mock document
pub const MOCK_MARKER: &str = "mock";

/// Fallback media type for unrecognized content
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// An in-memory stand-in for a downloaded document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockDocument {
    /// File name shown to the user and recorded in catalog results
    pub name: String,
    /// Full text content
    pub content: String,
}

impl MockDocument {
    /// Create a new mock document
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// The documents found in the synced downloads folder
pub fn default_documents() -> Vec<MockDocument> {
    vec![
        MockDocument::new(
            "starwars.pdf",
            "Plot of the film Star Wars: A New Hope. Luke Skywalker's journey against the Galactic Empire.",
        ),
        MockDocument::new(
            "doc_final.pdf",
            "How to make the perfect cake batter, 3 quick and easy tips. Use room-temperature ingredients and beat the egg whites well.",
        ),
        MockDocument::new(
            "artigo.pdf",
            "Opinion article on indigenous lands in Brazil. An in-depth analysis of land demarcation and constitutional rights.",
        ),
    ]
}

/// Find a document by name (case-insensitive)
///
/// # Errors
///
/// Returns `UnknownDocument`, with the closest name as a suggestion when
/// one is similar enough.
pub fn find_document<'a>(documents: &'a [MockDocument], name: &str) -> Result<&'a MockDocument> {
    if let Some(doc) = documents.iter().find(|d| d.name.eq_ignore_ascii_case(name)) {
        return Ok(doc);
    }

    let names: Vec<&str> = documents.iter().map(|d| d.name.as_str()).collect();
    let message = match suggest(name, &names) {
        Some(best) => format!("{} (did you mean '{}'?)", name, best),
        None => name.to_string(),
    };
    Err(AcervoError::UnknownDocument(message).into())
}

/// Closest candidate by normalized Levenshtein similarity, if any is close
pub fn suggest<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, strsim::normalized_levenshtein(&input.to_lowercase(), &c.to_lowercase())))
        .filter(|(_, score)| *score >= 0.5)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(c, _)| c)
}

/// A file attached to a user message
///
/// The variant is decided once, at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// Real file content sent as inline binary data
    Real {
        /// Detected or declared media type
        mime_type: String,
        /// Raw bytes
        data: Vec<u8>,
        /// Original file name, when known
        name: Option<String>,
    },
    /// Mock document whose text is inlined into the prompt
    Mock {
        /// Document name
        name: String,
        /// Decoded text
        text: String,
    },
}

/// Where a message sits relative to the request being built
///
/// Mock text is labeled differently for prior history and for the new turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineContext {
    /// A message already in the conversation history
    History,
    /// The message being sent now
    Turn,
}

impl Attachment {
    /// Read a file from disk and detect its media type
    ///
    /// # Errors
    ///
    /// Returns `Attachment` error if the file cannot be read
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|e| {
            AcervoError::Attachment(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mime_type = detect_mime_type(path, &data);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());

        tracing::debug!(
            path = %path.display(),
            mime_type = %mime_type,
            bytes = data.len(),
            "Encoded attachment"
        );

        Ok(Self::Real {
            mime_type,
            data,
            name,
        })
    }

    /// Decode a transport-encoded payload
    ///
    /// `data` is base64, optionally as a `data:<type>;base64,` URL. A media
    /// type containing [`MOCK_MARKER`] produces a `Mock` attachment with the
    /// decoded UTF-8 text.
    ///
    /// # Examples
    ///
    /// ```
    /// use acervo::attachments::Attachment;
    ///
    /// let att = Attachment::from_encoded("application/mock-pdf", "b2zDoQ==", Some("a.pdf".into())).unwrap();
    /// assert_eq!(att, Attachment::Mock { name: "a.pdf".into(), text: "olá".into() });
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `Attachment` error on invalid base64, or invalid UTF-8 in a
    /// mock payload
    pub fn from_encoded(mime_type: &str, data: &str, name: Option<String>) -> Result<Self> {
        let payload = match data.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => data,
        };

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| AcervoError::Attachment(format!("Invalid base64 payload: {}", e)))?;

        if mime_type.contains(MOCK_MARKER) {
            let text = String::from_utf8(bytes).map_err(|e| {
                AcervoError::Attachment(format!("Mock document is not valid UTF-8: {}", e))
            })?;
            return Ok(Self::Mock {
                name: name.unwrap_or_else(|| "document".to_string()),
                text,
            });
        }

        Ok(Self::Real {
            mime_type: mime_type.to_string(),
            data: bytes,
            name,
        })
    }

    /// Attachment for one of the in-memory documents
    pub fn mock(document: &MockDocument) -> Self {
        Self::Mock {
            name: document.name.clone(),
            text: document.content.clone(),
        }
    }

    /// File name, if known
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Real { name, .. } => name.as_deref(),
            Self::Mock { name, .. } => Some(name),
        }
    }

    /// Name for display, falling back to a generic label
    pub fn display_name(&self) -> String {
        self.name().unwrap_or("attachment").to_string()
    }

    /// Whether this is an inlined mock document
    pub fn is_mock(&self) -> bool {
        matches!(self, Self::Mock { .. })
    }

    /// Short description for listings (`name (type, size)`)
    pub fn describe(&self) -> String {
        match self {
            Self::Real {
                mime_type, data, ..
            } => format!("{} ({}, {} bytes)", self.display_name(), mime_type, data.len()),
            Self::Mock { name, text } => format!("{} (mock document, {} chars)", name, text.chars().count()),
        }
    }
}

/// Build a wire content block from message text and its attachments
///
/// Mock text is appended to the text part; real attachments follow as
/// inline data parts, in attachment order.
///
/// # Examples
///
/// ```
/// use acervo::attachments::{build_content, Attachment, InlineContext, MockDocument};
/// use acervo::providers::Role;
///
/// let doc = MockDocument::new("a.pdf", "body");
/// let content = build_content(Role::User, "Read this", &[Attachment::mock(&doc)], InlineContext::Turn);
/// assert_eq!(content.text(), "Read this\n\n[Attached file: a.pdf]:\nbody");
/// ```
pub fn build_content(
    role: Role,
    text: &str,
    attachments: &[Attachment],
    context: InlineContext,
) -> Content {
    let mut full_text = text.to_string();
    let mut inline_parts = Vec::new();

    for attachment in attachments {
        match attachment {
            Attachment::Mock { name, text } => {
                let label = match context {
                    InlineContext::History => format!("[Contents of file {}]", name),
                    InlineContext::Turn => format!("[Attached file: {}]", name),
                };
                full_text.push_str(&format!("\n\n{}:\n{}", label, text));
            }
            Attachment::Real {
                mime_type, data, ..
            } => inline_parts.push(Part::inline_data(mime_type.clone(), data)),
        }
    }

    let mut parts = Vec::with_capacity(inline_parts.len() + 1);
    if !full_text.is_empty() || inline_parts.is_empty() {
        parts.push(Part::text(full_text));
    }
    parts.extend(inline_parts);

    Content { role, parts }
}

/// Detect the media type of file content
///
/// Image magic bytes win, then the PDF signature, then the file extension.
pub fn detect_mime_type(path: &Path, bytes: &[u8]) -> String {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }

    if bytes.starts_with(b"%PDF") {
        return "application/pdf".to_string();
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let mime = match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        _ => DEFAULT_MIME_TYPE,
    };
    mime.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_error_contains, create_test_file, temp_dir};

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn test_default_documents() {
        let docs = default_documents();
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["starwars.pdf", "doc_final.pdf", "artigo.pdf"]);
        assert!(docs.iter().all(|d| !d.content.is_empty()));
    }

    #[test]
    fn test_find_document_case_insensitive() {
        let docs = default_documents();
        assert_eq!(find_document(&docs, "ARTIGO.pdf").unwrap().name, "artigo.pdf");
    }

    #[test]
    fn test_find_document_suggests_close_name() {
        let docs = default_documents();
        let err = find_document(&docs, "starwar.pdf").unwrap_err();
        assert_error_contains(&err, "did you mean 'starwars.pdf'");
    }

    #[test]
    fn test_find_document_no_suggestion_for_distant_name() {
        let docs = default_documents();
        let err = find_document(&docs, "zzzzzzzzzzzzzzzz").unwrap_err();
        assert!(!err.to_string().contains("did you mean"));
    }

    #[test]
    fn test_from_encoded_real() {
        let att = Attachment::from_encoded("image/png", "iVBORw==", Some("x.png".into())).unwrap();
        match att {
            Attachment::Real {
                mime_type,
                data,
                name,
            } => {
                assert_eq!(mime_type, "image/png");
                assert_eq!(data, vec![0x89, b'P', b'N', b'G']);
                assert_eq!(name.as_deref(), Some("x.png"));
            }
            other => panic!("expected Real, got {:?}", other),
        }
    }

    #[test]
    fn test_from_encoded_strips_data_url() {
        let att = Attachment::from_encoded("text/plain", "data:text/plain;base64,aGk=", None).unwrap();
        assert!(matches!(att, Attachment::Real { ref data, .. } if data == b"hi"));
    }

    #[test]
    fn test_from_encoded_mock_marker() {
        let att = Attachment::from_encoded("application/mock-pdf", "aGVsbG8=", Some("a.pdf".into())).unwrap();
        assert_eq!(
            att,
            Attachment::Mock {
                name: "a.pdf".into(),
                text: "hello".into()
            }
        );
        assert!(att.is_mock());
    }

    #[test]
    fn test_from_encoded_invalid_base64() {
        let err = Attachment::from_encoded("image/png", "@@@", None).unwrap_err();
        assert_error_contains(&err, "Invalid base64");
    }

    #[tokio::test]
    async fn test_from_path_detects_png() {
        let dir = temp_dir();
        let path = dir.path().join("scan.bin");
        std::fs::write(&path, PNG_HEADER).unwrap();

        let att = Attachment::from_path(&path).await.unwrap();
        match att {
            Attachment::Real { mime_type, name, .. } => {
                assert_eq!(mime_type, "image/png");
                assert_eq!(name.as_deref(), Some("scan.bin"));
            }
            other => panic!("expected Real, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        let err = Attachment::from_path("/nonexistent/acervo/file.pdf").await.unwrap_err();
        assert_error_contains(&err, "Failed to read");
    }

    #[test]
    fn test_detect_mime_type_pdf_magic_beats_extension() {
        assert_eq!(
            detect_mime_type(Path::new("report.txt"), b"%PDF-1.7 ..."),
            "application/pdf"
        );
    }

    #[test]
    fn test_detect_mime_type_by_extension_and_fallback() {
        let dir = temp_dir();
        let notes = create_test_file(&dir, "notes.MD", "# title");
        let bytes = std::fs::read(&notes).unwrap();
        assert_eq!(detect_mime_type(&notes, &bytes), "text/markdown");
        assert_eq!(detect_mime_type(Path::new("blob"), b"\x00\x01"), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_build_content_history_label_and_inline_order() {
        let attachments = vec![
            Attachment::Real {
                mime_type: "image/png".into(),
                data: b"abc".to_vec(),
                name: None,
            },
            Attachment::Mock {
                name: "artigo.pdf".into(),
                text: "Indigenous lands".into(),
            },
        ];
        let content = build_content(Role::User, "Compare", &attachments, InlineContext::History);

        assert_eq!(content.parts.len(), 2);
        assert_eq!(
            content.parts[0],
            Part::text("Compare\n\n[Contents of file artigo.pdf]:\nIndigenous lands")
        );
        assert_eq!(content.parts[1], Part::inline_data("image/png", b"abc"));
    }

    #[test]
    fn test_build_content_attachment_only_skips_empty_text() {
        let attachments = vec![Attachment::Real {
            mime_type: "application/pdf".into(),
            data: b"%PDF".to_vec(),
            name: Some("a.pdf".into()),
        }];
        let content = build_content(Role::User, "", &attachments, InlineContext::Turn);
        assert_eq!(content.parts.len(), 1);
        assert!(matches!(content.parts[0], Part::InlineData(_)));
    }

    #[test]
    fn test_build_content_plain_text() {
        let content = build_content(Role::Model, "", &[], InlineContext::History);
        assert_eq!(content.parts, vec![Part::text("")]);
    }

    #[test]
    fn test_describe() {
        let doc = MockDocument::new("a.pdf", "abc");
        assert_eq!(Attachment::mock(&doc).describe(), "a.pdf (mock document, 3 chars)");
    }
}
