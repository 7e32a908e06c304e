// src/filings/text.rs
use std::fs;
use std::path::Path;

use scraper::{node::Node, ElementRef, Html};

use crate::filings::{document_id, Document, TextSource};
use crate::utils::error::FilingError;

// Elements whose text never reaches the reader.
const SKIPPED_ELEMENTS: [&str; 3] = ["script", "style", "noscript"];

/// Reads filings from disk. Files with a plain-text extension are passed
/// through; everything else is parsed as HTML and reduced to its text.
#[derive(Debug, Clone)]
pub struct FilingTextSource {
    plain_extensions: Vec<String>,
}

impl Default for FilingTextSource {
    fn default() -> Self {
        Self {
            plain_extensions: vec!["txt".to_string()],
        }
    }
}

impl FilingTextSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_plain(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.plain_extensions.iter().any(|p| p.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

impl TextSource for FilingTextSource {
    fn retrieve(&self, path: &Path) -> Result<Document, FilingError> {
        let bytes = fs::read(path).map_err(|e| FilingError::DocumentUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let raw = String::from_utf8_lossy(&bytes);

        let text = if self.is_plain(path) {
            raw.into_owned()
        } else {
            html_to_text(&raw)
        };
        tracing::debug!("Retrieved {} chars of text from {}", text.len(), path.display());

        Ok(Document {
            id: document_id(path),
            text,
        })
    }
}

/// Collects the visible text of an HTML document, one text node per line.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut content = String::new();

    for node in document.root_element().descendants() {
        let Node::Text(text_node) = node.value() else {
            continue;
        };

        let hidden = node
            .parent()
            .and_then(ElementRef::wrap)
            .map(|parent| SKIPPED_ELEMENTS.contains(&parent.value().name()))
            .unwrap_or(false);
        if hidden {
            continue;
        }

        let piece = text_node.text.replace('\u{a0}', " ");
        if piece.trim().is_empty() {
            continue;
        }
        content.push_str(&piece);
        content.push('\n');
    }

    content
}
