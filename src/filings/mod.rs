// src/filings/mod.rs
pub mod text;

use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::error::FilingError;

pub use text::FilingTextSource;

/// File extensions picked up when none are configured.
pub const DEFAULT_EXTENSIONS: [&str; 3] = ["html", "htm", "txt"];

/// A filing whose plain text has been retrieved.
#[derive(Debug, Clone)]
pub struct Document {
    /// File name, unique within one input directory.
    pub id: String,
    pub text: String,
}

/// Turns a filing on disk into plain text.
pub trait TextSource: Send + Sync {
    fn retrieve(&self, path: &Path) -> Result<Document, FilingError>;
}

/// Document identifier used in the results: the bare file name.
pub fn document_id(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Lists the filings directly inside `dir` whose extension is in `extensions`
/// (case-insensitive), sorted by file name so every run sees the same order.
pub fn discover_filings<P: AsRef<Path>>(dir: P, extensions: &[String]) -> Result<Vec<PathBuf>, FilingError> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|source| FilingError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut filings = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable directory entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if has_extension(&path, extensions) {
            filings.push(path);
        } else {
            tracing::trace!("Ignoring {} (extension not selected)", path.display());
        }
    }

    filings.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    tracing::info!("Discovered {} filings in {}", filings.len(), dir.display());
    Ok(filings)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
