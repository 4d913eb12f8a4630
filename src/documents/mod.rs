#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{DocsError, Result};

/// A converted documentation file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path identifier of the file, used as the chunk source
    pub source: String,
    pub text: String,
    pub modified: Option<DateTime<Utc>>,
}

impl Document {
    #[inline]
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
            modified: None,
        }
    }

    /// Read a single file, recording its modification time
    #[inline]
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Ok(Self {
            source: path.display().to_string(),
            text,
            modified,
        })
    }
}

/// Every `.md` file under `dir`, sorted by path
#[inline]
pub fn discover_markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(DocsError::InvalidArgument(format!(
            "Documents directory not found: {}",
            dir.display()
        )));
    }

    let mut files = WalkDir::new(dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
        })
        .map(walkdir::DirEntry::into_path)
        .collect::<Vec<_>>();

    files.sort();
    Ok(files)
}

/// Load the Markdown corpus under `dir`.
///
/// Unreadable files are skipped with a warning so a single bad file does not stop a run.
#[inline]
pub fn load_markdown_documents(dir: &Path) -> Result<Vec<Document>> {
    let files = discover_markdown_files(dir)?;
    let mut documents = Vec::with_capacity(files.len());

    for path in files {
        match Document::from_path(&path) {
            Ok(document) => documents.push(document),
            Err(e) => warn!("Skipping unreadable document {}: {}", path.display(), e),
        }
    }

    debug!(
        "Loaded {} markdown documents from {}",
        documents.len(),
        dir.display()
    );
    Ok(documents)
}
