//! Document directory scanning.
//!
//! Reads every supported file directly inside the document directory and
//! returns its extracted text. Failures are per file: a file that cannot be
//! read or parsed is logged and left out, and a missing directory is an empty
//! set. Nothing here returns an error to the caller.

use std::path::Path;
use walkdir::WalkDir;

use crate::extract::{extract_text, DocumentKind};
use crate::models::DocumentSet;

/// Loads all supported documents from `dir`, sorted by filename.
pub fn load_documents(dir: &Path) -> DocumentSet {
    let mut docs = DocumentSet::new();

    if !dir.is_dir() {
        tracing::warn!(
            dir = %dir.display(),
            "document directory does not exist; continuing without documents"
        );
        return docs;
    }

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(kind) = DocumentKind::from_path(path) else {
            tracing::debug!(file = %name, "unsupported file type, skipped");
            continue;
        };

        match load_file(path, kind) {
            Ok(text) => {
                tracing::info!(file = %name, chars = text.chars().count(), "loaded document");
                docs.insert(name, text);
            }
            Err(e) => {
                tracing::error!(file = %name, error = %e, "failed to load document");
            }
        }
    }

    docs
}

fn load_file(path: &Path, kind: DocumentKind) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(extract_text(&bytes, kind)?)
}
