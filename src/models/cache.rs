use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Aggregate size of a directory tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirStats {
    pub total_bytes: u64,
    pub file_count: u64,
}

impl DirStats {
    /// Total size in GiB, as printed in the download report
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_gb(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0 * 1024.0)
    }
}

/// Folder the hub client uses for a model inside its cache root.
///
/// Must stay in sync with `hf_hub::Repo::folder_name` for model repos.
#[must_use]
pub fn cache_folder_name(model_id: &str) -> String {
    format!("models--{}", model_id.replace('/', "--"))
}

/// Path of a model's cache folder under `cache_root`
#[must_use]
pub fn model_cache_path(cache_root: &Path, model_id: &str) -> PathBuf {
    cache_root.join(cache_folder_name(model_id))
}

/// Sum sizes and count files beneath `dir`.
///
/// Directory symlinks are not descended into. A symlink that resolves to a
/// file counts with its target's size, so hub snapshot links are counted
/// alongside the blobs they point to.
pub fn directory_size(dir: &Path) -> Result<DirStats> {
    let mut stats = DirStats::default();

    for entry in WalkDir::new(dir) {
        let entry = entry?;
        let file_type = entry.file_type();

        let len = if file_type.is_file() {
            entry.metadata()?.len()
        } else if file_type.is_symlink() {
            match fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => meta.len(),
                // dangling link or link to a directory
                _ => continue,
            }
        } else {
            continue;
        };

        stats.total_bytes += len;
        stats.file_count += 1;
    }

    Ok(stats)
}

/// Format bytes as human-readable string
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
