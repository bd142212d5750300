// src/discovery.rs

use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// Recursively collect pose tables under `input_dir`, sorted by path.
/// Anything inside `output_dir` is skipped so reruns never pick up their
/// own results.
pub fn find_pose_files(input_dir: &Path, suffix: &str, output_dir: &Path) -> Vec<PathBuf> {
    let output_dir = output_dir
        .canonicalize()
        .unwrap_or_else(|_| output_dir.to_path_buf());

    let mut files: Vec<PathBuf> = WalkDir::new(input_dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            let path = e.path().canonicalize().unwrap_or_else(|_| e.path().to_path_buf());
            !path.starts_with(&output_dir)
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(suffix))
        .map(|e| e.into_path())
        .collect();

    files.sort();
    info!("Found {} pose table(s) in {}", files.len(), input_dir.display());
    files
}
