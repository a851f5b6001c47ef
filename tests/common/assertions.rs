//! Assertions over archived directory trees

use std::path::Path;
use walkdir::WalkDir;

/// Permalinks whose media directory holds a video artifact, sorted
pub fn archived_permalinks(root: &Path) -> Vec<String> {
    let mut permalinks: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            name.starts_with("best-video") && !name.ends_with("-request.txt")
        })
        .filter_map(|entry| {
            // <permalink>/media/best-video.mp4
            let media = entry.path().parent()?;
            let permalink = media.parent()?.file_name()?;
            Some(permalink.to_string_lossy().into_owned())
        })
        .collect();
    permalinks.sort();
    permalinks
}

/// Assert `dir` is missing or has no entries left in it
pub fn assert_no_staging_left(dir: &Path) {
    if !dir.exists() {
        return;
    }
    let leftovers: Vec<_> = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().display().to_string())
        .collect();
    assert!(leftovers.is_empty(), "staging left behind: {leftovers:?}");
}

/// Assert every listed file exists under `dir`
pub fn assert_files_exist(dir: &Path, expected_files: &[&str]) {
    for file in expected_files {
        let path = dir.join(file);
        assert!(path.exists(), "Expected file not found: {}", path.display());
    }
}
