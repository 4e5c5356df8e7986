//! Custom assertions over the produced output tree

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every regular file under `root`, relative to it, sorted
pub fn tree(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}

/// Sorted entry names of the archive at `path`
pub fn archive_entries(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path)
        .unwrap_or_else(|e| panic!("archive {} missing: {e}", path.display()));
    let archive = zip::ZipArchive::new(file).expect("archive should be a valid zip");
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

/// Content of entry `name` in the archive at `path`
pub fn archive_entry(path: &Path, name: &str) -> Vec<u8> {
    use std::io::Read;

    let file = std::fs::File::open(path).expect("archive should exist");
    let mut archive = zip::ZipArchive::new(file).expect("archive should be a valid zip");
    let mut entry = archive.by_name(name).expect("entry should exist");
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).expect("entry should be readable");
    bytes
}

/// Assert that `dir` holds exactly the pages `1..=pages` of `unit`
pub fn assert_unit_pages(dir: &Path, unit: &str, pages: u32) {
    let expected: Vec<PathBuf> = (1..=pages)
        .map(|p| PathBuf::from(format!("{unit}_{p}.jpg")))
        .collect();
    let mut found = tree(dir);
    found.sort_by_key(|p| {
        p.to_string_lossy()
            .rsplit('_')
            .next()
            .and_then(|s| s.trim_end_matches(".jpg").parse::<u32>().ok())
    });
    assert_eq!(found, expected, "pages of unit {unit} in {}", dir.display());
}
