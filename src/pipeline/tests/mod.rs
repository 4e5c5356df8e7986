use super::test_helpers::*;
use super::*;
use crate::error::{ArchiveError, CatalogError, Error, RangeError};
use crate::types::{CatalogStats, DownloadLocation, DownloadOptions, Event, UnitKind};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;


/// File names directly inside `dir`, sorted
fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Entry names of a zip archive, sorted
fn archive_entries(path: &Path) -> Vec<String> {
    let archive = ::zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

fn no_archive() -> DownloadOptions {
    DownloadOptions::from_flags("n")
}
