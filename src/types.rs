//! Core types and events

use crate::error::{Error, RangeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of unit a request targets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// A single chapter
    Chapter,
    /// A volume, i.e. a grouping of chapters in the catalog listing
    Volume,
}

impl UnitKind {
    /// Parse a user-supplied kind
    ///
    /// Any non-empty prefix of `volume` selects [`UnitKind::Volume`]; any non-empty prefix
    /// of `chapitre` or `chapter` selects [`UnitKind::Chapter`] (`v`, `vol`, `c`, `chap`, ...).
    pub fn parse(word: &str) -> Result<Self> {
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            return Err(Error::UnknownKind(word));
        }
        if "volume".starts_with(&word) {
            Ok(UnitKind::Volume)
        } else if "chapitre".starts_with(&word) || "chapter".starts_with(&word) {
            Ok(UnitKind::Chapter)
        } else {
            Err(Error::UnknownKind(word))
        }
    }

    /// Label used in archive names (`<manga>-<label>-<number>.<ext>`)
    pub fn label(&self) -> &'static str {
        match self {
            UnitKind::Chapter => "chapter",
            UnitKind::Volume => "volume",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Format a unit number the way it appears in links and paths (`10`, `1000.5`)
pub fn format_number(number: f64) -> String {
    format!("{number}")
}

/// Inclusive numeric interval of unit numbers, `start <= end`
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Range {
    start: f64,
    end: f64,
}

impl Range {
    /// Create a range, rejecting reversed bounds instead of swapping them
    pub fn new(start: f64, end: f64) -> std::result::Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Order { start, end });
        }
        Ok(Self { start, end })
    }

    /// Lower bound
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Upper bound
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Inclusive floating-point membership
    pub fn contains(&self, number: f64) -> bool {
        number >= self.start && number <= self.end
    }

    /// Whole numbers inside the range, ascending (used for volumes)
    pub fn whole_numbers(&self) -> std::ops::RangeInclusive<u32> {
        if self.end < 0.0 {
            return 1..=0;
        }
        let first = self.start.ceil().max(0.0) as u32;
        first..=(self.end.floor() as u32)
    }

    /// Label used in archive names (`1-50`)
    pub fn label(&self) -> String {
        format!("{}-{}", format_number(self.start), format_number(self.end))
    }
}

/// A resolved unit selector: one number or an inclusive range
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Selector {
    /// A single unit number
    Single {
        /// The unit number
        number: f64,
    },
    /// An inclusive range of unit numbers
    Range {
        /// The range
        range: Range,
    },
}

impl Selector {
    /// Label used in archive names (`10` or `1-50`)
    pub fn label(&self) -> String {
        match self {
            Selector::Single { number } => format_number(*number),
            Selector::Range { range } => range.label(),
        }
    }
}

/// Totals and canonical name of a catalog entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogStats {
    /// The catalog's own name for the entry; used for every path and archive name
    pub canonical_name: String,
    /// Number of volume groupings in the listing
    pub volume_count: u32,
    /// Numerically highest chapter number of the most recent listing entry
    pub last_chapter_number: f64,
}

impl CatalogStats {
    /// Total used to resolve the `fin` sentinel for the given kind
    pub fn last_of(&self, kind: UnitKind) -> f64 {
        match kind {
            UnitKind::Chapter => self.last_chapter_number,
            UnitKind::Volume => f64::from(self.volume_count),
        }
    }
}

/// A requested name paired with the canonical name it resolved to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Name supplied by the caller
    pub requested_name: String,
    /// Name the catalog uses for the entry
    pub canonical_name: String,
}

impl CatalogEntry {
    /// Whether the catalog knows this entry under a different name
    pub fn is_aliased(&self) -> bool {
        self.requested_name != self.canonical_name
    }
}

/// Per-request download options
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Build archives once units are fetched (default: true)
    pub compress: bool,
    /// Re-fetch units whose directory already exists
    pub force: bool,
    /// Remove unit directories once their archive was written
    pub delete_after_archive: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            compress: true,
            force: false,
            delete_after_archive: false,
        }
    }
}

impl DownloadOptions {
    /// Build options from a flag word: `s` deletes sources after archiving,
    /// `f` forces re-download, `n` skips the archive. Letter order is irrelevant.
    pub fn from_flags(flags: &str) -> Self {
        Self {
            compress: !flags.contains('n'),
            force: flags.contains('f'),
            delete_after_archive: flags.contains('s'),
        }
    }

    /// Reject option combinations that cannot be honoured
    pub fn validate(&self) -> Result<()> {
        if self.delete_after_archive && !self.compress {
            return Err(Error::ConflictingOptions(
                "cannot delete unit directories without archiving them first".to_string(),
            ));
        }
        Ok(())
    }
}

/// Directory holding the pages of one unit
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadLocation(pub PathBuf);

impl DownloadLocation {
    /// Path of the directory
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for DownloadLocation {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for DownloadLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A written archive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveResult {
    /// Archive path
    pub output_path: PathBuf,
    /// Archive size in bytes
    pub byte_size: u64,
}

/// Outcome of fetching one unit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    /// Where the pages were persisted
    pub location: DownloadLocation,
    /// Page count reported by the renderer (0 when skipped)
    pub pages: u32,
    /// Pages classified as having no image
    pub missing_pages: Vec<u32>,
    /// Whether the fetch was skipped because the directory already existed
    pub skipped: bool,
}

/// Event emitted while the pipeline works
///
/// Page, unit and volume events are the three progress granularities consumed by
/// presentation layers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The catalog knows the requested entry under another name
    NameResolved {
        /// Name supplied by the caller
        requested: String,
        /// Name used from now on
        canonical: String,
    },

    /// Page-level progress; `current` is 0 when the unit starts
    PageProgress {
        /// Canonical series name
        manga: String,
        /// Unit segment (`10`, `1000.5`)
        unit: String,
        /// Pages processed so far
        current: u32,
        /// Total pages in the unit
        total: u32,
    },

    /// A unit was skipped because its directory already exists
    UnitSkipped {
        /// Canonical series name
        manga: String,
        /// Unit segment
        unit: String,
        /// Existing directory
        location: PathBuf,
    },

    /// A unit finished fetching
    UnitComplete {
        /// Canonical series name
        manga: String,
        /// Unit segment
        unit: String,
        /// Directory holding the pages
        location: PathBuf,
        /// Pages with no image
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        missing_pages: Vec<u32>,
    },

    /// Unit-level progress within a multi-unit request
    UnitProgress {
        /// Canonical series name
        manga: String,
        /// Unit segment
        unit: String,
        /// Units done so far
        current: usize,
        /// Units in the request
        total: usize,
    },

    /// Volume-level progress within a volume range request
    VolumeProgress {
        /// Canonical series name
        manga: String,
        /// Volume number just completed
        volume: u32,
        /// Volumes done so far
        current: usize,
        /// Volumes in the request
        total: usize,
    },

    /// An archive was written
    ArchiveCreated {
        /// Archive path
        path: PathBuf,
        /// Archive size in bytes
        size_bytes: u64,
    },

    /// Writing an archive failed; persisted pages are untouched
    ArchiveFailed {
        /// Archive path
        path: PathBuf,
        /// Error message
        error: String,
    },

    /// Unit directories were removed after archiving
    SourcesRemoved {
        /// Removed directories
        paths: Vec<PathBuf>,
    },

    /// The pipeline is shutting down
    Shutdown,
}
