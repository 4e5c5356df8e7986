//! Error types for japdl
//!
//! This module provides the error taxonomy of the acquisition pipeline:
//! - Structural errors (catalog, range, options) raised before any I/O begins
//! - Transport errors (navigation failures, exhausted retries) raised while fetching
//! - Per-page and archive failures, which the pipeline records instead of raising
//! - Machine-readable error codes for the command layer

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for japdl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for japdl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "output_dir")
        key: Option<String>,
    },

    /// Catalog lookup failed
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Unit selector could not be parsed or is out of order
    #[error("range error: {0}")]
    Range(#[from] RangeError),

    /// Archive creation failed
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Unit is already present on disk; used as a skip signal
    #[error("{what} already exists at {path}")]
    AlreadyExists {
        /// What was found ("chapter 10", "volume 3 archive", ...)
        what: String,
        /// Where it was found
        path: PathBuf,
    },

    /// A page has no content; recorded per page, never aborts a unit
    #[error("page {page} of {link} has no image")]
    PageUnavailable {
        /// Unit link the page belongs to
        link: String,
        /// 1-based page index
        page: u32,
    },

    /// Mutually exclusive options were requested together
    #[error("conflicting options: {0}")]
    ConflictingOptions(String),

    /// A transient failure persisted through every retry attempt
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    FetchExhausted {
        /// The operation that was retried ("page 3 of ...", "page count of ...")
        operation: String,
        /// Total number of attempts made
        attempts: u32,
        /// The last transient error observed
        last_error: String,
    },

    /// Transient navigation failure reported by the content renderer (timeout, reset, ...)
    #[error("navigation to {link} failed: {reason}")]
    Navigation {
        /// The link that could not be reached
        link: String,
        /// Renderer-provided reason
        reason: String,
    },

    /// A catalog or unit link could not be built or parsed
    #[error("invalid link '{link}': {reason}")]
    InvalidLink {
        /// The offending link or website root
        link: String,
        /// Why it was rejected
        reason: String,
    },

    /// Unknown unit kind supplied by the caller
    #[error("unknown unit kind '{0}', expected a prefix of 'volume', 'chapitre' or 'chapter'")]
    UnknownKind(String),

    /// Unknown command word supplied to the command layer
    #[error("unknown command '{0}', type 'help' to list commands")]
    UnknownCommand(String),

    /// Command invoked with too few arguments
    #[error("usage: {usage}")]
    MissingArguments {
        /// Usage line of the command
        usage: String,
    },

    /// Operation interrupted because the session disconnected or the pipeline is shutting down
    #[error("operation cancelled")]
    Cancelled,

    /// Shutdown in progress - not accepting new commands
    #[error("shutdown in progress: not accepting new commands")]
    ShuttingDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Catalog-related errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The requested name has no resolvable entry
    #[error("no catalog entry named '{name}'")]
    NotFound {
        /// The name that was requested
        name: String,
    },

    /// The entry exists but its unit listing cannot be read
    #[error("unit listing of '{name}' is unavailable")]
    ListUnavailable {
        /// The name that was requested
        name: String,
    },

    /// Volume number outside `1..=volume_count`
    #[error("volume {volume} of '{name}' does not exist ({volume_count} volume(s) listed)")]
    VolumeOutOfRange {
        /// Canonical name of the entry
        name: String,
        /// The requested volume
        volume: u32,
        /// Number of volume groupings in the listing
        volume_count: u32,
    },

    /// A unit page reported as missing by the renderer
    #[error("unit {link} does not exist")]
    UnitNotFound {
        /// The unit link
        link: String,
    },
}

/// Selector parsing and ordering errors
#[derive(Debug, Error, PartialEq)]
pub enum RangeError {
    /// A bound is neither a number nor a sentinel
    #[error("'{bound}' is not a valid number, nor 'debut' or 'fin'")]
    Parse {
        /// The offending bound, or the whole token for single numbers
        bound: String,
    },

    /// Range start is greater than its end after sentinel resolution
    #[error("range start {start} is greater than its end {end}")]
    Order {
        /// Resolved start
        start: f64,
        /// Resolved end
        end: f64,
    },
}

/// Archive creation errors (non-fatal inside download requests)
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// None of the source directories exist on disk
    #[error("nothing to archive for {output}: none of the {requested} source(s) exist")]
    NoSources {
        /// Archive that would have been written
        output: PathBuf,
        /// Number of sources requested
        requested: usize,
    },

    /// Writing the archive failed
    #[error("failed to write {output}: {reason}")]
    Write {
        /// Archive that could not be written
        output: PathBuf,
        /// The reason writing failed
        reason: String,
    },
}

impl Error {
    /// Machine-readable error code, stable across releases
    pub fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Catalog(e) => match e {
                CatalogError::NotFound { .. } => "catalog_not_found",
                CatalogError::ListUnavailable { .. } => "list_unavailable",
                CatalogError::VolumeOutOfRange { .. } => "volume_out_of_range",
                CatalogError::UnitNotFound { .. } => "unit_not_found",
            },
            Error::Range(e) => match e {
                RangeError::Parse { .. } => "range_parse",
                RangeError::Order { .. } => "range_order",
            },
            Error::Archive(e) => match e {
                ArchiveError::NoSources { .. } => "archive_no_sources",
                ArchiveError::Write { .. } => "archive_write",
            },
            Error::AlreadyExists { .. } => "already_exists",
            Error::PageUnavailable { .. } => "page_unavailable",
            Error::ConflictingOptions(_) => "conflicting_options",
            Error::FetchExhausted { .. } => "fetch_exhausted",
            Error::Navigation { .. } => "navigation_error",
            Error::InvalidLink { .. } => "invalid_link",
            Error::UnknownKind(_) => "unknown_kind",
            Error::UnknownCommand(_) => "unknown_command",
            Error::MissingArguments { .. } => "missing_arguments",
            Error::Cancelled => "cancelled",
            Error::ShuttingDown => "shutting_down",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// Whether this error is raised before any network or filesystem work begins
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::Range(_)
                | Error::ConflictingOptions(_)
                | Error::UnknownKind(_)
                | Error::UnknownCommand(_)
                | Error::MissingArguments { .. }
        )
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    /// Returns (Error, expected_error_code) for every match arm of `error_code`.
    fn all_error_variants() -> Vec<(Error, &'static str)> {
        vec![
            (
                Error::Config {
                    message: "bad value".into(),
                    key: Some("output_dir".into()),
                },
                "config_error",
            ),
            (
                Error::Catalog(CatalogError::NotFound {
                    name: "demo".into(),
                }),
                "catalog_not_found",
            ),
            (
                Error::Catalog(CatalogError::ListUnavailable {
                    name: "demo".into(),
                }),
                "list_unavailable",
            ),
            (
                Error::Catalog(CatalogError::VolumeOutOfRange {
                    name: "demo".into(),
                    volume: 9,
                    volume_count: 2,
                }),
                "volume_out_of_range",
            ),
            (
                Error::Catalog(CatalogError::UnitNotFound {
                    link: "https://x/lecture-en-ligne/demo/1/".into(),
                }),
                "unit_not_found",
            ),
            (
                Error::Range(RangeError::Parse { bound: "abc".into() }),
                "range_parse",
            ),
            (
                Error::Range(RangeError::Order {
                    start: 50.0,
                    end: 1.0,
                }),
                "range_order",
            ),
            (
                Error::Archive(ArchiveError::NoSources {
                    output: PathBuf::from("/tmp/a.cbr"),
                    requested: 2,
                }),
                "archive_no_sources",
            ),
            (
                Error::Archive(ArchiveError::Write {
                    output: PathBuf::from("/tmp/a.cbr"),
                    reason: "disk full".into(),
                }),
                "archive_write",
            ),
            (
                Error::AlreadyExists {
                    what: "chapter 10".into(),
                    path: PathBuf::from("/tmp/demo/10"),
                },
                "already_exists",
            ),
            (
                Error::PageUnavailable {
                    link: "https://x/lecture-en-ligne/demo/1/".into(),
                    page: 3,
                },
                "page_unavailable",
            ),
            (
                Error::ConflictingOptions("s and n".into()),
                "conflicting_options",
            ),
            (
                Error::FetchExhausted {
                    operation: "page 1".into(),
                    attempts: 6,
                    last_error: "timeout".into(),
                },
                "fetch_exhausted",
            ),
            (
                Error::Navigation {
                    link: "https://x".into(),
                    reason: "timeout".into(),
                },
                "navigation_error",
            ),
            (
                Error::InvalidLink {
                    link: "not a url".into(),
                    reason: "relative URL without a base".into(),
                },
                "invalid_link",
            ),
            (Error::UnknownKind("tome".into()), "unknown_kind"),
            (Error::UnknownCommand("dl".into()), "unknown_command"),
            (
                Error::MissingArguments {
                    usage: "info <name>".into(),
                },
                "missing_arguments",
            ),
            (Error::Cancelled, "cancelled"),
            (Error::ShuttingDown, "shutting_down"),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                "io_error",
            ),
            (Error::Other("unknown".into()), "internal_error"),
        ]
    }

    #[test]
    fn every_variant_maps_to_its_error_code() {
        for (error, expected) in all_error_variants() {
            assert_eq!(error.error_code(), expected, "wrong code for {error:?}");
        }
    }

    #[test]
    fn serialization_error_code() {
        let err = Error::Serialization(serde_json::from_str::<String>("bad json").unwrap_err());
        assert_eq!(err.error_code(), "serialization_error");
    }

    #[test]
    fn structural_errors_are_flagged() {
        assert!(Error::Range(RangeError::Parse { bound: "x".into() }).is_structural());
        assert!(Error::ConflictingOptions("s+n".into()).is_structural());
        assert!(Error::UnknownKind("tome".into()).is_structural());
        assert!(!Error::Cancelled.is_structural());
        assert!(
            !Error::Navigation {
                link: "l".into(),
                reason: "r".into()
            }
            .is_structural()
        );
    }

    #[test]
    fn range_error_messages_name_the_offending_bound() {
        let err = Error::Range(RangeError::Parse {
            bound: "abc".into(),
        });
        assert!(err.to_string().contains("'abc'"));

        let order = Error::Range(RangeError::Order {
            start: 50.0,
            end: 1.0,
        });
        assert_eq!(
            order.to_string(),
            "range error: range start 50 is greater than its end 1"
        );
    }

    #[test]
    fn nested_errors_convert_with_question_mark() {
        fn fails() -> Result<()> {
            Err(CatalogError::NotFound {
                name: "ghost".into(),
            })?
        }
        let err = fails().unwrap_err();
        assert!(matches!(
            err,
            Error::Catalog(CatalogError::NotFound { ref name }) if name == "ghost"
        ));
    }
}
