//! Error types for Cutlist.
//!
//! Each subsystem has its own enum so callers can match on the exact
//! failure; [`CutlistError`] wraps them all for the application layer.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::time::RationalTime;

/// Failures of timeline edit operations. The timeline is unchanged whenever
/// one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("Track not found: {0}")]
    TrackNotFound(Uuid),

    #[error("Clip not found: {0}")]
    ClipNotFound(Uuid),

    #[error("Track {0} is locked")]
    TrackLocked(Uuid),

    #[error("Invalid trim range {start}..{end}{}", source_limit(.source_duration))]
    InvalidRange {
        start: RationalTime,
        end: RationalTime,
        source_duration: Option<RationalTime>,
    },

    #[error("Time {time} is outside clip {clip} span ({start}, {end})")]
    OutOfRange {
        clip: Uuid,
        time: RationalTime,
        start: RationalTime,
        end: RationalTime,
    },

    #[error("Invalid clip: {0}")]
    InvalidClip(String),

    #[error("Invalid timeline: {0}")]
    InvalidTimeline(String),
}

fn source_limit(limit: &Option<RationalTime>) -> String {
    match limit {
        Some(d) => format!(" (source duration {d})"),
        None => String::new(),
    }
}

/// Failures loading or saving an EDL document. Loading never yields a
/// partially-built timeline.
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Unsupported document version {found} (supported: {supported})")]
    UnsupportedVersion { found: u64, supported: u32 },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reasons a timeline cannot be turned into a render plan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Media missing from catalog: {0}")]
    MediaMissing(String),

    #[error("Timeline has no clips to render")]
    EmptyTimeline,

    #[error("Invalid export settings: {0}")]
    InvalidSettings(String),
}

/// Errors returned synchronously by the render supervisor's control calls.
///
/// Process failures and cancellation after a successful start are reported
/// through the supervisor's event stream instead.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("An export is already in progress")]
    ExportAlreadyInProgress,

    #[error("Export finished with state {0}; reset() is required before starting again")]
    NotReset(String),

    #[error("No export is running")]
    NotRunning,

    #[error("Failed to spawn renderer {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification used by the surrounding application to pick a
/// message or exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Locked,
    Process,
    Cancelled,
    Serialization,
    Io,
}

/// Umbrella error for code that spans several subsystems.
#[derive(Error, Debug)]
pub enum CutlistError {
    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("No track named or identified by {0:?}")]
    UnknownTrack(String),

    #[error("Track name {0:?} is ambiguous; use its id")]
    AmbiguousTrack(String),

    #[error("Export failed: {0}")]
    Process(String),

    #[error("Export cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CutlistError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Edit(EditError::TrackNotFound(_) | EditError::ClipNotFound(_)) => {
                ErrorCategory::NotFound
            }
            Self::UnknownTrack(_) => ErrorCategory::NotFound,
            Self::Edit(EditError::TrackLocked(_)) => ErrorCategory::Locked,
            Self::Edit(_) | Self::Validation(_) | Self::AmbiguousTrack(_) => {
                ErrorCategory::Validation
            }
            Self::Export(ExportError::Validation(ValidationError::MediaMissing(_))) => {
                ErrorCategory::NotFound
            }
            Self::Export(ExportError::Validation(_)) => ErrorCategory::Validation,
            Self::Export(_) | Self::Process(_) => ErrorCategory::Process,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Serialization(SerializationError::Io { .. }) | Self::Io(_) => ErrorCategory::Io,
            Self::Serialization(_) | Self::Json(_) => ErrorCategory::Serialization,
        }
    }
}

/// Result type alias for Cutlist operations.
pub type Result<T> = std::result::Result<T, CutlistError>;
