//! EDL document serialization.
//!
//! An EDL is a JSON object `{version, app_version, timeline}`. Only
//! [`CURRENT_VERSION`] is accepted: there is no migration, and a document is
//! either loaded whole and valid or rejected.

use std::path::Path;

use cutlist_core::SerializationError;
use serde::{Deserialize, Serialize};

use crate::timeline::Timeline;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// A parsed but not yet validated EDL document.
pub type Document = serde_json::Value;

/// Versioned EDL file wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdlFile {
    /// Schema version.
    pub version: u32,
    /// Application version that wrote this file.
    #[serde(default)]
    pub app_version: String,
    /// The edit decision list.
    pub timeline: Timeline,
}

impl EdlFile {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            version: CURRENT_VERSION,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            timeline,
        }
    }
}

/// Produce the document for a timeline.
pub fn serialize(timeline: &Timeline) -> Result<Document, SerializationError> {
    serde_json::to_value(EdlFile::new(timeline.clone()))
        .map_err(|e| SerializationError::MalformedDocument(format!("failed to encode timeline: {e}")))
}

/// Rebuild a timeline from a document, rejecting anything that is not a
/// complete, consistent version-1 EDL.
pub fn deserialize(document: Document) -> Result<Timeline, SerializationError> {
    let version = match document.get("version") {
        None => {
            return Err(SerializationError::MalformedDocument(
                "missing `version` field".into(),
            ))
        }
        Some(value) => value.as_u64().ok_or_else(|| {
            SerializationError::MalformedDocument(format!(
                "`version` must be a non-negative integer, got {value}"
            ))
        })?,
    };
    if version != u64::from(CURRENT_VERSION) {
        return Err(SerializationError::UnsupportedVersion {
            found: version,
            supported: CURRENT_VERSION,
        });
    }

    let file: EdlFile = serde_json::from_value(document)
        .map_err(|e| SerializationError::MalformedDocument(e.to_string()))?;
    file.timeline
        .validate()
        .map_err(SerializationError::MalformedDocument)?;
    Ok(file.timeline)
}

/// Serialize to pretty-printed JSON bytes.
pub fn to_json(timeline: &Timeline) -> Result<Vec<u8>, SerializationError> {
    serde_json::to_vec_pretty(&EdlFile::new(timeline.clone()))
        .map_err(|e| SerializationError::MalformedDocument(format!("failed to encode timeline: {e}")))
}

/// Deserialize from JSON bytes.
pub fn from_json(data: &[u8]) -> Result<Timeline, SerializationError> {
    let document: Document = serde_json::from_slice(data)
        .map_err(|e| SerializationError::MalformedDocument(format!("invalid JSON: {e}")))?;
    deserialize(document)
}

/// Save a timeline to a file path.
pub fn save_to_file(timeline: &Timeline, path: &Path) -> Result<(), SerializationError> {
    let data = to_json(timeline)?;
    std::fs::write(path, data).map_err(|source| SerializationError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a timeline from a file path.
pub fn load_from_file(path: &Path) -> Result<Timeline, SerializationError> {
    let data = std::fs::read(path).map_err(|source| SerializationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_json(&data)
}
