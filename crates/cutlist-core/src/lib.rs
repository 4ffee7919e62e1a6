//! Cutlist Core - Foundation types for the edit-decision-list engine
//!
//! This crate provides the types shared by every other Cutlist crate:
//! - Time representation (RationalTime, PlaybackSpeed, FrameRate, TimeRange)
//! - The media catalog seam (MediaCatalog, MediaDescriptor)
//! - The error taxonomy

pub mod catalog;
pub mod error;
pub mod time;

pub use catalog::{InMemoryCatalog, MediaCatalog, MediaCodecs, MediaDescriptor, Resolution};
pub use error::{
    CutlistError, EditError, ErrorCategory, ExportError, Result, SerializationError,
    ValidationError,
};
pub use time::{FrameRate, PlaybackSpeed, RationalTime, TimeRange};
