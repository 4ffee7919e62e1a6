//! Cutlist Timeline - Edit decision list model
//!
//! Implements the timeline structure for non-destructive editing:
//! - Timelines containing tracks
//! - Tracks containing (possibly overlapping) clips
//! - All-or-nothing edit operations and their serializable commands
//! - Versioned JSON persistence
//! - An editing session tying a timeline to its catalog and file

pub mod clip;
pub mod edit;
pub mod effect;
pub mod serialization;
pub mod session;
pub mod timeline;
pub mod track;

pub use clip::{Clip, ClipId, NewClip};
pub use edit::{EditCommand, EditOutcome};
pub use effect::{Effect, EffectKind};
pub use serialization::{EdlFile, CURRENT_VERSION};
pub use session::EditSession;
pub use timeline::Timeline;
pub use track::{Track, TrackId, TrackKind};
