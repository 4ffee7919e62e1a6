//! Cutlist Media - Rendering a timeline to a file
//!
//! - Export settings and presets
//! - Render plans built from a timeline and a media catalog
//! - FFmpeg argument generation
//! - A supervisor that runs FFmpeg and reports progress and outcome

pub mod events;
pub mod filters;
pub mod plan;
pub mod progress;
pub mod settings;
pub mod supervisor;

pub use events::{ExportEvent, ExportEvents, ExportOutcome, ExportProgress, FailureReason};
pub use plan::{Composite, ExtractOp, RenderInput, RenderPlan, SegmentOp, TrackPlan};
pub use progress::{parse_elapsed, ProgressTracker};
pub use settings::{AudioCodec, ExportSettings, VideoCodec};
pub use supervisor::{ExportSlot, ExportState, RenderConfig, RenderSupervisor, SlotGuard};
