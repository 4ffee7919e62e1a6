//! Editing session: one timeline, the catalog it resolves media against,
//! and where it is stored.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cutlist_core::{EditError, MediaCatalog, RationalTime, SerializationError};
use tracing::{debug, info, warn};

use crate::clip::{Clip, ClipId, NewClip};
use crate::edit::{EditCommand, EditOutcome};
use crate::serialization;
use crate::timeline::Timeline;
use crate::track::TrackId;

/// The single owner of a timeline while it is being edited.
pub struct EditSession {
    timeline: Timeline,
    catalog: Arc<dyn MediaCatalog>,
    path: Option<PathBuf>,
    dirty: bool,
}

impl EditSession {
    pub fn new(timeline: Timeline, catalog: Arc<dyn MediaCatalog>) -> Self {
        Self {
            timeline,
            catalog,
            path: None,
            dirty: false,
        }
    }

    /// Load the EDL at `path` and remember it as the save location.
    pub fn open(path: impl Into<PathBuf>, catalog: Arc<dyn MediaCatalog>) -> Result<Self, SerializationError> {
        let path = path.into();
        let timeline = serialization::load_from_file(&path)?;
        info!(path = %path.display(), clips = timeline.clip_count(), "Opened EDL");
        Ok(Self {
            timeline,
            catalog,
            path: Some(path),
            dirty: false,
        })
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn catalog(&self) -> &dyn MediaCatalog {
        self.catalog.as_ref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True when there are edits not yet saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Apply one command. On error the timeline is unchanged.
    pub fn execute(&mut self, command: &EditCommand) -> Result<EditOutcome, EditError> {
        match command.apply(&mut self.timeline, self.catalog.as_ref()) {
            Ok(outcome) => {
                self.dirty = true;
                debug!(op = command.name(), ?outcome, "Edit applied");
                Ok(outcome)
            }
            Err(e) => {
                warn!(op = command.name(), error = %e, "Edit rejected");
                Err(e)
            }
        }
    }

    pub fn add_clip(&mut self, track_id: TrackId, clip: NewClip) -> Result<ClipId, EditError> {
        match self.execute(&EditCommand::AddClip { track_id, clip })? {
            EditOutcome::ClipAdded(id) => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    pub fn remove_clip(&mut self, clip_id: ClipId) -> Result<(), EditError> {
        self.execute(&EditCommand::RemoveClip { clip_id }).map(drop)
    }

    pub fn move_clip(
        &mut self,
        clip_id: ClipId,
        track_id: TrackId,
        position: RationalTime,
    ) -> Result<(), EditError> {
        self.execute(&EditCommand::MoveClip {
            clip_id,
            track_id,
            position,
        })
        .map(drop)
    }

    pub fn trim_clip(
        &mut self,
        clip_id: ClipId,
        trim_start: RationalTime,
        trim_end: RationalTime,
    ) -> Result<(), EditError> {
        self.execute(&EditCommand::TrimClip {
            clip_id,
            trim_start,
            trim_end,
        })
        .map(drop)
    }

    pub fn split_clip(&mut self, clip_id: ClipId, at: RationalTime) -> Result<(ClipId, ClipId), EditError> {
        match self.execute(&EditCommand::SplitClip { clip_id, at })? {
            EditOutcome::ClipSplit(first, second) => Ok((first, second)),
            other => Err(unexpected(other)),
        }
    }

    pub fn clips_at(&self, time: RationalTime) -> Vec<(TrackId, &Clip)> {
        self.timeline.clips_at(time)
    }

    /// Write the timeline to `path`, which becomes the save location.
    pub fn save(&mut self, path: impl Into<PathBuf>) -> Result<(), SerializationError> {
        let path = path.into();
        serialization::save_to_file(&self.timeline, &path)?;
        info!(path = %path.display(), clips = self.timeline.clip_count(), "Saved EDL");
        self.path = Some(path);
        self.dirty = false;
        Ok(())
    }

    /// Save to the location the session was opened from or last saved to.
    pub fn save_in_place(&mut self) -> Result<(), SerializationError> {
        let path = self.path.clone().ok_or_else(|| {
            SerializationError::MalformedDocument("session has no save location".into())
        })?;
        self.save(path)
    }

    /// Replace the timeline with the EDL at `path`. On error the current
    /// timeline is kept.
    pub fn load(&mut self, path: impl Into<PathBuf>) -> Result<(), SerializationError> {
        let path = path.into();
        self.timeline = serialization::load_from_file(&path)?;
        info!(path = %path.display(), clips = self.timeline.clip_count(), "Loaded EDL");
        self.path = Some(path);
        self.dirty = false;
        Ok(())
    }
}

fn unexpected(outcome: EditOutcome) -> EditError {
    EditError::InvalidTimeline(format!("unexpected edit outcome {outcome:?}"))
}
