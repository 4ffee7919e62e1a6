//! Track types for the timeline.

use cutlist_core::{EditError, RationalTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clip::{Clip, ClipId};

pub type TrackId = Uuid;

/// Kind of track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
    /// Video composited over the base track.
    Overlay,
}

impl TrackKind {
    pub fn is_visual(self) -> bool {
        matches!(self, Self::Video | Self::Overlay)
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Overlay => "overlay",
        };
        f.write_str(name)
    }
}

/// A track holding clips ordered by timeline position.
///
/// Clips may overlap; where they do, the one with the highest `z_order` is
/// the one that plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Unique track ID
    pub id: TrackId,
    /// Track name
    pub name: String,
    /// Track kind
    pub kind: TrackKind,
    /// Clips sorted by `track_position`; equal positions keep insertion order.
    clips: Vec<Clip>,
    /// Is track muted (excluded from renders)
    pub muted: bool,
    /// Is track locked (prevent edits)
    pub locked: bool,
}

impl Track {
    pub fn new(kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            clips: Vec::new(),
            muted: false,
            locked: false,
        }
    }

    /// Create a new video track.
    pub fn new_video(name: impl Into<String>) -> Self {
        Self::new(TrackKind::Video, name)
    }

    /// Create a new audio track.
    pub fn new_audio(name: impl Into<String>) -> Self {
        Self::new(TrackKind::Audio, name)
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Find a clip by id.
    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id() == id)
    }

    pub(crate) fn clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.id() == id)
    }

    pub(crate) fn position_of(&self, id: ClipId) -> Option<usize> {
        self.clips.iter().position(|c| c.id() == id)
    }

    /// End of the last clip on this track.
    pub fn end_time(&self) -> RationalTime {
        self.clips
            .iter()
            .map(Clip::end)
            .max()
            .unwrap_or(RationalTime::ZERO)
    }

    /// Stacking order for the next clip placed on this track.
    pub fn next_z_order(&self) -> u64 {
        self.clips
            .iter()
            .map(|c| c.z_order() + 1)
            .max()
            .unwrap_or(0)
    }

    /// The clip that plays at `time`: the covering clip with the highest
    /// `z_order`.
    pub fn clip_at_time(&self, time: RationalTime) -> Option<&Clip> {
        self.clips
            .iter()
            .take_while(|c| c.track_position() <= time)
            .filter(|c| c.span().contains(time))
            .max_by_key(|c| c.z_order())
    }

    /// Insert keeping clips ordered by position. A clip lands after any
    /// existing clips at the same position.
    pub(crate) fn insert_sorted(&mut self, clip: Clip) {
        let index = self
            .clips
            .partition_point(|c| c.track_position() <= clip.track_position());
        self.clips.insert(index, clip);
    }

    pub(crate) fn take(&mut self, id: ClipId) -> Option<Clip> {
        let index = self.position_of(id)?;
        Some(self.clips.remove(index))
    }

    /// Replace `id` with two clips in place; used by split, where both halves
    /// stay in position order.
    pub(crate) fn replace_with_pair(&mut self, id: ClipId, first: Clip, second: Clip) -> bool {
        let Some(index) = self.position_of(id) else {
            return false;
        };
        self.clips.remove(index);
        self.clips.insert(index, first);
        self.insert_sorted(second);
        true
    }

    pub(crate) fn ensure_unlocked(&self) -> Result<(), EditError> {
        if self.locked {
            Err(EditError::TrackLocked(self.id))
        } else {
            Ok(())
        }
    }

    pub(crate) fn is_sorted(&self) -> bool {
        self.clips
            .windows(2)
            .all(|w| w[0].track_position() <= w[1].track_position())
    }
}
