//! The timeline: an ordered set of tracks rendered as one program.

use std::collections::HashSet;

use cutlist_core::{EditError, FrameRate, RationalTime, Resolution};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clip::{Clip, ClipId};
use crate::track::{Track, TrackId, TrackKind};

/// A timeline containing tracks.
///
/// Fields are private so that every mutation goes through the edit
/// operations in [`crate::edit`], which keep `duration` and the clip
/// ordering consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    id: Uuid,
    name: String,
    frame_rate: FrameRate,
    resolution: Resolution,
    tracks: Vec<Track>,
    /// Derived: end of the latest clip on any track.
    duration: RationalTime,
}

impl Timeline {
    /// Create an empty timeline with no tracks.
    pub fn new(
        name: impl Into<String>,
        resolution: Resolution,
        frame_rate: FrameRate,
    ) -> Result<Self, EditError> {
        if !resolution.is_positive() {
            return Err(EditError::InvalidTimeline(format!(
                "resolution {resolution} must be positive"
            )));
        }
        if !frame_rate.is_positive() {
            return Err(EditError::InvalidTimeline(format!(
                "frame rate {frame_rate} must be positive"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            frame_rate,
            resolution,
            tracks: Vec::new(),
            duration: RationalTime::ZERO,
        })
    }

    /// Create a timeline with one video track `V1` and one audio track `A1`.
    pub fn with_default_tracks(
        name: impl Into<String>,
        resolution: Resolution,
        frame_rate: FrameRate,
    ) -> Result<Self, EditError> {
        let mut timeline = Self::new(name, resolution, frame_rate)?;
        timeline.tracks.push(Track::new_video("V1"));
        timeline.tracks.push(Track::new_audio("A1"));
        Ok(timeline)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn duration(&self) -> RationalTime {
        self.duration
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// First track of the given kind.
    pub fn first_track_of(&self, kind: TrackKind) -> Option<&Track> {
        self.tracks.iter().find(|t| t.kind == kind)
    }

    /// Find a clip anywhere on the timeline, with its owning track.
    pub fn find_clip(&self, id: ClipId) -> Option<(&Track, &Clip)> {
        self.tracks
            .iter()
            .find_map(|t| t.clip(id).map(|c| (t, c)))
    }

    pub fn clip_count(&self) -> usize {
        self.tracks.iter().map(Track::clip_count).sum()
    }

    /// True when no track holds a clip.
    pub fn is_empty(&self) -> bool {
        self.tracks.iter().all(Track::is_empty)
    }

    pub(crate) fn tracks_mut(&mut self) -> &mut Vec<Track> {
        &mut self.tracks
    }

    pub(crate) fn track_mut(&mut self, id: TrackId) -> Result<&mut Track, EditError> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(EditError::TrackNotFound(id))
    }

    pub(crate) fn track_index(&self, id: TrackId) -> Result<usize, EditError> {
        self.tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or(EditError::TrackNotFound(id))
    }

    /// Index of the track owning `clip`.
    pub(crate) fn owner_index(&self, clip: ClipId) -> Result<usize, EditError> {
        self.tracks
            .iter()
            .position(|t| t.clip(clip).is_some())
            .ok_or(EditError::ClipNotFound(clip))
    }

    fn computed_duration(&self) -> RationalTime {
        self.tracks
            .iter()
            .map(Track::end_time)
            .max()
            .unwrap_or(RationalTime::ZERO)
    }

    /// [`Timeline::computed_duration`] for untrusted clips; `None` when a
    /// clip end overflows.
    fn checked_duration(&self) -> Option<RationalTime> {
        let mut end = RationalTime::ZERO;
        for clip in self.tracks.iter().flat_map(Track::clips) {
            end = end.max(clip.track_position().checked_add(clip.duration())?);
        }
        Some(end)
    }

    pub(crate) fn recompute_duration(&mut self) {
        self.duration = self.computed_duration();
    }

    /// Check every structural invariant. Used after loading a document.
    pub fn validate(&self) -> Result<(), String> {
        if !self.resolution.is_positive() {
            return Err(format!("resolution {} must be positive", self.resolution));
        }
        if !self.frame_rate.is_positive() {
            return Err(format!("frame rate {} must be positive", self.frame_rate));
        }

        let mut track_ids = HashSet::new();
        let mut clip_ids = HashSet::new();
        for track in &self.tracks {
            if !track_ids.insert(track.id) {
                return Err(format!("duplicate track id {}", track.id));
            }
            if !track.is_sorted() {
                return Err(format!("clips on track {} are not ordered by position", track.id));
            }
            for clip in track.clips() {
                if !clip_ids.insert(clip.id()) {
                    return Err(format!("duplicate clip id {}", clip.id()));
                }
                clip.check_invariants()?;
            }
        }

        let expected = self
            .checked_duration()
            .ok_or_else(|| "clip extent exceeds the representable time range".to_string())?;
        if self.duration != expected {
            return Err(format!(
                "stored duration {} does not match clip extent {}",
                self.duration, expected
            ));
        }
        Ok(())
    }
}
