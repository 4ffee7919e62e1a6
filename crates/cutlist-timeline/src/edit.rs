//! Edit operations on the timeline.
//!
//! Every operation validates its arguments against the current timeline
//! before touching it, so an `Err` always leaves the timeline exactly as it
//! was. Callers that update a view optimistically can roll back by simply
//! discarding their own change.
//!
//! [`EditCommand`] is the serializable form of the same operations, for
//! front-ends that send edits over a message boundary.

use cutlist_core::{EditError, MediaCatalog, PlaybackSpeed, RationalTime};
use serde::{Deserialize, Serialize};

use crate::clip::{check_effects, check_trim, check_volume, Clip, ClipId, EffectList, NewClip};
use crate::effect::Effect;
use crate::timeline::Timeline;
use crate::track::{Track, TrackId, TrackKind};

// ── Track operations ────────────────────────────────────────────

impl Timeline {
    /// Append a new empty track.
    pub fn add_track(&mut self, kind: TrackKind, name: impl Into<String>) -> TrackId {
        let track = Track::new(kind, name);
        let id = track.id;
        self.tracks_mut().push(track);
        id
    }

    /// Remove a track and every clip on it.
    pub fn remove_track(&mut self, track_id: TrackId) -> Result<Track, EditError> {
        let index = self.track_index(track_id)?;
        self.tracks()[index].ensure_unlocked()?;
        let track = self.tracks_mut().remove(index);
        self.recompute_duration();
        Ok(track)
    }

    /// Locking is always allowed, even on a locked track.
    pub fn set_track_locked(&mut self, track_id: TrackId, locked: bool) -> Result<(), EditError> {
        self.track_mut(track_id)?.locked = locked;
        Ok(())
    }

    pub fn set_track_muted(&mut self, track_id: TrackId, muted: bool) -> Result<(), EditError> {
        self.track_mut(track_id)?.muted = muted;
        Ok(())
    }
}

// ── Clip operations ─────────────────────────────────────────────

impl Timeline {
    /// Place a new clip on a track.
    ///
    /// The trim range is checked against the source duration when the
    /// catalog knows the media id; unknown ids are accepted here and
    /// rejected at export.
    pub fn add_clip(
        &mut self,
        track_id: TrackId,
        draft: NewClip,
        catalog: &dyn MediaCatalog,
    ) -> Result<ClipId, EditError> {
        let index = self.track_index(track_id)?;
        self.tracks()[index].ensure_unlocked()?;
        draft.check()?;
        check_trim(
            draft.trim_start,
            draft.trim_end,
            catalog.source_duration(&draft.media_ref_id),
        )?;

        let track = &mut self.tracks_mut()[index];
        let clip = Clip::from_draft(draft, track.next_z_order());
        let id = clip.id();
        track.insert_sorted(clip);
        self.recompute_duration();
        Ok(id)
    }

    /// Remove a clip from whichever track owns it.
    pub fn remove_clip(&mut self, clip_id: ClipId) -> Result<Clip, EditError> {
        let index = self.owner_index(clip_id)?;
        self.tracks()[index].ensure_unlocked()?;
        let clip = self.tracks_mut()[index]
            .take(clip_id)
            .ok_or(EditError::ClipNotFound(clip_id))?;
        self.recompute_duration();
        Ok(clip)
    }

    /// Move a clip to `new_position` on `new_track_id`, which may be the
    /// track it is already on. The clip ends up on top of the destination's
    /// stacking order.
    pub fn move_clip(
        &mut self,
        clip_id: ClipId,
        new_track_id: TrackId,
        new_position: RationalTime,
    ) -> Result<(), EditError> {
        let src = self.owner_index(clip_id)?;
        let dst = self.track_index(new_track_id)?;
        self.tracks()[src].ensure_unlocked()?;
        self.tracks()[dst].ensure_unlocked()?;
        if new_position.is_negative() {
            let duration = self.tracks()[src]
                .clip(clip_id)
                .map(Clip::duration)
                .unwrap_or_default();
            return Err(EditError::InvalidRange {
                start: new_position,
                end: new_position + duration,
                source_duration: None,
            });
        }

        let mut clip = self.tracks_mut()[src]
            .take(clip_id)
            .ok_or(EditError::ClipNotFound(clip_id))?;
        let destination = &mut self.tracks_mut()[dst];
        clip.set_position(new_position);
        clip.set_z_order(destination.next_z_order());
        destination.insert_sorted(clip);
        self.recompute_duration();
        Ok(())
    }

    /// Change the source window of a clip. Its timeline position stays put
    /// and its duration follows the new range.
    pub fn trim_clip(
        &mut self,
        clip_id: ClipId,
        new_trim_start: RationalTime,
        new_trim_end: RationalTime,
        catalog: &dyn MediaCatalog,
    ) -> Result<(), EditError> {
        let index = self.owner_index(clip_id)?;
        let track = &self.tracks()[index];
        track.ensure_unlocked()?;
        let media = track
            .clip(clip_id)
            .map(|c| c.media_ref_id().to_string())
            .ok_or(EditError::ClipNotFound(clip_id))?;
        check_trim(new_trim_start, new_trim_end, catalog.source_duration(&media))?;

        let track = &mut self.tracks_mut()[index];
        if let Some(clip) = track.clip_mut(clip_id) {
            clip.set_trim(new_trim_start, new_trim_end);
        }
        self.recompute_duration();
        Ok(())
    }

    /// Split a clip at timeline time `at`, which must fall strictly inside
    /// the clip. Returns the ids of the two halves; the original id is
    /// retired.
    pub fn split_clip(&mut self, clip_id: ClipId, at: RationalTime) -> Result<(ClipId, ClipId), EditError> {
        let index = self.owner_index(clip_id)?;
        let track = &self.tracks()[index];
        track.ensure_unlocked()?;
        let clip = track.clip(clip_id).ok_or(EditError::ClipNotFound(clip_id))?;
        if !clip.span().contains_interior(at) {
            return Err(EditError::OutOfRange {
                clip: clip_id,
                time: at,
                start: clip.track_position(),
                end: clip.end(),
            });
        }

        let (first, second) = clip.split_at(at);
        let ids = (first.id(), second.id());
        self.tracks_mut()[index].replace_with_pair(clip_id, first, second);
        Ok(ids)
    }

    /// Change playback speed; the clip keeps its position and its duration
    /// follows the new rate.
    pub fn set_clip_speed(&mut self, clip_id: ClipId, speed: PlaybackSpeed) -> Result<(), EditError> {
        if !speed.is_valid() {
            return Err(EditError::InvalidClip("speed must be positive".into()));
        }
        self.with_clip_mut(clip_id, |clip| clip.set_speed(speed))?;
        self.recompute_duration();
        Ok(())
    }

    pub fn set_clip_volume(&mut self, clip_id: ClipId, volume: f64) -> Result<(), EditError> {
        check_volume(volume)?;
        self.with_clip_mut(clip_id, |clip| clip.set_volume(volume))
    }

    /// Replace the clip's effect list.
    pub fn set_clip_effects(&mut self, clip_id: ClipId, effects: Vec<Effect>) -> Result<(), EditError> {
        check_effects(&effects)?;
        let effects: EffectList = effects.into_iter().collect();
        self.with_clip_mut(clip_id, |clip| clip.set_effects(effects))
    }

    /// The clip playing at `time` on every track that has one, in track
    /// order. Overlaps resolve to the highest `z_order`.
    pub fn clips_at(&self, time: RationalTime) -> Vec<(TrackId, &Clip)> {
        self.tracks()
            .iter()
            .filter_map(|t| t.clip_at_time(time).map(|c| (t.id, c)))
            .collect()
    }

    fn with_clip_mut(&mut self, clip_id: ClipId, f: impl FnOnce(&mut Clip)) -> Result<(), EditError> {
        let index = self.owner_index(clip_id)?;
        let track = &mut self.tracks_mut()[index];
        track.ensure_unlocked()?;
        let clip = track.clip_mut(clip_id).ok_or(EditError::ClipNotFound(clip_id))?;
        f(clip);
        Ok(())
    }
}

// ── Edit commands ───────────────────────────────────────────────

/// A timeline edit in serializable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditCommand {
    AddTrack {
        kind: TrackKind,
        name: String,
    },
    RemoveTrack {
        track_id: TrackId,
    },
    SetTrackLocked {
        track_id: TrackId,
        locked: bool,
    },
    SetTrackMuted {
        track_id: TrackId,
        muted: bool,
    },
    AddClip {
        track_id: TrackId,
        clip: NewClip,
    },
    RemoveClip {
        clip_id: ClipId,
    },
    MoveClip {
        clip_id: ClipId,
        track_id: TrackId,
        position: RationalTime,
    },
    TrimClip {
        clip_id: ClipId,
        trim_start: RationalTime,
        trim_end: RationalTime,
    },
    SplitClip {
        clip_id: ClipId,
        at: RationalTime,
    },
    SetClipSpeed {
        clip_id: ClipId,
        speed: PlaybackSpeed,
    },
    SetClipVolume {
        clip_id: ClipId,
        volume: f64,
    },
    SetClipEffects {
        clip_id: ClipId,
        effects: Vec<Effect>,
    },
    /// A batch of commands applied atomically: either all succeed or the
    /// timeline is left untouched.
    Batch {
        commands: Vec<EditCommand>,
    },
}

/// What a successfully applied command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Done,
    TrackAdded(TrackId),
    ClipAdded(ClipId),
    ClipSplit(ClipId, ClipId),
    Batch(Vec<EditOutcome>),
}

impl EditCommand {
    /// Short operation name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddTrack { .. } => "add_track",
            Self::RemoveTrack { .. } => "remove_track",
            Self::SetTrackLocked { .. } => "set_track_locked",
            Self::SetTrackMuted { .. } => "set_track_muted",
            Self::AddClip { .. } => "add_clip",
            Self::RemoveClip { .. } => "remove_clip",
            Self::MoveClip { .. } => "move_clip",
            Self::TrimClip { .. } => "trim_clip",
            Self::SplitClip { .. } => "split_clip",
            Self::SetClipSpeed { .. } => "set_clip_speed",
            Self::SetClipVolume { .. } => "set_clip_volume",
            Self::SetClipEffects { .. } => "set_clip_effects",
            Self::Batch { .. } => "batch",
        }
    }

    /// Apply this command to a timeline.
    pub fn apply(
        &self,
        timeline: &mut Timeline,
        catalog: &dyn MediaCatalog,
    ) -> Result<EditOutcome, EditError> {
        let outcome = match self {
            Self::AddTrack { kind, name } => {
                EditOutcome::TrackAdded(timeline.add_track(*kind, name.clone()))
            }
            Self::RemoveTrack { track_id } => {
                timeline.remove_track(*track_id)?;
                EditOutcome::Done
            }
            Self::SetTrackLocked { track_id, locked } => {
                timeline.set_track_locked(*track_id, *locked)?;
                EditOutcome::Done
            }
            Self::SetTrackMuted { track_id, muted } => {
                timeline.set_track_muted(*track_id, *muted)?;
                EditOutcome::Done
            }
            Self::AddClip { track_id, clip } => {
                EditOutcome::ClipAdded(timeline.add_clip(*track_id, clip.clone(), catalog)?)
            }
            Self::RemoveClip { clip_id } => {
                timeline.remove_clip(*clip_id)?;
                EditOutcome::Done
            }
            Self::MoveClip {
                clip_id,
                track_id,
                position,
            } => {
                timeline.move_clip(*clip_id, *track_id, *position)?;
                EditOutcome::Done
            }
            Self::TrimClip {
                clip_id,
                trim_start,
                trim_end,
            } => {
                timeline.trim_clip(*clip_id, *trim_start, *trim_end, catalog)?;
                EditOutcome::Done
            }
            Self::SplitClip { clip_id, at } => {
                let (first, second) = timeline.split_clip(*clip_id, *at)?;
                EditOutcome::ClipSplit(first, second)
            }
            Self::SetClipSpeed { clip_id, speed } => {
                timeline.set_clip_speed(*clip_id, *speed)?;
                EditOutcome::Done
            }
            Self::SetClipVolume { clip_id, volume } => {
                timeline.set_clip_volume(*clip_id, *volume)?;
                EditOutcome::Done
            }
            Self::SetClipEffects { clip_id, effects } => {
                timeline.set_clip_effects(*clip_id, effects.clone())?;
                EditOutcome::Done
            }
            Self::Batch { commands } => {
                // Work on a copy so a failure part-way leaves no trace.
                let mut scratch = timeline.clone();
                let outcomes = commands
                    .iter()
                    .map(|cmd| cmd.apply(&mut scratch, catalog))
                    .collect::<Result<Vec<_>, _>>()?;
                *timeline = scratch;
                EditOutcome::Batch(outcomes)
            }
        };
        Ok(outcome)
    }
}
