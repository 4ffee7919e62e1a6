//! Clip types for the timeline.

use cutlist_core::{EditError, PlaybackSpeed, RationalTime, TimeRange};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::effect::Effect;

pub type ClipId = Uuid;

/// Effect lists are short; most clips carry none or one.
pub type EffectList = SmallVec<[Effect; 4]>;

/// A clip on the timeline: a positioned reference to a trimmed span of one
/// media source.
///
/// Clips are only created by timeline edit operations. `duration` is always
/// `(trim_end - trim_start) / speed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    id: ClipId,
    media_ref_id: String,
    track_position: RationalTime,
    duration: RationalTime,
    trim_start: RationalTime,
    trim_end: RationalTime,
    #[serde(default)]
    effects: EffectList,
    volume: f64,
    speed: PlaybackSpeed,
    /// Stacking order on the owning track; higher wins where clips overlap.
    z_order: u64,
}

impl Clip {
    pub(crate) fn from_draft(draft: NewClip, z_order: u64) -> Self {
        let duration = (draft.trim_end - draft.trim_start).slowed_by(draft.speed);
        Self {
            id: Uuid::new_v4(),
            media_ref_id: draft.media_ref_id,
            track_position: draft.track_position,
            duration,
            trim_start: draft.trim_start,
            trim_end: draft.trim_end,
            effects: draft.effects.into_iter().collect(),
            volume: draft.volume,
            speed: draft.speed,
            z_order,
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn media_ref_id(&self) -> &str {
        &self.media_ref_id
    }

    pub fn track_position(&self) -> RationalTime {
        self.track_position
    }

    pub fn duration(&self) -> RationalTime {
        self.duration
    }

    pub fn trim_start(&self) -> RationalTime {
        self.trim_start
    }

    pub fn trim_end(&self) -> RationalTime {
        self.trim_end
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn speed(&self) -> PlaybackSpeed {
        self.speed
    }

    pub fn z_order(&self) -> u64 {
        self.z_order
    }

    /// End of the clip on the timeline (exclusive).
    pub fn end(&self) -> RationalTime {
        self.track_position + self.duration
    }

    /// Timeline span occupied by this clip.
    pub fn span(&self) -> TimeRange {
        TimeRange::new(self.track_position, self.duration)
    }

    /// Source position played at timeline `time`, which must lie in the span.
    pub fn source_time_at(&self, time: RationalTime) -> RationalTime {
        self.trim_start + (time - self.track_position).scaled_by(self.speed)
    }

    pub(crate) fn set_position(&mut self, position: RationalTime) {
        self.track_position = position;
    }

    pub(crate) fn set_z_order(&mut self, z_order: u64) {
        self.z_order = z_order;
    }

    pub(crate) fn set_trim(&mut self, start: RationalTime, end: RationalTime) {
        self.trim_start = start;
        self.trim_end = end;
        self.recompute_duration();
    }

    pub(crate) fn set_speed(&mut self, speed: PlaybackSpeed) {
        self.speed = speed;
        self.recompute_duration();
    }

    pub(crate) fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
    }

    pub(crate) fn set_effects(&mut self, effects: EffectList) {
        self.effects = effects;
    }

    /// Split at timeline `time` (strictly inside the span) into two clips
    /// with fresh ids and independent copies of the effect list.
    pub(crate) fn split_at(&self, time: RationalTime) -> (Clip, Clip) {
        let source_split = self.source_time_at(time);

        let mut first = self.clone();
        first.id = Uuid::new_v4();
        first.set_trim(self.trim_start, source_split);

        let mut second = self.clone();
        second.id = Uuid::new_v4();
        second.track_position = time;
        second.set_trim(source_split, self.trim_end);

        (first, second)
    }

    fn recompute_duration(&mut self) {
        self.duration = (self.trim_end - self.trim_start).slowed_by(self.speed);
    }

    /// Check every per-clip invariant; used when loading documents.
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        if self.media_ref_id.is_empty() {
            return Err(format!("clip {} has an empty media_ref_id", self.id));
        }
        if self.track_position.is_negative() {
            return Err(format!("clip {} has a negative track_position", self.id));
        }
        if self.trim_start.is_negative() || self.trim_start >= self.trim_end {
            return Err(format!(
                "clip {} has trim_start {} not before trim_end {}",
                self.id, self.trim_start, self.trim_end
            ));
        }
        if !self.speed.is_valid() {
            return Err(format!("clip {} has non-positive speed", self.id));
        }
        if !(self.volume.is_finite() && self.volume >= 0.0) {
            return Err(format!("clip {} has invalid volume {}", self.id, self.volume));
        }
        let expected = self
            .trim_end
            .checked_sub(self.trim_start)
            .and_then(|span| span.checked_slowed_by(self.speed))
            .ok_or_else(|| format!("clip {} trim range and speed overflow", self.id))?;
        if self.duration != expected {
            return Err(format!(
                "clip {} duration {} does not match its trim range and speed",
                self.id, self.duration
            ));
        }
        if let Some(effect) = self.effects.iter().find(|e| !e.kind.is_valid()) {
            return Err(format!(
                "clip {} has invalid {} effect parameters",
                self.id,
                effect.kind.name()
            ));
        }
        Ok(())
    }
}

/// Everything needed to create a clip. The timeline assigns the id,
/// stacking order and derived duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClip {
    pub media_ref_id: String,
    #[serde(default)]
    pub track_position: RationalTime,
    pub trim_start: RationalTime,
    pub trim_end: RationalTime,
    #[serde(default)]
    pub speed: PlaybackSpeed,
    #[serde(default = "unity_volume")]
    pub volume: f64,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

fn unity_volume() -> f64 {
    1.0
}

impl NewClip {
    /// A clip playing `trim_start..trim_end` of `media_ref_id` at position zero.
    pub fn new(
        media_ref_id: impl Into<String>,
        trim_start: RationalTime,
        trim_end: RationalTime,
    ) -> Self {
        Self {
            media_ref_id: media_ref_id.into(),
            track_position: RationalTime::ZERO,
            trim_start,
            trim_end,
            speed: PlaybackSpeed::NORMAL,
            volume: 1.0,
            effects: Vec::new(),
        }
    }

    pub fn at(mut self, position: RationalTime) -> Self {
        self.track_position = position;
        self
    }

    pub fn with_speed(mut self, speed: PlaybackSpeed) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Check the draft against everything except the source duration.
    pub(crate) fn check(&self) -> Result<(), EditError> {
        if self.media_ref_id.is_empty() {
            return Err(EditError::InvalidClip("media_ref_id is empty".into()));
        }
        if self.track_position.is_negative() {
            return Err(EditError::InvalidClip(format!(
                "negative track position {}",
                self.track_position
            )));
        }
        if !self.speed.is_valid() {
            return Err(EditError::InvalidClip("speed must be positive".into()));
        }
        check_volume(self.volume)?;
        check_effects(&self.effects)?;
        Ok(())
    }
}

/// Check a trim range against itself and, when known, the source duration.
pub(crate) fn check_trim(
    start: RationalTime,
    end: RationalTime,
    source_duration: Option<RationalTime>,
) -> Result<(), EditError> {
    let exceeds_source = source_duration.is_some_and(|limit| end > limit);
    if start.is_negative() || start >= end || exceeds_source {
        return Err(EditError::InvalidRange {
            start,
            end,
            source_duration,
        });
    }
    Ok(())
}

pub(crate) fn check_volume(volume: f64) -> Result<(), EditError> {
    if volume.is_finite() && volume >= 0.0 {
        Ok(())
    } else {
        Err(EditError::InvalidClip(format!("invalid volume {volume}")))
    }
}

pub(crate) fn check_effects(effects: &[Effect]) -> Result<(), EditError> {
    match effects.iter().find(|e| !e.kind.is_valid()) {
        Some(effect) => Err(EditError::InvalidClip(format!(
            "invalid {} effect parameters",
            effect.kind.name()
        ))),
        None => Ok(()),
    }
}
