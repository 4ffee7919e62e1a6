//! Render plans: a validated, self-contained description of how to produce
//! the output file from a timeline.
//!
//! A plan never refers back to the timeline. Each non-muted track becomes a
//! gapless sequence of segments covering `0..duration`, where overlapping
//! clips have already been resolved by stacking order.

use std::collections::HashMap;
use std::path::PathBuf;

use cutlist_core::{MediaCatalog, PlaybackSpeed, RationalTime, ValidationError};
use cutlist_timeline::{Clip, ClipId, EffectKind, Timeline, Track, TrackId, TrackKind};
use serde::{Deserialize, Serialize};

use crate::settings::ExportSettings;

/// One source file fed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderInput {
    /// Position in the renderer's input list.
    pub index: usize,
    pub media_ref_id: String,
    pub path: PathBuf,
}

/// Read part of one clip's source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractOp {
    pub clip_id: ClipId,
    /// Index into [`RenderPlan::inputs`].
    pub input: usize,
    /// Source position to seek to.
    pub seek_to: RationalTime,
    /// Source position to stop reading at (exclusive).
    pub read_to: RationalTime,
    pub speed: PlaybackSpeed,
    pub volume: f64,
    /// Enabled effects, in list order.
    pub effects: Vec<EffectKind>,
    /// This segment begins at the clip's first frame.
    pub starts_clip: bool,
    /// This segment ends at the clip's last frame.
    pub ends_clip: bool,
}

impl ExtractOp {
    /// Timeline time this segment occupies.
    pub fn duration(&self) -> RationalTime {
        (self.read_to - self.seek_to).slowed_by(self.speed)
    }
}

/// A piece of a track's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SegmentOp {
    Extract(ExtractOp),
    /// Nothing plays: black (or transparent) video, or silence.
    Gap { duration: RationalTime },
}

impl SegmentOp {
    pub fn duration(&self) -> RationalTime {
        match self {
            Self::Extract(op) => op.duration(),
            Self::Gap { duration } => *duration,
        }
    }
}

/// The concatenation of one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPlan {
    pub track_id: TrackId,
    pub kind: TrackKind,
    pub segments: Vec<SegmentOp>,
}

/// How track outputs are combined. Values index [`RenderPlan::tracks`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composite {
    /// Bottom video layer; black when absent.
    pub base: Option<usize>,
    /// Layers drawn over the base, bottom to top.
    pub overlays: Vec<usize>,
    /// Tracks mixed into the audio output.
    pub audio: Vec<usize>,
}

/// Everything the supervisor needs to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    pub inputs: Vec<RenderInput>,
    pub tracks: Vec<TrackPlan>,
    pub composite: Composite,
    pub settings: ExportSettings,
    pub output_path: PathBuf,
    /// Declared output length; progress is measured against it.
    pub total_duration: RationalTime,
}

impl RenderPlan {
    /// Validate a timeline and lower it into a plan.
    ///
    /// Checks run in a fixed order and the first failure wins: unresolved
    /// media, then an empty timeline, then unusable settings.
    pub fn build(
        timeline: &Timeline,
        settings: &ExportSettings,
        output_path: impl Into<PathBuf>,
        catalog: &dyn MediaCatalog,
    ) -> Result<Self, ValidationError> {
        for track in timeline.tracks() {
            for clip in track.clips() {
                if !catalog.contains(clip.media_ref_id()) {
                    return Err(ValidationError::MediaMissing(clip.media_ref_id().to_string()));
                }
            }
        }
        if timeline.is_empty() {
            return Err(ValidationError::EmptyTimeline);
        }
        settings.check()?;

        let total_duration = timeline.duration();
        let mut inputs = InputTable::default();
        let mut tracks = Vec::new();
        for track in timeline.tracks().iter().filter(|t| !t.muted && !t.is_empty()) {
            let segments = flatten_track(track, total_duration, &mut inputs, catalog)?;
            tracks.push(TrackPlan {
                track_id: track.id,
                kind: track.kind,
                segments,
            });
        }

        let mut composite = Composite::default();
        for (index, track) in tracks.iter().enumerate() {
            match track.kind {
                TrackKind::Video if composite.base.is_none() => composite.base = Some(index),
                TrackKind::Video | TrackKind::Overlay => composite.overlays.push(index),
                TrackKind::Audio => composite.audio.push(index),
            }
        }

        Ok(Self {
            inputs: inputs.entries,
            tracks,
            composite,
            settings: settings.clone(),
            output_path: output_path.into(),
            total_duration,
        })
    }

    /// Re-check a plan before it is executed; the catalog may have changed
    /// since it was built.
    pub fn validate(&self, catalog: &dyn MediaCatalog) -> Result<(), ValidationError> {
        if let Some(input) = self.inputs.iter().find(|i| !catalog.contains(&i.media_ref_id)) {
            return Err(ValidationError::MediaMissing(input.media_ref_id.clone()));
        }
        if !self.total_duration.is_positive() {
            return Err(ValidationError::EmptyTimeline);
        }
        self.settings.check()?;
        if self.output_path.as_os_str().is_empty() {
            return Err(ValidationError::InvalidSettings("output path is empty".into()));
        }
        Ok(())
    }

    /// Whether the output carries an audio stream.
    pub fn has_audio(&self) -> bool {
        !self.composite.audio.is_empty()
    }

    /// Number of source reads across all tracks.
    pub fn extract_count(&self) -> usize {
        self.tracks
            .iter()
            .flat_map(|t| &t.segments)
            .filter(|s| matches!(s, SegmentOp::Extract(_)))
            .count()
    }
}

#[derive(Default)]
struct InputTable {
    entries: Vec<RenderInput>,
    by_media: HashMap<String, usize>,
}

impl InputTable {
    fn index_for(&mut self, media_ref_id: &str, catalog: &dyn MediaCatalog) -> Result<usize, ValidationError> {
        if let Some(&index) = self.by_media.get(media_ref_id) {
            return Ok(index);
        }
        let descriptor = catalog
            .descriptor(media_ref_id)
            .ok_or_else(|| ValidationError::MediaMissing(media_ref_id.to_string()))?;
        let index = self.entries.len();
        self.entries.push(RenderInput {
            index,
            media_ref_id: media_ref_id.to_string(),
            path: descriptor.path,
        });
        self.by_media.insert(media_ref_id.to_string(), index);
        Ok(index)
    }
}

/// Resolve overlaps and pad a track to `total` as a run of segments.
///
/// The track is cut at every clip boundary; each interval plays the
/// topmost covering clip, or is a gap. Adjacent intervals from the same
/// clip are merged back into one read.
fn flatten_track(
    track: &Track,
    total: RationalTime,
    inputs: &mut InputTable,
    catalog: &dyn MediaCatalog,
) -> Result<Vec<SegmentOp>, ValidationError> {
    let mut cuts: Vec<RationalTime> = track
        .clips()
        .iter()
        .flat_map(|c| [c.track_position(), c.end()])
        .chain([RationalTime::ZERO, total])
        .filter(|t| *t <= total)
        .collect();
    cuts.sort();
    cuts.dedup();

    let mut segments: Vec<SegmentOp> = Vec::new();
    for window in cuts.windows(2) {
        let (from, to) = (window[0], window[1]);
        match track.clip_at_time(from) {
            Some(clip) => {
                let piece = extract_piece(clip, from, to, inputs, catalog)?;
                match segments.last_mut() {
                    Some(SegmentOp::Extract(prev))
                        if prev.clip_id == piece.clip_id && prev.read_to == piece.seek_to =>
                    {
                        prev.read_to = piece.read_to;
                        prev.ends_clip = piece.ends_clip;
                    }
                    _ => segments.push(SegmentOp::Extract(piece)),
                }
            }
            None => match segments.last_mut() {
                Some(SegmentOp::Gap { duration }) => *duration = *duration + (to - from),
                _ => segments.push(SegmentOp::Gap { duration: to - from }),
            },
        }
    }
    Ok(segments)
}

fn extract_piece(
    clip: &Clip,
    from: RationalTime,
    to: RationalTime,
    inputs: &mut InputTable,
    catalog: &dyn MediaCatalog,
) -> Result<ExtractOp, ValidationError> {
    Ok(ExtractOp {
        clip_id: clip.id(),
        input: inputs.index_for(clip.media_ref_id(), catalog)?,
        seek_to: clip.source_time_at(from),
        read_to: clip.source_time_at(to),
        speed: clip.speed(),
        volume: clip.volume(),
        effects: clip
            .effects()
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.kind)
            .collect(),
        starts_clip: from == clip.track_position(),
        ends_clip: to == clip.end(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutlist_core::{FrameRate, InMemoryCatalog, MediaDescriptor, Resolution};
    use cutlist_timeline::{Effect, NewClip};

    fn secs(s: i64) -> RationalTime {
        RationalTime::from_secs(s)
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with(MediaDescriptor::new("m1", "/media/one.mp4", secs(60)))
            .with(MediaDescriptor::new("m2", "/media/two.mp4", secs(60)))
    }

    fn timeline() -> Timeline {
        Timeline::with_default_tracks("plan", Resolution::HD_1080, FrameRate::FPS_30).unwrap()
    }

    fn build(tl: &Timeline) -> Result<RenderPlan, ValidationError> {
        RenderPlan::build(tl, &ExportSettings::youtube_1080p(), "/tmp/out.mp4", &catalog())
    }

    #[test]
    fn test_single_clip_plan() {
        let mut tl = timeline();
        let v1 = tl.tracks()[0].id;
        tl.add_clip(v1, NewClip::new("m1", secs(0), secs(10)), &catalog())
            .unwrap();

        let plan = build(&tl).unwrap();
        assert_eq!(plan.inputs.len(), 1);
        assert_eq!(plan.tracks.len(), 1);
        assert_eq!(plan.composite.base, Some(0));
        assert!(!plan.has_audio());
        assert_eq!(plan.total_duration, secs(10));
        match &plan.tracks[0].segments[..] {
            [SegmentOp::Extract(op)] => {
                assert_eq!(op.seek_to, secs(0));
                assert_eq!(op.read_to, secs(10));
                assert!(op.starts_clip && op.ends_clip);
            }
            other => panic!("unexpected segments {other:?}"),
        }
    }

    #[test]
    fn test_validation_order() {
        let mut tl = timeline();
        let v1 = tl.tracks()[0].id;
        let mut bad_settings = ExportSettings::youtube_1080p();
        bad_settings.frame_rate = FrameRate::new(0, 1);

        // Empty timeline and bad settings: emptiness is reported first.
        assert_eq!(
            RenderPlan::build(&tl, &bad_settings, "/tmp/x.mp4", &catalog()),
            Err(ValidationError::EmptyTimeline)
        );

        tl.add_clip(v1, NewClip::new("ghost", secs(0), secs(5)), &catalog())
            .unwrap();
        assert_eq!(
            RenderPlan::build(&tl, &bad_settings, "/tmp/x.mp4", &catalog()),
            Err(ValidationError::MediaMissing("ghost".into()))
        );
    }

    #[test]
    fn test_invalid_settings_reported_last() {
        let mut tl = timeline();
        let v1 = tl.tracks()[0].id;
        tl.add_clip(v1, NewClip::new("m1", secs(0), secs(5)), &catalog())
            .unwrap();
        let mut settings = ExportSettings::youtube_1080p();
        settings.resolution = Resolution::new(0, 0);
        assert!(matches!(
            RenderPlan::build(&tl, &settings, "/tmp/x.mp4", &catalog()),
            Err(ValidationError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_gaps_pad_to_timeline_duration() {
        let mut tl = timeline();
        let (v1, a1) = (tl.tracks()[0].id, tl.tracks()[1].id);
        let cat = catalog();
        tl.add_clip(v1, NewClip::new("m1", secs(0), secs(4)).at(secs(2)), &cat)
            .unwrap();
        tl.add_clip(a1, NewClip::new("m2", secs(0), secs(10)), &cat).unwrap();

        let plan = build(&tl).unwrap();
        let video = &plan.tracks[0].segments;
        assert_eq!(video.len(), 3);
        assert_eq!(video[0], SegmentOp::Gap { duration: secs(2) });
        assert_eq!(video[1].duration(), secs(4));
        assert_eq!(video[2], SegmentOp::Gap { duration: secs(4) });
        assert_eq!(plan.composite.audio, vec![1]);
        assert_eq!(plan.inputs.len(), 2);
    }

    #[test]
    fn test_overlap_resolved_by_z_order() {
        let mut tl = timeline();
        let v1 = tl.tracks()[0].id;
        let cat = catalog();
        let under = tl
            .add_clip(v1, NewClip::new("m1", secs(0), secs(10)), &cat)
            .unwrap();
        let over = tl
            .add_clip(v1, NewClip::new("m2", secs(20), secs(23)).at(secs(4)), &cat)
            .unwrap();

        let plan = build(&tl).unwrap();
        let segs: Vec<_> = plan.tracks[0]
            .segments
            .iter()
            .map(|s| match s {
                SegmentOp::Extract(op) => (op.clip_id, op.seek_to, op.read_to),
                SegmentOp::Gap { .. } => panic!("no gaps expected"),
            })
            .collect();
        assert_eq!(
            segs,
            vec![
                (under, secs(0), secs(4)),
                (over, secs(20), secs(23)),
                (under, secs(7), secs(10)),
            ]
        );
        let total: RationalTime = plan.tracks[0]
            .segments
            .iter()
            .fold(RationalTime::ZERO, |acc, s| acc + s.duration());
        assert_eq!(total, plan.total_duration);
    }

    #[test]
    fn test_muted_tracks_and_disabled_effects_skipped() {
        let mut tl = timeline();
        let (v1, a1) = (tl.tracks()[0].id, tl.tracks()[1].id);
        let cat = catalog();
        tl.add_clip(
            v1,
            NewClip::new("m1", secs(0), secs(5))
                .with_effect(Effect::blur(4.0).disabled())
                .with_effect(Effect::brightness(0.1)),
            &cat,
        )
        .unwrap();
        tl.add_clip(a1, NewClip::new("m2", secs(0), secs(5)), &cat).unwrap();
        tl.set_track_muted(a1, true).unwrap();

        let plan = build(&tl).unwrap();
        assert_eq!(plan.tracks.len(), 1);
        assert_eq!(plan.inputs.len(), 1);
        match &plan.tracks[0].segments[0] {
            SegmentOp::Extract(op) => {
                assert_eq!(op.effects, vec![EffectKind::Brightness { value: 0.1 }])
            }
            other => panic!("unexpected segment {other:?}"),
        }
    }

    #[test]
    fn test_validate_catches_catalog_change() {
        let mut tl = timeline();
        let v1 = tl.tracks()[0].id;
        tl.add_clip(v1, NewClip::new("m1", secs(0), secs(5)), &catalog())
            .unwrap();
        let plan = build(&tl).unwrap();
        assert!(plan.validate(&catalog()).is_ok());
        assert_eq!(
            plan.validate(&InMemoryCatalog::new()),
            Err(ValidationError::MediaMissing("m1".into()))
        );
    }
}
