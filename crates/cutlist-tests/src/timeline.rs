//! Integration tests for the timeline subsystem.
//!
//! Exercises cross-crate interactions between cutlist-core,
//! cutlist-timeline, and cutlist-media.

use std::sync::Arc;

use cutlist_core::{
    EditError, FrameRate, InMemoryCatalog, MediaDescriptor, PlaybackSpeed, RationalTime,
    Resolution, SerializationError, ValidationError,
};
use cutlist_media::{ExportSettings, RenderPlan, SegmentOp};
use cutlist_timeline::{
    serialization, ClipId, EditCommand, EditSession, Effect, NewClip, Timeline, TrackId,
    TrackKind,
};
use proptest::prelude::*;

// ── Helpers ────────────────────────────────────────────────────

fn secs(s: i64) -> RationalTime {
    RationalTime::from_secs(s)
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with(MediaDescriptor::new("m1", "/media/m1.mp4", secs(10)))
        .with(MediaDescriptor::new("m2", "/media/m2.mp4", secs(60)))
        .with(MediaDescriptor::new("music", "/media/music.wav", secs(120)))
}

fn empty_timeline() -> Timeline {
    Timeline::with_default_tracks("Integration", Resolution::HD_1080, FrameRate::FPS_30).unwrap()
}

/// V1: m1 0..10 at 0, m2 5..25 at 10. A1: music 0..30 at 0.
fn build_timeline() -> (Timeline, ClipId, ClipId) {
    let catalog = catalog();
    let mut timeline = empty_timeline();
    let v1 = timeline.tracks()[0].id;
    let a1 = timeline.tracks()[1].id;

    let first = timeline
        .add_clip(v1, NewClip::new("m1", secs(0), secs(10)), &catalog)
        .unwrap();
    let second = timeline
        .add_clip(
            v1,
            NewClip::new("m2", secs(5), secs(25))
                .at(secs(10))
                .with_effect(Effect::fade_in(secs(1))),
            &catalog,
        )
        .unwrap();
    timeline
        .add_clip(a1, NewClip::new("music", secs(0), secs(30)).with_volume(0.5), &catalog)
        .unwrap();
    (timeline, first, second)
}

fn max_end(timeline: &Timeline) -> RationalTime {
    timeline
        .tracks()
        .iter()
        .flat_map(|t| t.clips())
        .map(|c| c.end())
        .max()
        .unwrap_or(RationalTime::ZERO)
}

// ── Timeline assembly ─────────────────────────────────────────

#[test]
fn duration_is_latest_clip_end() {
    let (timeline, _, _) = build_timeline();
    assert_eq!(timeline.duration(), secs(30));
    assert_eq!(timeline.clip_count(), 3);
}

#[test]
fn clips_at_reports_one_clip_per_track() {
    let (timeline, first, second) = build_timeline();
    let hits = timeline.clips_at(secs(12));
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].1.id(), second);
    assert_eq!(hits[1].1.media_ref_id(), "music");

    let hits = timeline.clips_at(secs(3));
    assert_eq!(hits[0].1.id(), first);

    assert!(timeline.clips_at(secs(30)).is_empty());
}

#[test]
fn overlapping_clip_added_later_wins() {
    let catalog = catalog();
    let (mut timeline, first, _) = build_timeline();
    let v1 = timeline.tracks()[0].id;
    let over = timeline
        .add_clip(v1, NewClip::new("m2", secs(0), secs(4)).at(secs(2)), &catalog)
        .unwrap();

    assert_eq!(timeline.clips_at(secs(3))[0].1.id(), over);
    assert_eq!(timeline.clips_at(secs(7))[0].1.id(), first);
}

// ── Split ──────────────────────────────────────────────────────

#[test]
fn split_ten_second_clip_at_four() {
    let (mut timeline, first, _) = build_timeline();
    let (a, b) = timeline.split_clip(first, secs(4)).unwrap();

    let (_, a) = timeline.find_clip(a).unwrap();
    let (_, b) = timeline.find_clip(b).unwrap();
    assert_eq!(a.duration(), secs(4));
    assert_eq!(b.duration(), secs(6));
    assert_eq!(a.end(), b.track_position());
    assert_eq!(a.media_ref_id(), "m1");
    assert_eq!(b.media_ref_id(), "m1");
    assert_eq!(a.trim_end(), b.trim_start());
    assert!(timeline.find_clip(first).is_none());
}

#[test]
fn split_copies_effects_independently() {
    let (mut timeline, _, second) = build_timeline();
    let (a, b) = timeline.split_clip(second, secs(15)).unwrap();

    timeline.set_clip_effects(a, vec![Effect::blur(3.0)]).unwrap();
    let (_, b_clip) = timeline.find_clip(b).unwrap();
    assert_eq!(b_clip.effects(), [Effect::fade_in(secs(1))]);
}

#[test]
fn split_at_clip_boundary_is_rejected() {
    let (mut timeline, first, _) = build_timeline();
    let before = timeline.clone();
    let err = timeline.split_clip(first, secs(10)).unwrap_err();
    assert!(matches!(err, EditError::OutOfRange { .. }));
    assert_eq!(timeline, before);
}

// ── Trim / move ────────────────────────────────────────────────

#[test]
fn trim_beyond_source_is_rejected_unchanged() {
    let catalog = catalog();
    let (mut timeline, first, _) = build_timeline();
    let before = timeline.clone();

    let err = timeline.trim_clip(first, secs(2), secs(11), &catalog).unwrap_err();
    assert!(matches!(err, EditError::InvalidRange { .. }));
    let err = timeline.trim_clip(first, secs(5), secs(5), &catalog).unwrap_err();
    assert!(matches!(err, EditError::InvalidRange { .. }));
    assert_eq!(timeline, before);

    timeline.trim_clip(first, secs(2), secs(8), &catalog).unwrap();
    let (_, clip) = timeline.find_clip(first).unwrap();
    assert_eq!(clip.duration(), secs(6));
    assert_eq!(clip.track_position(), RationalTime::ZERO);
}

#[test]
fn move_to_locked_track_leaves_everything_in_place() {
    let (mut timeline, first, _) = build_timeline();
    let locked = timeline.add_track(TrackKind::Overlay, "Titles");
    timeline.set_track_locked(locked, true).unwrap();
    let before = timeline.clone();

    let err = timeline.move_clip(first, locked, secs(0)).unwrap_err();
    assert_eq!(err, EditError::TrackLocked(locked));
    assert_eq!(timeline, before);
}

#[test]
fn move_between_tracks_transfers_ownership() {
    let (mut timeline, first, _) = build_timeline();
    let overlay = timeline.add_track(TrackKind::Overlay, "Titles");
    timeline.move_clip(first, overlay, secs(40)).unwrap();

    let (track, clip) = timeline.find_clip(first).unwrap();
    assert_eq!(track.id, overlay);
    assert_eq!(clip.track_position(), secs(40));
    assert_eq!(timeline.duration(), secs(50));
    assert_eq!(timeline.tracks()[0].clip_count(), 1);
}

#[test]
fn failed_batch_rolls_back() {
    let catalog = catalog();
    let (mut timeline, first, _) = build_timeline();
    let before = timeline.clone();

    let batch = EditCommand::Batch {
        commands: vec![
            EditCommand::RemoveClip { clip_id: first },
            EditCommand::SplitClip {
                clip_id: first,
                at: secs(2),
            },
        ],
    };
    let err = batch.apply(&mut timeline, &catalog).unwrap_err();
    assert_eq!(err, EditError::ClipNotFound(first));
    assert_eq!(timeline, before);
}

// ── Persistence ────────────────────────────────────────────────

#[test]
fn session_save_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.edl.json");
    let catalog: Arc<InMemoryCatalog> = Arc::new(catalog());

    let (timeline, first, _) = build_timeline();
    let mut session = EditSession::new(timeline, catalog.clone());
    session.split_clip(first, secs(4)).unwrap();
    assert!(session.is_dirty());
    session.save(&path).unwrap();
    assert!(!session.is_dirty());

    let reopened = EditSession::open(&path, catalog).unwrap();
    assert_eq!(reopened.timeline(), session.timeline());
    assert_eq!(reopened.path(), Some(path.as_path()));
}

#[test]
fn future_version_is_rejected() {
    let (timeline, _, _) = build_timeline();
    let mut doc = serialization::serialize(&timeline).unwrap();
    doc["version"] = serde_json::json!(2);
    let err = serialization::deserialize(doc).unwrap_err();
    assert!(matches!(
        err,
        SerializationError::UnsupportedVersion { found: 2, .. }
    ));
}

#[test]
fn document_with_inverted_trim_is_malformed() {
    let (timeline, _, _) = build_timeline();
    let mut doc = serialization::serialize(&timeline).unwrap();
    let clip = &mut doc["timeline"]["tracks"][0]["clips"][0];
    clip["trim_start"] = serde_json::json!([9, 1]);
    clip["trim_end"] = serde_json::json!([3, 1]);
    let err = serialization::deserialize(doc).unwrap_err();
    assert!(matches!(err, SerializationError::MalformedDocument(_)));
}

// ── Render plan ────────────────────────────────────────────────

#[test]
fn plan_covers_timeline_and_mixes_audio() {
    let catalog = catalog();
    let (timeline, _, _) = build_timeline();
    let plan = RenderPlan::build(
        &timeline,
        &ExportSettings::youtube_1080p(),
        "/tmp/out.mp4",
        &catalog,
    )
    .unwrap();

    assert_eq!(plan.total_duration, secs(30));
    assert_eq!(plan.inputs.len(), 3);
    assert_eq!(plan.composite.base, Some(0));
    assert_eq!(plan.composite.audio, vec![1]);
    assert!(plan.has_audio());

    let video: RationalTime = plan.tracks[0]
        .segments
        .iter()
        .fold(RationalTime::ZERO, |acc, s| acc + s.duration());
    assert_eq!(video, secs(30));
    assert!(matches!(plan.tracks[0].segments[0], SegmentOp::Extract(_)));

    let args = plan.ffmpeg_args();
    assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
    assert!(args.iter().any(|a| a.contains("amix") || a.contains("anull")));
}

#[test]
fn plan_rejects_unknown_media_before_empty_check() {
    let mut timeline = empty_timeline();
    let v1 = timeline.tracks()[0].id;
    timeline
        .add_clip(v1, NewClip::new("ghost", secs(0), secs(3)), &InMemoryCatalog::new())
        .unwrap();

    let err = RenderPlan::build(
        &timeline,
        &ExportSettings::youtube_1080p(),
        "/tmp/out.mp4",
        &catalog(),
    )
    .unwrap_err();
    assert_eq!(err, ValidationError::MediaMissing("ghost".into()));
}

#[test]
fn plan_rejects_empty_timeline_and_bad_settings() {
    let catalog = catalog();
    let err = RenderPlan::build(
        &empty_timeline(),
        &ExportSettings::youtube_1080p(),
        "/tmp/out.mp4",
        &catalog,
    )
    .unwrap_err();
    assert_eq!(err, ValidationError::EmptyTimeline);

    let (timeline, _, _) = build_timeline();
    let mut settings = ExportSettings::youtube_1080p();
    settings.resolution = Resolution::new(0, 1080);
    let err = RenderPlan::build(&timeline, &settings, "/tmp/out.mp4", &catalog).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidSettings(_)));
}

// ── Properties ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Add { track: usize, start: i64, len: i64, at: i64 },
    Remove { pick: usize },
    Move { pick: usize, track: usize, at: i64 },
    Trim { pick: usize, start: i64, len: i64 },
    Split { pick: usize, offset_tenths: i64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..2usize, 0..50i64, 1..10i64, 0..100i64)
            .prop_map(|(track, start, len, at)| Op::Add { track, start, len, at }),
        any::<usize>().prop_map(|pick| Op::Remove { pick }),
        (any::<usize>(), 0..2usize, 0..100i64).prop_map(|(pick, track, at)| Op::Move { pick, track, at }),
        (any::<usize>(), 0..55i64, 0..10i64).prop_map(|(pick, start, len)| Op::Trim { pick, start, len }),
        (any::<usize>(), 0..200i64).prop_map(|(pick, offset_tenths)| Op::Split { pick, offset_tenths }),
    ]
}

fn all_clip_ids(timeline: &Timeline) -> Vec<ClipId> {
    timeline
        .tracks()
        .iter()
        .flat_map(|t| t.clips().iter().map(|c| c.id()))
        .collect()
}

/// Apply `op`, ignoring rejections; failures must leave the timeline as it was.
fn apply(timeline: &mut Timeline, op: &Op, catalog: &InMemoryCatalog) {
    let before = timeline.clone();
    let ids = all_clip_ids(timeline);
    let tracks: Vec<TrackId> = timeline.tracks().iter().map(|t| t.id).collect();
    let pick = |i: usize| (!ids.is_empty()).then(|| ids[i % ids.len()]);
    let track = |i: usize| tracks[i];

    let result = match *op {
        Op::Add { track: t, start, len, at } => timeline
            .add_clip(
                track(t),
                NewClip::new("m2", secs(start), secs(start + len)).at(secs(at)),
                catalog,
            )
            .map(drop),
        Op::Remove { pick: p } => match pick(p) {
            Some(id) => timeline.remove_clip(id).map(drop),
            None => return,
        },
        Op::Move { pick: p, track: t, at } => match pick(p) {
            Some(id) => timeline.move_clip(id, track(t), secs(at)),
            None => return,
        },
        Op::Trim { pick: p, start, len } => match pick(p) {
            Some(id) => timeline.trim_clip(id, secs(start), secs(start + len), catalog),
            None => return,
        },
        Op::Split { pick: p, offset_tenths } => match pick(p) {
            Some(id) => {
                let (_, clip) = timeline.find_clip(id).unwrap();
                let at = clip.track_position() + RationalTime::new(offset_tenths, 10);
                timeline.split_clip(id, at).map(drop)
            }
            None => return,
        },
    };
    if result.is_err() {
        assert_eq!(*timeline, before, "rejected {op:?} mutated the timeline");
    }
}

proptest! {
    #[test]
    fn duration_tracks_latest_end(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let catalog = catalog();
        let mut timeline = empty_timeline();
        for op in &ops {
            apply(&mut timeline, op, &catalog);
            prop_assert_eq!(timeline.duration(), max_end(&timeline));
        }
    }

    #[test]
    fn round_trip_preserves_timeline(ops in prop::collection::vec(op_strategy(), 0..25)) {
        let catalog = catalog();
        let mut timeline = empty_timeline();
        for op in &ops {
            apply(&mut timeline, op, &catalog);
        }
        let doc = serialization::serialize(&timeline).unwrap();
        prop_assert_eq!(serialization::deserialize(doc).unwrap(), timeline.clone());
        let bytes = serialization::to_json(&timeline).unwrap();
        prop_assert_eq!(serialization::from_json(&bytes).unwrap(), timeline);
    }

    #[test]
    fn split_halves_are_contiguous(
        start in 0..50i64,
        len in 1..10i64,
        speed_num in 1..8i64,
        speed_den in 1..4i64,
        cut in 1..1000i64,
    ) {
        let catalog = catalog();
        let mut timeline = empty_timeline();
        let v1 = timeline.tracks()[0].id;
        let speed = PlaybackSpeed::new(speed_num, speed_den).unwrap();
        let id = timeline
            .add_clip(
                v1,
                NewClip::new("m2", secs(start), secs(start + len)).at(secs(3)).with_speed(speed),
                &catalog,
            )
            .unwrap();
        let original = timeline.find_clip(id).unwrap().1.clone();
        // cut/1000 of the way through the clip
        let at = original.track_position()
            + original.duration().scaled_by(PlaybackSpeed::new(cut, 1000).unwrap());

        let (a, b) = timeline.split_clip(id, at).unwrap();
        let (_, a) = timeline.find_clip(a).unwrap();
        let (_, b) = timeline.find_clip(b).unwrap();
        prop_assert_eq!(a.track_position(), original.track_position());
        prop_assert_eq!(a.end(), b.track_position());
        prop_assert_eq!(b.end(), original.end());
        prop_assert_eq!(a.duration() + b.duration(), original.duration());
        prop_assert_eq!(a.trim_start(), original.trim_start());
        prop_assert_eq!(a.trim_end(), b.trim_start());
        prop_assert_eq!(b.trim_end(), original.trim_end());
    }
}
