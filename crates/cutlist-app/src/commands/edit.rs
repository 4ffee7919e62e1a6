//! Timeline editing commands. Each one opens the EDL, applies a single
//! all-or-nothing edit and writes the file back only if the edit succeeded.

use std::path::PathBuf;
use std::sync::Arc;

use cutlist_core::{CutlistError, FrameRate, InMemoryCatalog, PlaybackSpeed, RationalTime, Resolution};
use cutlist_timeline::{ClipId, EditCommand, EditOutcome, EditSession, NewClip, Timeline, TrackKind};

use super::{open_session, resolve_track};

/// Clip fields collected from the command line.
pub struct ClipArgs {
    pub media: String,
    pub start: RationalTime,
    pub end: RationalTime,
    pub at: RationalTime,
    pub speed: PlaybackSpeed,
    pub volume: f64,
}

pub fn new(
    edl: PathBuf,
    name: String,
    resolution: Resolution,
    frame_rate: FrameRate,
    empty: bool,
    force: bool,
) -> anyhow::Result<()> {
    if edl.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", edl.display());
    }

    let timeline = if empty {
        Timeline::new(name, resolution, frame_rate)
    } else {
        Timeline::with_default_tracks(name, resolution, frame_rate)
    }
    .map_err(CutlistError::from)?;

    let mut session = EditSession::new(timeline, Arc::new(InMemoryCatalog::new()));
    session.save(&edl).map_err(CutlistError::from)?;

    let timeline = session.timeline();
    println!("Created timeline '{}' at {}", timeline.name(), edl.display());
    println!("  Resolution: {}", timeline.resolution());
    println!("  Frame rate: {}", timeline.frame_rate());
    for track in timeline.tracks() {
        println!("  Track {} ({}): {}", track.name, track.kind, track.id);
    }
    Ok(())
}

pub fn add_track(
    edl: PathBuf,
    catalog: Option<PathBuf>,
    kind: TrackKind,
    name: String,
) -> anyhow::Result<()> {
    let mut session = open_session(edl, catalog.as_deref())?;
    let outcome = execute(&mut session, EditCommand::AddTrack { kind, name: name.clone() })?;
    if let EditOutcome::TrackAdded(id) = outcome {
        println!("Added {kind} track '{name}': {id}");
    }
    Ok(())
}

pub fn set_track(
    edl: PathBuf,
    catalog: Option<PathBuf>,
    track: &str,
    locked: Option<bool>,
    muted: Option<bool>,
) -> anyhow::Result<()> {
    if locked.is_none() && muted.is_none() {
        anyhow::bail!("Nothing to change: pass --locked and/or --muted");
    }
    let mut session = open_session(edl, catalog.as_deref())?;
    let track_id = resolve_track(session.timeline(), track)?;

    let mut commands = Vec::new();
    if let Some(locked) = locked {
        commands.push(EditCommand::SetTrackLocked { track_id, locked });
    }
    if let Some(muted) = muted {
        commands.push(EditCommand::SetTrackMuted { track_id, muted });
    }
    execute(&mut session, EditCommand::Batch { commands })?;

    if let Some(track) = session.timeline().track(track_id) {
        println!(
            "Track '{}': locked={} muted={}",
            track.name, track.locked, track.muted
        );
    }
    Ok(())
}

pub fn add_clip(
    edl: PathBuf,
    catalog: Option<PathBuf>,
    track: &str,
    args: ClipArgs,
) -> anyhow::Result<()> {
    let mut session = open_session(edl, catalog.as_deref())?;
    let track_id = resolve_track(session.timeline(), track)?;

    let clip = NewClip::new(args.media, args.start, args.end)
        .at(args.at)
        .with_speed(args.speed)
        .with_volume(args.volume);
    let clip_id = session.add_clip(track_id, clip).map_err(CutlistError::from)?;
    save(&mut session)?;

    if let Some((_, clip)) = session.timeline().find_clip(clip_id) {
        println!(
            "Added clip {clip_id} at {} ({} long)",
            clip.track_position(),
            clip.duration()
        );
    }
    Ok(())
}

pub fn remove_clip(edl: PathBuf, catalog: Option<PathBuf>, clip_id: ClipId) -> anyhow::Result<()> {
    let mut session = open_session(edl, catalog.as_deref())?;
    session.remove_clip(clip_id).map_err(CutlistError::from)?;
    save(&mut session)?;
    println!("Removed clip {clip_id}");
    Ok(())
}

pub fn move_clip(
    edl: PathBuf,
    catalog: Option<PathBuf>,
    clip_id: ClipId,
    track: &str,
    position: RationalTime,
) -> anyhow::Result<()> {
    let mut session = open_session(edl, catalog.as_deref())?;
    let track_id = resolve_track(session.timeline(), track)?;
    session
        .move_clip(clip_id, track_id, position)
        .map_err(CutlistError::from)?;
    save(&mut session)?;
    println!("Moved clip {clip_id} to {position}");
    Ok(())
}

pub fn trim_clip(
    edl: PathBuf,
    catalog: Option<PathBuf>,
    clip_id: ClipId,
    start: RationalTime,
    end: RationalTime,
) -> anyhow::Result<()> {
    let mut session = open_session(edl, catalog.as_deref())?;
    session
        .trim_clip(clip_id, start, end)
        .map_err(CutlistError::from)?;
    save(&mut session)?;
    if let Some((_, clip)) = session.timeline().find_clip(clip_id) {
        println!(
            "Trimmed clip {clip_id} to {start}..{end} ({} long)",
            clip.duration()
        );
    }
    Ok(())
}

pub fn split_clip(
    edl: PathBuf,
    catalog: Option<PathBuf>,
    clip_id: ClipId,
    at: RationalTime,
) -> anyhow::Result<()> {
    let mut session = open_session(edl, catalog.as_deref())?;
    let (first, second) = session.split_clip(clip_id, at).map_err(CutlistError::from)?;
    save(&mut session)?;
    println!("Split clip {clip_id} at {at}");
    println!("  First:  {first}");
    println!("  Second: {second}");
    Ok(())
}

/// Apply a JSON command, or an array of them as one batch.
pub fn apply(edl: PathBuf, catalog: Option<PathBuf>, commands: PathBuf) -> anyhow::Result<()> {
    let data = std::fs::read(&commands).map_err(CutlistError::from)?;
    let value: serde_json::Value = serde_json::from_slice(&data).map_err(CutlistError::from)?;
    let command = if value.is_array() {
        EditCommand::Batch {
            commands: serde_json::from_value(value).map_err(CutlistError::from)?,
        }
    } else {
        serde_json::from_value(value).map_err(CutlistError::from)?
    };

    let mut session = open_session(edl, catalog.as_deref())?;
    let outcome = execute(&mut session, command)?;
    print_outcome(&outcome, 0);
    Ok(())
}

fn execute(session: &mut EditSession, command: EditCommand) -> anyhow::Result<EditOutcome> {
    let outcome = session.execute(&command).map_err(CutlistError::from)?;
    save(session)?;
    Ok(outcome)
}

fn save(session: &mut EditSession) -> Result<(), CutlistError> {
    session.save_in_place()?;
    Ok(())
}

fn print_outcome(outcome: &EditOutcome, depth: usize) {
    let indent = "  ".repeat(depth);
    match outcome {
        EditOutcome::Done => println!("{indent}ok"),
        EditOutcome::TrackAdded(id) => println!("{indent}track added: {id}"),
        EditOutcome::ClipAdded(id) => println!("{indent}clip added: {id}"),
        EditOutcome::ClipSplit(first, second) => println!("{indent}clip split: {first} {second}"),
        EditOutcome::Batch(outcomes) => {
            println!("{indent}batch of {}", outcomes.len());
            for outcome in outcomes {
                print_outcome(outcome, depth + 1);
            }
        }
    }
}
