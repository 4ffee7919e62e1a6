//! Read-only views of a timeline and of the export presets.

use std::path::PathBuf;

use cutlist_core::{CutlistError, RationalTime};
use cutlist_media::ExportSettings;
use cutlist_timeline::serialization;

pub fn run(edl: PathBuf) -> anyhow::Result<()> {
    let timeline = serialization::load_from_file(&edl).map_err(CutlistError::from)?;

    println!("Timeline: {}", timeline.name());
    println!("  ID:         {}", timeline.id());
    println!("  Resolution: {}", timeline.resolution());
    println!("  Frame rate: {}", timeline.frame_rate());
    println!("  Duration:   {}", timeline.duration());
    println!("  Clips:      {}", timeline.clip_count());

    for track in timeline.tracks() {
        let mut flags = Vec::new();
        if track.locked {
            flags.push("locked");
        }
        if track.muted {
            flags.push("muted");
        }
        println!();
        println!(
            "Track {} [{}] {}{}",
            track.name,
            track.kind,
            track.id,
            if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            }
        );
        for clip in track.clips() {
            println!(
                "  {}  {} -> {}  {} [{}..{}] {} vol {:.2} z{}",
                clip.id(),
                clip.track_position(),
                clip.end(),
                clip.media_ref_id(),
                clip.trim_start(),
                clip.trim_end(),
                clip.speed(),
                clip.volume(),
                clip.z_order(),
            );
            for effect in clip.effects() {
                let state = if effect.enabled { "" } else { " (disabled)" };
                println!("      effect: {}{state}", effect.kind.name());
            }
        }
    }
    Ok(())
}

pub fn clips_at(edl: PathBuf, time: RationalTime) -> anyhow::Result<()> {
    let timeline = serialization::load_from_file(&edl).map_err(CutlistError::from)?;
    let hits = timeline.clips_at(time);
    if hits.is_empty() {
        println!("No clips at {time}");
        return Ok(());
    }
    for (track_id, clip) in hits {
        let track = timeline
            .track(track_id)
            .map(|t| t.name.as_str())
            .unwrap_or("?");
        println!(
            "{track}: {} ({} at source {})",
            clip.id(),
            clip.media_ref_id(),
            clip.source_time_at(time)
        );
    }
    Ok(())
}

pub fn presets(default_preset: &str) -> anyhow::Result<()> {
    println!("Export presets:");
    for (name, settings) in ExportSettings::presets() {
        let marker = if name == default_preset { " (default)" } else { "" };
        println!("  {name}{marker}");
        println!(
            "    {} @ {}, {:?} {} kbps, {:?} {} kbps",
            settings.resolution,
            settings.frame_rate,
            settings.video_codec,
            settings.video_bitrate_kbps,
            settings.audio_codec,
            settings.audio_bitrate_kbps,
        );
    }
    Ok(())
}
