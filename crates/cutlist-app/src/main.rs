//! Cutlist CLI: edit decision lists from the command line.
//!
//! Usage:
//!   cutlist new <EDL>               Create an empty timeline
//!   cutlist add-clip <EDL> ...      Place a clip on a track
//!   cutlist split-clip <EDL> ...    Split a clip in two
//!   cutlist info <EDL>              Show timeline contents
//!   cutlist export <EDL> ...        Render the timeline with FFmpeg
//!   cutlist presets                 List export presets

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use cutlist_core::{CutlistError, ErrorCategory, FrameRate, PlaybackSpeed, RationalTime, Resolution};
use cutlist_timeline::TrackKind;
use uuid::Uuid;

mod commands;
mod config;
mod logging;

use commands::{parse_frame_rate, parse_speed, parse_time};

#[derive(Parser)]
#[command(
    name = "cutlist",
    about = "Non-destructive video editing with edit decision lists",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the standard location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Media catalog (JSON array of media descriptors)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Video,
    Audio,
    Overlay,
}

impl From<KindArg> for TrackKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Video => TrackKind::Video,
            KindArg::Audio => TrackKind::Audio,
            KindArg::Overlay => TrackKind::Overlay,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new timeline
    New {
        /// Path of the EDL file to create
        edl: PathBuf,

        /// Timeline name
        #[arg(short, long, default_value = "Untitled")]
        name: String,

        /// Frame width
        #[arg(long, default_value = "1920")]
        width: u32,

        /// Frame height
        #[arg(long, default_value = "1080")]
        height: u32,

        /// Frame rate, e.g. 30 or 30000/1001
        #[arg(long, value_parser = parse_frame_rate, default_value = "30")]
        fps: FrameRate,

        /// Start without the default V1 and A1 tracks
        #[arg(long)]
        empty: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Add a track
    AddTrack {
        edl: PathBuf,

        #[arg(short, long, value_enum)]
        kind: KindArg,

        #[arg(short, long)]
        name: String,
    },

    /// Lock, unlock, mute or unmute a track
    SetTrack {
        edl: PathBuf,

        /// Track id or name
        track: String,

        #[arg(long)]
        locked: Option<bool>,

        #[arg(long)]
        muted: Option<bool>,
    },

    /// Place a clip on a track
    AddClip {
        edl: PathBuf,

        /// Track id or name
        #[arg(short, long)]
        track: String,

        /// Catalog id of the source media
        #[arg(short, long)]
        media: String,

        /// Source in-point (seconds, or n/d)
        #[arg(long, value_parser = parse_time)]
        start: RationalTime,

        /// Source out-point (seconds, or n/d)
        #[arg(long, value_parser = parse_time)]
        end: RationalTime,

        /// Timeline position
        #[arg(long, value_parser = parse_time, default_value = "0")]
        at: RationalTime,

        #[arg(long, value_parser = parse_speed, default_value = "1")]
        speed: PlaybackSpeed,

        #[arg(long, default_value = "1.0")]
        volume: f64,
    },

    /// Remove a clip
    RemoveClip { edl: PathBuf, clip: Uuid },

    /// Move a clip to a track and position
    MoveClip {
        edl: PathBuf,

        clip: Uuid,

        /// Destination track id or name
        #[arg(short, long)]
        track: String,

        /// New timeline position
        #[arg(long, value_parser = parse_time)]
        to: RationalTime,
    },

    /// Change the source range a clip plays
    TrimClip {
        edl: PathBuf,

        clip: Uuid,

        #[arg(long, value_parser = parse_time)]
        start: RationalTime,

        #[arg(long, value_parser = parse_time)]
        end: RationalTime,
    },

    /// Split a clip at a timeline time
    SplitClip {
        edl: PathBuf,

        clip: Uuid,

        #[arg(long, value_parser = parse_time)]
        at: RationalTime,
    },

    /// List the clips under a timeline time
    ClipsAt {
        edl: PathBuf,

        #[arg(value_parser = parse_time)]
        time: RationalTime,
    },

    /// Apply edit commands from a JSON file, all or nothing
    Apply {
        edl: PathBuf,

        /// A single command object or an array of them
        commands: PathBuf,
    },

    /// Show timeline contents
    Info { edl: PathBuf },

    /// Render the timeline to a video file
    Export {
        edl: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export preset (see `cutlist presets`)
        #[arg(short, long)]
        preset: Option<String>,
    },

    /// List export presets
    Presets,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (mut app_config, config_error) = match config::AppConfig::load(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (config::AppConfig::default(), Some(e)),
    };
    if cli.verbose {
        app_config.logging.level = "debug".to_string();
    }
    logging::init_logging(&app_config.logging);
    if let Some(e) = config_error {
        tracing::warn!("Using default configuration: {e:#}");
    }

    match run(cli, &app_config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(cli: Cli, app_config: &config::AppConfig) -> anyhow::Result<()> {
    let catalog = cli.catalog;
    match cli.command {
        Commands::New {
            edl,
            name,
            width,
            height,
            fps,
            empty,
            force,
        } => commands::edit::new(edl, name, Resolution::new(width, height), fps, empty, force),
        Commands::AddTrack { edl, kind, name } => {
            commands::edit::add_track(edl, catalog, kind.into(), name)
        }
        Commands::SetTrack {
            edl,
            track,
            locked,
            muted,
        } => commands::edit::set_track(edl, catalog, &track, locked, muted),
        Commands::AddClip {
            edl,
            track,
            media,
            start,
            end,
            at,
            speed,
            volume,
        } => commands::edit::add_clip(
            edl,
            catalog,
            &track,
            commands::edit::ClipArgs {
                media,
                start,
                end,
                at,
                speed,
                volume,
            },
        ),
        Commands::RemoveClip { edl, clip } => commands::edit::remove_clip(edl, catalog, clip),
        Commands::MoveClip {
            edl,
            clip,
            track,
            to,
        } => commands::edit::move_clip(edl, catalog, clip, &track, to),
        Commands::TrimClip {
            edl,
            clip,
            start,
            end,
        } => commands::edit::trim_clip(edl, catalog, clip, start, end),
        Commands::SplitClip { edl, clip, at } => commands::edit::split_clip(edl, catalog, clip, at),
        Commands::ClipsAt { edl, time } => commands::info::clips_at(edl, time),
        Commands::Apply { edl, commands } => commands::edit::apply(edl, catalog, commands),
        Commands::Info { edl } => commands::info::run(edl),
        Commands::Export {
            edl,
            output,
            preset,
        } => commands::export::run(edl, catalog, output, preset, app_config),
        Commands::Presets => commands::info::presets(&app_config.default_preset),
    }
}

/// Process exit status for a failed command.
fn exit_code(err: &anyhow::Error) -> u8 {
    let Some(err) = err.downcast_ref::<CutlistError>() else {
        return 1;
    };
    match err.category() {
        ErrorCategory::Validation => 2,
        ErrorCategory::NotFound => 3,
        ErrorCategory::Locked => 4,
        ErrorCategory::Process => 5,
        ErrorCategory::Serialization => 6,
        ErrorCategory::Io => 7,
        ErrorCategory::Cancelled => 130,
    }
}
