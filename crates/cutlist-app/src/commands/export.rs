//! Render a timeline to a video file.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use cutlist_core::CutlistError;
use cutlist_media::{ExportOutcome, ExportSettings, RenderPlan, RenderSupervisor};
use cutlist_timeline::EditSession;

use super::load_catalog;
use crate::config::AppConfig;

pub fn run(
    edl: PathBuf,
    catalog: Option<PathBuf>,
    output: Option<PathBuf>,
    preset: Option<String>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let Some(catalog_path) = catalog else {
        anyhow::bail!("export needs a media catalog (--catalog <FILE>)");
    };
    let catalog = load_catalog(Some(&catalog_path))?;
    let session = EditSession::open(edl.clone(), catalog.clone()).map_err(CutlistError::from)?;

    let settings = match preset {
        Some(name) => ExportSettings::preset(&name).ok_or_else(|| {
            anyhow::anyhow!("Unknown preset: {name}. See `cutlist presets`")
        })?,
        None => config.default_settings(),
    };
    let output_path =
        output.unwrap_or_else(|| edl.with_extension(settings.video_codec.extension()));

    let plan = RenderPlan::build(session.timeline(), &settings, &output_path, catalog.as_ref())
        .map_err(|e| CutlistError::Export(e.into()))?;

    println!("Exporting {}", edl.display());
    println!("  Output:     {}", output_path.display());
    println!("  Resolution: {}", settings.resolution);
    println!("  Frame rate: {}", settings.frame_rate);
    println!("  Duration:   {}", plan.total_duration);
    println!("  Segments:   {}", plan.extract_count());

    let supervisor = Arc::new(RenderSupervisor::new(config.render.clone(), catalog));
    let events = supervisor.start(plan).map_err(CutlistError::from)?;

    {
        let supervisor = supervisor.clone();
        ctrlc::set_handler(move || {
            if let Err(e) = supervisor.cancel() {
                tracing::debug!(error = %e, "Cancel ignored");
            }
        })?;
    }

    let outcome = events.wait_for_outcome(|p| {
        let eta = p
            .estimated_remaining
            .map(|d| format!("{:.0}s", d.as_secs_f64()))
            .unwrap_or_else(|| "?".to_string());
        print!(
            "\r  Progress: {:5.1}% (elapsed {:.0}s, ETA: {eta})  ",
            p.percentage,
            p.elapsed.as_secs_f64(),
        );
        let _ = std::io::stdout().flush();
    });
    println!();

    match outcome {
        Some(ExportOutcome::Completed { path }) => {
            println!("Export complete: {}", path.display());
            Ok(())
        }
        Some(ExportOutcome::Failed { reason }) => {
            for line in reason.diagnostic_tail() {
                eprintln!("  | {line}");
            }
            Err(CutlistError::Process(reason.to_string()).into())
        }
        Some(ExportOutcome::Cancelled) => {
            println!("Export cancelled");
            Err(CutlistError::Cancelled.into())
        }
        None => Err(CutlistError::Process("renderer stopped without an outcome".into()).into()),
    }
}
