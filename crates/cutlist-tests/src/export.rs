//! Render supervisor tests against a scripted stand-in for FFmpeg.
//!
//! The supervisor runs `/bin/sh <script> <ffmpeg args...>`; each script
//! plays back a canned stderr and exits the way a real encoder would. The
//! output path is always the last argument.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cutlist_core::{
    ExportError, FrameRate, InMemoryCatalog, MediaDescriptor, RationalTime, Resolution,
    ValidationError,
};
use cutlist_media::{
    ExportEvent, ExportEvents, ExportOutcome, ExportSettings, ExportSlot, ExportState,
    FailureReason, RenderConfig, RenderPlan, RenderSupervisor,
};
use cutlist_timeline::{NewClip, Timeline, TrackKind};
use tempfile::TempDir;

// ── Fixtures ───────────────────────────────────────────────────

const SUCCEED: &str = r#"eval out=\${$#}
printf 'frame=  75 fps=30 time=00:00:02.50 bitrate=1000kbits/s speed=1x\r' >&2
sleep 0.05 2>/dev/null
printf 'frame= 150 fps=30 time=00:00:05.00 bitrate=1000kbits/s speed=1x\r' >&2
printf 'frame= 120 fps=30 time=00:00:04.00 bitrate=1000kbits/s speed=1x\r' >&2
printf 'frame= 300 fps=30 time=00:00:10.00 bitrate=1000kbits/s speed=1x\n' >&2
printf 'encoded' > "$out"
exit 0
"#;

const SLOW: &str = r#"eval out=\${$#}
printf 'partial' > "$out"
printf 'frame=  30 fps=30 time=00:00:01.00 bitrate=1000kbits/s speed=1x\r' >&2
i=0
while [ $i -lt 300 ]; do
  sleep 0.1 2>/dev/null
  i=$((i + 1))
done
printf 'encoded' > "$out"
"#;

const FAIL: &str = r#"echo 'Input #0, mov,mp4,m4a,3gp,3g2,mj2' >&2
echo '/media/m1.mp4: Invalid data found when processing input' >&2
exit 1
"#;

const NO_OUTPUT: &str = r#"printf 'frame= 300 fps=30 time=00:00:10.00 bitrate=1000kbits/s speed=1x\n' >&2
exit 0
"#;

struct Fixture {
    dir: TempDir,
    catalog: Arc<InMemoryCatalog>,
}

impl Fixture {
    fn new() -> Self {
        let catalog = InMemoryCatalog::new().with(MediaDescriptor::new(
            "m1",
            "/media/m1.mp4",
            RationalTime::from_secs(10),
        ));
        Self {
            dir: tempfile::tempdir().unwrap(),
            catalog: Arc::new(catalog),
        }
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("out.mp4")
    }

    fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn config(&self, script: &Path) -> RenderConfig {
        RenderConfig {
            ffmpeg_path: PathBuf::from("/bin/sh"),
            leading_args: vec![script.display().to_string()],
            diagnostic_tail_lines: 20,
            stall_warning_secs: 15,
        }
    }

    fn supervisor(&self, script: &Path) -> RenderSupervisor {
        RenderSupervisor::new(self.config(script), self.catalog.clone())
    }

    /// One video track holding `m1` 0..10 at position 0.
    fn plan(&self) -> RenderPlan {
        let mut timeline =
            Timeline::new("Export", Resolution::HD_1080, FrameRate::FPS_30).unwrap();
        let v1 = timeline.add_track(TrackKind::Video, "V1");
        timeline
            .add_clip(
                v1,
                NewClip::new("m1", RationalTime::ZERO, RationalTime::from_secs(10)),
                self.catalog.as_ref(),
            )
            .unwrap();
        RenderPlan::build(
            &timeline,
            &ExportSettings::youtube_1080p(),
            self.output(),
            self.catalog.as_ref(),
        )
        .unwrap()
    }
}

/// Drain the stream, returning every reported percentage and the outcome.
fn collect(events: &ExportEvents) -> (Vec<f64>, ExportOutcome) {
    let mut percentages = Vec::new();
    loop {
        match events.recv_timeout(Duration::from_secs(30)) {
            Ok(ExportEvent::Progress(p)) => percentages.push(p.percentage),
            Ok(ExportEvent::Finished(outcome)) => return (percentages, outcome),
            Err(e) => panic!("no outcome from supervisor: {e}"),
        }
    }
}

// ── Scenarios ──────────────────────────────────────────────────

#[test]
fn completed_export_reports_requested_path() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor(&fx.script("ok.sh", SUCCEED));
    assert_eq!(supervisor.state(), ExportState::Idle);

    let events = supervisor.start(fx.plan()).unwrap();
    let (percentages, outcome) = collect(&events);

    assert_eq!(percentages, vec![25.0, 50.0, 100.0]);
    assert_eq!(outcome, ExportOutcome::Completed { path: fx.output() });
    assert_eq!(supervisor.state(), ExportState::Completed);
    assert_eq!(std::fs::read(fx.output()).unwrap(), b"encoded");
    assert!(events.recv().is_none());
}

#[test]
fn cancel_after_one_second_removes_partial_output() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor(&fx.script("slow.sh", SLOW));

    let events = supervisor.start(fx.plan()).unwrap();
    thread::sleep(Duration::from_secs(1));
    assert_eq!(supervisor.state(), ExportState::Running);
    supervisor.cancel().unwrap();

    let (percentages, outcome) = collect(&events);
    assert_eq!(outcome, ExportOutcome::Cancelled);
    assert_eq!(percentages, vec![10.0]);
    assert_eq!(supervisor.state(), ExportState::Cancelled);
    assert!(!fx.output().exists());
}

#[test]
fn failing_process_reports_diagnostic_tail() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor(&fx.script("fail.sh", FAIL));

    let events = supervisor.start(fx.plan()).unwrap();
    let (_, outcome) = collect(&events);

    let ExportOutcome::Failed { reason } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(matches!(reason, FailureReason::Process { code: Some(1), .. }));
    assert_eq!(
        reason.diagnostic_tail().last().map(String::as_str),
        Some("/media/m1.mp4: Invalid data found when processing input")
    );
    assert_eq!(supervisor.state(), ExportState::Failed);
}

#[test]
fn success_without_output_is_a_failure() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor(&fx.script("empty.sh", NO_OUTPUT));

    let events = supervisor.start(fx.plan()).unwrap();
    let (_, outcome) = collect(&events);

    assert!(matches!(
        outcome,
        ExportOutcome::Failed {
            reason: FailureReason::MissingOutput { .. }
        }
    ));
    assert_eq!(supervisor.state(), ExportState::Failed);
}

#[test]
fn second_start_while_running_is_rejected() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor(&fx.script("slow.sh", SLOW));

    let events = supervisor.start(fx.plan()).unwrap();
    let err = supervisor.start(fx.plan()).unwrap_err();
    assert!(matches!(err, ExportError::ExportAlreadyInProgress));

    supervisor.cancel().unwrap();
    let (_, outcome) = collect(&events);
    assert_eq!(outcome, ExportOutcome::Cancelled);
}

#[test]
fn shared_slot_allows_one_export_at_a_time() {
    let fx = Fixture::new();
    let slot = ExportSlot::new();
    let script = fx.script("slow.sh", SLOW);
    let first = RenderSupervisor::with_slot(fx.config(&script), fx.catalog.clone(), slot.clone());
    let second = RenderSupervisor::with_slot(fx.config(&script), fx.catalog.clone(), slot.clone());

    let events = first.start(fx.plan()).unwrap();
    assert!(slot.is_taken());
    let err = second.start(fx.plan()).unwrap_err();
    assert!(matches!(err, ExportError::ExportAlreadyInProgress));
    assert_eq!(second.state(), ExportState::Idle);

    first.cancel().unwrap();
    collect(&events);
    assert!(!slot.is_taken());
}

#[test]
fn finished_supervisor_needs_reset() {
    let fx = Fixture::new();
    let supervisor = fx.supervisor(&fx.script("ok.sh", SUCCEED));

    let events = supervisor.start(fx.plan()).unwrap();
    collect(&events);

    let err = supervisor.start(fx.plan()).unwrap_err();
    assert!(matches!(err, ExportError::NotReset(ref state) if state == "completed"));
    assert!(matches!(supervisor.cancel(), Err(ExportError::NotRunning)));

    supervisor.reset().unwrap();
    assert_eq!(supervisor.state(), ExportState::Idle);
    let events = supervisor.start(fx.plan()).unwrap();
    let (_, outcome) = collect(&events);
    assert_eq!(outcome, ExportOutcome::Completed { path: fx.output() });
}

#[test]
fn missing_media_fails_without_spawning() {
    let fx = Fixture::new();
    let marker = fx.dir.path().join("spawned");
    let script = fx.script("marker.sh", &format!("touch '{}'\n", marker.display()));
    let plan = fx.plan();

    // The catalog the supervisor checks against has lost m1.
    let supervisor = RenderSupervisor::new(fx.config(&script), Arc::new(InMemoryCatalog::new()));
    let err = supervisor.start(plan).unwrap_err();

    assert!(matches!(
        err,
        ExportError::Validation(ValidationError::MediaMissing(ref id)) if id == "m1"
    ));
    assert_eq!(supervisor.state(), ExportState::Failed);
    thread::sleep(Duration::from_millis(100));
    assert!(!marker.exists());
}

#[test]
fn unlaunchable_renderer_is_a_spawn_error() {
    let fx = Fixture::new();
    let mut config = fx.config(Path::new("unused"));
    config.ffmpeg_path = fx.dir.path().join("no-such-ffmpeg");
    let supervisor = RenderSupervisor::new(config, fx.catalog.clone());

    let err = supervisor.start(fx.plan()).unwrap_err();
    assert!(matches!(err, ExportError::Spawn { .. }));
    assert_eq!(supervisor.state(), ExportState::Failed);
    assert!(!fx.output().exists());
}
