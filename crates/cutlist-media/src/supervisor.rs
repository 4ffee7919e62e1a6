//! Render supervisor: runs one FFmpeg process for a render plan and reports
//! its progress and outcome.
//!
//! ```text
//! Idle -> Validating -> Running -> Completed | Failed | Cancelled
//!            |
//!            +-> Failed (plan rejected, returned from `start`)
//! ```
//!
//! Terminal states stay put until [`RenderSupervisor::reset`]. Process output
//! is consumed on a worker thread; events reach the caller through the
//! [`ExportEvents`] returned by [`RenderSupervisor::start`].

use std::collections::VecDeque;
use std::fmt;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use cutlist_core::{ExportError, MediaCatalog, RationalTime};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::events::{ExportEvent, ExportEvents, ExportOutcome, FailureReason};
use crate::plan::RenderPlan;
use crate::progress::ProgressTracker;

/// How the renderer is launched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// FFmpeg executable.
    pub ffmpeg_path: PathBuf,
    /// Arguments placed before the plan's own.
    pub leading_args: Vec<String>,
    /// Diagnostic lines kept for failure reports.
    pub diagnostic_tail_lines: usize,
    /// Warn when progress has not advanced for this long.
    pub stall_warning_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: which::which("ffmpeg").unwrap_or_else(|_| PathBuf::from("ffmpeg")),
            leading_args: vec!["-hide_banner".into(), "-nostdin".into()],
            diagnostic_tail_lines: 20,
            stall_warning_secs: 15,
        }
    }
}

/// Where an export is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportState {
    Idle,
    Validating,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn is_busy(self) -> bool {
        matches!(self, Self::Validating | Self::Running)
    }
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Permission to run one export. Supervisors sharing a slot never render
/// at the same time.
#[derive(Debug, Clone, Default)]
pub struct ExportSlot(Arc<AtomicBool>);

impl ExportSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot if it is free. It is released when the guard drops.
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard(self.0.clone()))
    }

    pub fn is_taken(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Held for as long as an export is validating or running.
#[derive(Debug)]
pub struct SlotGuard(Arc<AtomicBool>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State of one launched process, shared with its worker thread.
struct Run {
    child: Mutex<Option<Child>>,
    cancelled: AtomicBool,
}

/// Supervises render processes, one at a time.
pub struct RenderSupervisor {
    config: RenderConfig,
    catalog: Arc<dyn MediaCatalog>,
    slot: ExportSlot,
    state: Arc<Mutex<ExportState>>,
    run: Mutex<Option<Arc<Run>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RenderSupervisor {
    /// A supervisor with its own export slot.
    pub fn new(config: RenderConfig, catalog: Arc<dyn MediaCatalog>) -> Self {
        Self::with_slot(config, catalog, ExportSlot::new())
    }

    /// A supervisor that competes for `slot` with every other holder of it.
    pub fn with_slot(config: RenderConfig, catalog: Arc<dyn MediaCatalog>, slot: ExportSlot) -> Self {
        Self {
            config,
            catalog,
            slot,
            state: Arc::new(Mutex::new(ExportState::Idle)),
            run: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ExportState {
        *self.state.lock()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Validate `plan` and launch the renderer.
    ///
    /// Fails with `ExportAlreadyInProgress` while this supervisor (or any
    /// sharing its slot) is busy, and with `NotReset` after a finished
    /// export until [`reset`](Self::reset) is called. A rejected plan or a
    /// renderer that cannot be launched leaves the supervisor `Failed`.
    pub fn start(&self, plan: RenderPlan) -> Result<ExportEvents, ExportError> {
        let mut state = self.state.lock();
        match *state {
            ExportState::Idle => {}
            s if s.is_busy() => return Err(ExportError::ExportAlreadyInProgress),
            s => return Err(ExportError::NotReset(s.to_string())),
        }
        let guard = self
            .slot
            .try_acquire()
            .ok_or(ExportError::ExportAlreadyInProgress)?;

        *state = ExportState::Validating;
        if let Err(e) = plan.validate(self.catalog.as_ref()) {
            warn!(error = %e, "Export plan rejected");
            *state = ExportState::Failed;
            return Err(e.into());
        }

        let mut command = Command::new(&self.config.ffmpeg_path);
        command
            .args(&self.config.leading_args)
            .args(plan.ffmpeg_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        let args: Vec<_> = command.get_args().collect();
        debug!(program = %self.config.ffmpeg_path.display(), ?args, "Launching renderer");

        let spawn_error = |source| ExportError::Spawn {
            program: self.config.ffmpeg_path.clone(),
            source,
        };
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                warn!(error = %source, "Failed to start renderer");
                *state = ExportState::Failed;
                return Err(spawn_error(source));
            }
        };
        let pid = child.id();
        let stderr = child.stderr.take();

        let run = Arc::new(Run {
            child: Mutex::new(Some(child)),
            cancelled: AtomicBool::new(false),
        });
        let (tx, rx) = crossbeam_channel::unbounded();
        let worker = Worker {
            run: run.clone(),
            state: self.state.clone(),
            guard,
            tx,
            output_path: plan.output_path.clone(),
            total_duration: plan.total_duration,
            tail_lines: self.config.diagnostic_tail_lines,
            stall_after: Duration::from_secs(self.config.stall_warning_secs),
        };
        let handle = std::thread::Builder::new()
            .name("cutlist-render".into())
            .spawn(move || worker.run(stderr));
        let handle = match handle {
            Ok(handle) => handle,
            Err(source) => {
                if let Some(mut child) = run.child.lock().take() {
                    let _ = child.kill();
                    let _ = child.wait();
                }
                *state = ExportState::Failed;
                return Err(spawn_error(source));
            }
        };

        *state = ExportState::Running;
        info!(
            pid,
            output = %plan.output_path.display(),
            duration_secs = plan.total_duration.to_seconds_f64(),
            "Export started"
        );
        *self.run.lock() = Some(run);
        *self.worker.lock() = Some(handle);
        Ok(ExportEvents::new(rx))
    }

    /// Stop the running export. Returns once the renderer has been told to
    /// terminate; `Cancelled` is reported after it has exited and the
    /// partial output has been removed.
    pub fn cancel(&self) -> Result<(), ExportError> {
        let state = self.state.lock();
        if *state != ExportState::Running {
            return Err(ExportError::NotRunning);
        }
        let run = self.run.lock().clone().ok_or(ExportError::NotRunning)?;
        run.cancelled.store(true, Ordering::SeqCst);
        if let Some(child) = run.child.lock().as_mut() {
            if let Err(e) = child.kill() {
                debug!(error = %e, "Renderer already exited");
            }
        }
        info!("Export cancellation requested");
        Ok(())
    }

    /// Return to `Idle` after a finished export.
    pub fn reset(&self) -> Result<(), ExportError> {
        {
            let mut state = self.state.lock();
            if state.is_busy() {
                return Err(ExportError::ExportAlreadyInProgress);
            }
            *state = ExportState::Idle;
        }
        self.run.lock().take();
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl Drop for RenderSupervisor {
    fn drop(&mut self) {
        if self.state() == ExportState::Running {
            let _ = self.cancel();
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

/// Everything the worker thread owns for one export.
struct Worker {
    run: Arc<Run>,
    state: Arc<Mutex<ExportState>>,
    guard: SlotGuard,
    tx: Sender<ExportEvent>,
    output_path: PathBuf,
    total_duration: RationalTime,
    tail_lines: usize,
    stall_after: Duration,
}

impl Worker {
    fn run(self, stderr: Option<ChildStderr>) {
        let mut tracker = ProgressTracker::new(self.total_duration);
        let mut tail: VecDeque<String> = VecDeque::with_capacity(self.tail_lines);
        let mut last_advance = Instant::now();

        if let Some(stderr) = stderr {
            for_each_line(stderr, |line| {
                debug!(target: "cutlist::ffmpeg", "{line}");
                if tail.len() == self.tail_lines {
                    tail.pop_front();
                }
                if self.tail_lines > 0 {
                    tail.push_back(line.to_string());
                }

                if let Some(progress) = tracker.observe(line) {
                    last_advance = Instant::now();
                    let _ = self.tx.send(ExportEvent::Progress(progress));
                } else if last_advance.elapsed() >= self.stall_after {
                    warn!(
                        last_percentage = tracker.last_percentage().unwrap_or(0.0),
                        stalled_secs = last_advance.elapsed().as_secs(),
                        "No renderer progress"
                    );
                    last_advance = Instant::now();
                }
            });
        }

        let child = self.run.child.lock().take();
        let status = child.map(|mut c| c.wait());
        self.finish(status, tracker, tail.into());
    }

    fn finish(
        self,
        status: Option<std::io::Result<ExitStatus>>,
        mut tracker: ProgressTracker,
        diagnostic_tail: Vec<String>,
    ) {
        let Self {
            run,
            state,
            guard,
            tx,
            output_path,
            ..
        } = self;

        let mut state = state.lock();
        let (next, outcome) = if run.cancelled.load(Ordering::SeqCst) {
            remove_partial(&output_path);
            (ExportState::Cancelled, ExportOutcome::Cancelled)
        } else {
            match status {
                Some(Ok(status)) if status.success() => {
                    if has_content(&output_path) {
                        if let Some(progress) = tracker.finish() {
                            let _ = tx.send(ExportEvent::Progress(progress));
                        }
                        (
                            ExportState::Completed,
                            ExportOutcome::Completed {
                                path: output_path.clone(),
                            },
                        )
                    } else {
                        (
                            ExportState::Failed,
                            ExportOutcome::Failed {
                                reason: FailureReason::MissingOutput { diagnostic_tail },
                            },
                        )
                    }
                }
                Some(Ok(status)) => (
                    ExportState::Failed,
                    ExportOutcome::Failed {
                        reason: FailureReason::Process {
                            code: status.code(),
                            diagnostic_tail,
                        },
                    },
                ),
                Some(Err(e)) => {
                    let mut diagnostic_tail = diagnostic_tail;
                    diagnostic_tail.push(format!("failed to wait for renderer: {e}"));
                    (
                        ExportState::Failed,
                        ExportOutcome::Failed {
                            reason: FailureReason::Process {
                                code: None,
                                diagnostic_tail,
                            },
                        },
                    )
                }
                None => (
                    ExportState::Failed,
                    ExportOutcome::Failed {
                        reason: FailureReason::Process {
                            code: None,
                            diagnostic_tail,
                        },
                    },
                ),
            }
        };

        match &outcome {
            ExportOutcome::Completed { path } => info!(path = %path.display(), "Export completed"),
            ExportOutcome::Cancelled => info!(output = %output_path.display(), "Export cancelled"),
            ExportOutcome::Failed { reason } => warn!(
                %reason,
                tail = ?reason.diagnostic_tail().last(),
                "Export failed"
            ),
        }

        *state = next;
        drop(guard);
        drop(state);
        let _ = tx.send(ExportEvent::Finished(outcome));
    }
}

/// Call `f` for each line of `reader`, treating `\r` as a line break too
/// (FFmpeg rewrites its stats line in place with carriage returns).
fn for_each_line(mut reader: impl Read, mut f: impl FnMut(&str)) {
    let mut buf = [0u8; 4096];
    let mut line: Vec<u8> = Vec::new();
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(error = %e, "Renderer output closed");
                break;
            }
        };
        for &byte in &buf[..n] {
            if byte == b'\n' || byte == b'\r' {
                emit_line(&mut line, &mut f);
            } else {
                line.push(byte);
            }
        }
    }
    emit_line(&mut line, &mut f);
}

fn emit_line(line: &mut Vec<u8>, f: &mut impl FnMut(&str)) {
    if line.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        f(trimmed);
    }
    line.clear();
}

fn has_content(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}
