//! Events delivered to the single subscriber of an export.

use std::path::PathBuf;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

/// Export progress information.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    /// 0.0 to 100.0, strictly increasing within one export.
    pub percentage: f64,
    /// Wall-clock time since the renderer started.
    pub elapsed: Duration,
    /// Extrapolated from the rate so far; unknown until progress is made.
    pub estimated_remaining: Option<Duration>,
}

/// Why a running export failed. Problems found before the renderer starts
/// are returned from `start` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The renderer exited unsuccessfully. `code` is `None` when it was
    /// killed by a signal.
    Process {
        code: Option<i32>,
        diagnostic_tail: Vec<String>,
    },
    /// The renderer reported success but the output is missing or empty.
    MissingOutput { diagnostic_tail: Vec<String> },
}

impl FailureReason {
    /// Captured diagnostic lines, most recent last.
    pub fn diagnostic_tail(&self) -> &[String] {
        match self {
            Self::Process {
                diagnostic_tail, ..
            }
            | Self::MissingOutput { diagnostic_tail } => diagnostic_tail,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Process { code: Some(code), .. } => write!(f, "renderer exited with status {code}"),
            Self::Process { code: None, .. } => write!(f, "renderer was terminated by a signal"),
            Self::MissingOutput { .. } => write!(f, "renderer produced no output"),
        }
    }
}

/// Terminal result of one export attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Completed { path: PathBuf },
    Failed { reason: FailureReason },
    Cancelled,
}

/// Something that happened during an export.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportEvent {
    Progress(ExportProgress),
    /// Sent exactly once, last.
    Finished(ExportOutcome),
}

/// Receiving end of an export's event stream, in emission order.
#[derive(Debug)]
pub struct ExportEvents {
    rx: Receiver<ExportEvent>,
}

impl ExportEvents {
    pub(crate) fn new(rx: Receiver<ExportEvent>) -> Self {
        Self { rx }
    }

    /// Block for the next event; `None` once the stream is over.
    pub fn recv(&self) -> Option<ExportEvent> {
        self.rx.recv().ok()
    }

    /// Block up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ExportEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Drain events, passing progress to `on_progress`, until the outcome
    /// arrives.
    pub fn wait_for_outcome(&self, mut on_progress: impl FnMut(&ExportProgress)) -> Option<ExportOutcome> {
        for event in self.rx.iter() {
            match event {
                ExportEvent::Progress(progress) => on_progress(&progress),
                ExportEvent::Finished(outcome) => return Some(outcome),
            }
        }
        None
    }
}

impl Iterator for ExportEvents {
    type Item = ExportEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}
