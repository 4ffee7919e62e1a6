//! Progress parsing from FFmpeg diagnostic output.

use std::time::{Duration, Instant};

use cutlist_core::RationalTime;

use crate::events::ExportProgress;

/// Keys that carry the output timestamp, in preference order.
const TIME_KEYS: [&str; 2] = ["time=", "out_time="];

/// Extract the rendered media time, in seconds, from one diagnostic line.
///
/// Understands `time=HH:MM:SS.xx`, `time=SS.xx` and the `out_time=` form
/// written by `-progress`. Returns `None` for lines without a usable
/// timestamp, including `N/A` and the negative times FFmpeg prints before
/// the first frame.
pub fn parse_elapsed(line: &str) -> Option<f64> {
    TIME_KEYS
        .iter()
        .find_map(|key| value_after(line, key))
        .and_then(parse_clock)
}

/// The whitespace-delimited value following `key`, where `key` starts a
/// word (so `time=` does not match inside `out_time=`).
fn value_after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let mut from = 0;
    while let Some(found) = line[from..].find(key) {
        let start = from + found;
        let at_word_start = line[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_'));
        if at_word_start {
            let rest = line[start + key.len()..].trim_start();
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            let value = &rest[..end];
            return (!value.is_empty()).then_some(value);
        }
        from = start + key.len();
    }
    None
}

fn parse_clock(value: &str) -> Option<f64> {
    if value.starts_with('-') {
        return None;
    }
    let parts: Vec<&str> = value.split(':').collect();
    let secs = match parts.as_slice() {
        [s] => s.parse::<f64>().ok()?,
        [h, m, s] => {
            let hours: f64 = h.parse().ok()?;
            let mins: f64 = m.parse().ok()?;
            let secs: f64 = s.parse().ok()?;
            hours * 3600.0 + mins * 60.0 + secs
        }
        _ => return None,
    };
    (secs.is_finite() && secs >= 0.0).then_some(secs)
}

/// Turns parsed timestamps into progress reports for one export.
///
/// Only strictly increasing percentages are reported; a timestamp at or
/// below the last reported value produces nothing.
#[derive(Debug)]
pub struct ProgressTracker {
    total_secs: f64,
    started: Instant,
    last: Option<f64>,
}

impl ProgressTracker {
    pub fn new(total: RationalTime) -> Self {
        Self {
            total_secs: total.to_seconds_f64(),
            started: Instant::now(),
            last: None,
        }
    }

    /// Last reported percentage.
    pub fn last_percentage(&self) -> Option<f64> {
        self.last
    }

    /// Feed one diagnostic line.
    pub fn observe(&mut self, line: &str) -> Option<ExportProgress> {
        parse_elapsed(line).and_then(|secs| self.update(secs))
    }

    /// Feed a rendered media time in seconds.
    pub fn update(&mut self, rendered_secs: f64) -> Option<ExportProgress> {
        if self.total_secs <= 0.0 {
            return None;
        }
        let percentage = (rendered_secs / self.total_secs * 100.0).clamp(0.0, 100.0);
        self.report(percentage)
    }

    /// Report 100% if it has not been reported yet.
    pub fn finish(&mut self) -> Option<ExportProgress> {
        self.report(100.0)
    }

    fn report(&mut self, percentage: f64) -> Option<ExportProgress> {
        if self.last.is_some_and(|last| percentage <= last) {
            return None;
        }
        self.last = Some(percentage);

        let elapsed = self.started.elapsed();
        Some(ExportProgress {
            percentage,
            elapsed,
            estimated_remaining: estimate_remaining(elapsed, percentage),
        })
    }
}

/// Linear extrapolation of the time left; `None` before any progress or
/// when the estimate does not fit in a `Duration`.
fn estimate_remaining(elapsed: Duration, percentage: f64) -> Option<Duration> {
    if percentage >= 100.0 {
        return Some(Duration::ZERO);
    }
    if percentage <= 0.0 {
        return None;
    }
    let total = elapsed.as_secs_f64() * 100.0 / percentage;
    Duration::try_from_secs_f64((total - elapsed.as_secs_f64()).max(0.0)).ok()
}
