//! Opt-in wall-clock timing of pipeline stages.
//!
//! Stages wrap their work in [`timed`]; nothing is recorded unless timing was
//! switched on with [`set_timing_enabled`] (the CLI does this for `--timing`
//! or `SANKEY_TIMING=1`). Samples live in thread-local storage and are drained
//! by [`collect_report`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde_json::json;

/// Aggregated timings, one entry per stage name (sorted by name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingReport {
    pub stages: Vec<StageTiming>,
}

/// Timing statistics for one named stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTiming {
    pub name: String,
    pub count: usize,
    pub total: Duration,
    pub p50: Duration,
    pub max: Duration,
}

#[derive(Debug, Clone)]
struct Sample {
    name: String,
    elapsed: Duration,
}

thread_local! {
    static SAMPLES: RefCell<Vec<Sample>> = const { RefCell::new(Vec::new()) };
}

static TIMING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Returns true when `SANKEY_TIMING` enables timing collection.
///
/// Supported truthy values: `1`, `true`, `yes`, `on` (case-insensitive).
#[must_use]
pub fn timing_enabled_from_env() -> bool {
    std::env::var("SANKEY_TIMING")
        .ok()
        .is_some_and(|value| is_truthy(value.as_str()))
}

/// Enable or disable timing collection.
pub fn set_timing_enabled(enabled: bool) {
    TIMING_ENABLED.store(enabled, Ordering::Relaxed);
    if !enabled {
        clear_timings();
    }
}

#[must_use]
pub fn is_timing_enabled() -> bool {
    TIMING_ENABLED.load(Ordering::Relaxed)
}

/// Clears all recorded timings for the current thread.
pub fn clear_timings() {
    SAMPLES.with(|samples| samples.borrow_mut().clear());
}

/// Run `f`, recording its duration under `name` when timing is enabled.
pub fn timed<R>(name: &str, f: impl FnOnce() -> R) -> R {
    if !is_timing_enabled() {
        return f();
    }

    let started = Instant::now();
    let result = f();
    record_sample(name, started.elapsed());
    result
}

/// Drain this thread's samples into a report.
#[must_use]
pub fn collect_report() -> TimingReport {
    let samples = SAMPLES.with(|samples| std::mem::take(&mut *samples.borrow_mut()));

    let mut grouped: BTreeMap<String, Vec<Duration>> = BTreeMap::new();
    for sample in samples {
        grouped.entry(sample.name).or_default().push(sample.elapsed);
    }

    let stages = grouped
        .into_iter()
        .map(|(name, mut values)| {
            values.sort_unstable();
            StageTiming {
                count: values.len(),
                total: values.iter().sum(),
                p50: values[(values.len() - 1) / 2],
                max: values[values.len() - 1],
                name,
            }
        })
        .collect();

    TimingReport { stages }
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Sum of all stage totals.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.stages.iter().map(|stage| stage.total).sum()
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let stages = self
            .stages
            .iter()
            .map(|stage| {
                json!({
                    "name": stage.name,
                    "count": stage.count,
                    "total_us": stage.total.as_micros(),
                    "p50_us": stage.p50.as_micros(),
                    "max_us": stage.max.as_micros(),
                })
            })
            .collect::<Vec<_>>();

        json!({ "stages": stages, "total_us": self.total().as_micros() })
    }

    /// Render as a table for stderr.
    #[must_use]
    pub fn display_table(&self) -> String {
        if self.stages.is_empty() {
            return "No timing samples recorded.".to_string();
        }

        let mut out = String::new();
        out.push_str("stage          count      total        p50        max\n");
        out.push_str("-----------------------------------------------------\n");
        for stage in &self.stages {
            let _ = writeln!(
                out,
                "{:<12} {:>6} {:>10} {:>10} {:>10}",
                stage.name,
                stage.count,
                format_duration(stage.total),
                format_duration(stage.p50),
                format_duration(stage.max)
            );
        }
        let _ = writeln!(out, "{:<12} {:>6} {:>10}", "total", "", format_duration(self.total()));
        out
    }
}

fn record_sample(name: &str, elapsed: Duration) {
    SAMPLES.with(|samples| {
        samples.borrow_mut().push(Sample {
            name: name.to_string(),
            elapsed,
        });
    });
}

fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();

    if micros >= 1_000_000 {
        let secs = micros / 1_000_000;
        let millis = (micros % 1_000_000) / 1_000;
        format!("{secs}.{millis:03}s")
    } else if micros >= 1_000 {
        let millis = micros / 1_000;
        let rem = micros % 1_000;
        format!("{millis}.{rem:03}ms")
    } else {
        format!("{micros}µs")
    }
}

fn is_truthy(value: &str) -> bool {
    ["1", "true", "yes", "on"]
        .iter()
        .any(|truthy| value.trim().eq_ignore_ascii_case(truthy))
}
