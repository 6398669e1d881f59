//! Import progress extraction.
//!
//! `qemu-img convert -p` prints lines like `    (45.34/100%)`. The reporter
//! scrapes the percentage and feeds it into a per-owner Prometheus counter.
//! Counters only go up, so the value is published as the delta over the
//! last published high-water mark; repeated or backward percentages are
//! ignored until a new maximum appears.

use dashmap::DashMap;
use diskimg_core::error::{ImageError, Result};
use prometheus::{Counter, CounterVec, Encoder, Opts, Registry, TextEncoder};
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// Name of the progress counter.
pub const PROGRESS_METRIC_NAME: &str = "import_progress";

/// Label carrying the owner identity.
pub const OWNER_LABEL: &str = "ownerUID";

const PROGRESS_PATTERN: &str = r"\((\d?\d\.\d\d)/100%\)";

fn progress_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PROGRESS_PATTERN).expect("progress pattern is valid"))
}

/// Extract the percentage from a progress line, e.g. `(45.34/100%)` → `45.34`.
pub fn parse_progress(line: &str) -> Option<f64> {
    let captures = progress_regex().captures(line)?;
    captures.get(1)?.as_str().parse().ok()
}

/// Per-owner cumulative progress backed by a labeled counter.
///
/// Owners are created lazily on their first published value and kept for
/// the lifetime of the state.
pub struct ProgressState {
    registry: Registry,
    counter: CounterVec,
    owners: DashMap<String, Counter>,
}

impl ProgressState {
    pub fn new() -> Result<Self> {
        let counter = CounterVec::new(
            Opts::new(PROGRESS_METRIC_NAME, "The import progress in percentage"),
            &[OWNER_LABEL],
        )
        .map_err(metric_error)?;
        let registry = Registry::new();
        registry
            .register(Box::new(counter.clone()))
            .map_err(metric_error)?;

        Ok(Self {
            registry,
            counter,
            owners: DashMap::new(),
        })
    }

    /// Raise `owner`'s cumulative value to `value` if it is a new maximum.
    ///
    /// Returns the delta added to the counter (`0.0` when nothing moved).
    pub fn publish(&self, owner: &str, value: f64) -> f64 {
        if owner.is_empty() || !value.is_finite() {
            return 0.0;
        }
        // The entry guard holds the shard lock across read and increment.
        let entry = self
            .owners
            .entry(owner.to_string())
            .or_insert_with(|| self.counter.with_label_values(&[owner]));
        let current = entry.get();
        if value > current {
            let delta = value - current;
            entry.inc_by(delta);
            tracing::debug!(owner, progress = value, delta, "Import progress");
            delta
        } else {
            0.0
        }
    }

    /// Current cumulative value for `owner` (zero if never published).
    pub fn cumulative(&self, owner: &str) -> f64 {
        self.owners.get(owner).map(|c| c.get()).unwrap_or(0.0)
    }

    /// Registry holding the progress counter.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metric_error)?;
        String::from_utf8(buffer).map_err(|e| ImageError::Parse(e.to_string()))
    }
}

fn metric_error(err: prometheus::Error) -> ImageError {
    ImageError::Config(format!("progress metric: {}", err))
}

/// Line handler publishing progress for one owner.
#[derive(Clone)]
pub struct ProgressReporter {
    state: Arc<ProgressState>,
    owner: String,
}

impl ProgressReporter {
    pub fn new(state: Arc<ProgressState>, owner: impl Into<String>) -> Self {
        Self {
            state,
            owner: owner.into(),
        }
    }

    /// Handle one output line. Lines that are not progress lines, and all
    /// lines when no owner is set, are ignored.
    pub fn on_line(&self, line: &str) {
        if self.owner.is_empty() {
            return;
        }
        if let Some(value) = parse_progress(line) {
            self.state.publish(&self.owner, value);
        }
    }
}
