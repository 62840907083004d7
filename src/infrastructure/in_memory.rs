use crate::domain::ports::{EnableLine, ReportSink};
use crate::domain::transaction::Outcome;
use crate::error::{HardwareError, SendError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An enable line that only remembers what was written to it.
///
/// Used by the replay tool in place of a GPIO driver, and by tests to assert
/// the exact open/close sequence. `Clone` shares the recorded history.
#[derive(Debug, Default, Clone)]
pub struct RecordingEnableLine {
    levels: Arc<Mutex<Vec<bool>>>,
    unavailable: bool,
    write_limit: Option<usize>,
}

impl RecordingEnableLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// A line whose every write fails, as if the driver never attached.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// A line that accepts `writes` writes, then fails every later one.
    pub fn failing_after(writes: usize) -> Self {
        Self {
            write_limit: Some(writes),
            ..Self::default()
        }
    }

    /// Every physical level written so far, oldest first.
    pub fn levels(&self) -> Vec<bool> {
        lock(&self.levels).clone()
    }

    pub fn last(&self) -> Option<bool> {
        lock(&self.levels).last().copied()
    }
}

impl EnableLine for RecordingEnableLine {
    fn write(&self, level: bool) -> Result<(), HardwareError> {
        if self.unavailable {
            return Err(HardwareError::Unavailable(
                "recording line configured as unavailable".to_string(),
            ));
        }
        let mut levels = lock(&self.levels);
        if self.write_limit.is_some_and(|limit| levels.len() >= limit) {
            return Err(HardwareError::WriteFailed(format!(
                "line stuck after {} writes",
                levels.len()
            )));
        }
        debug!(level, "Enable line written");
        levels.push(level);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SinkState {
    script: VecDeque<Result<(), SendError>>,
    attempts: u32,
    delivered: Vec<Outcome>,
}

/// A report sink that plays back scripted responses and records deliveries.
///
/// Once the script runs out every attempt succeeds, which makes a bare
/// `RecordingReportSink::new()` a dry-run sink.
#[derive(Debug, Default, Clone)]
pub struct RecordingReportSink {
    state: Arc<Mutex<SinkState>>,
    latency: Duration,
}

impl RecordingReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(responses: Vec<Result<(), SendError>>) -> Self {
        let sink = Self::default();
        lock(&sink.state).script = responses.into();
        sink
    }

    /// Delays every attempt, so a report can be observed in flight.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn attempts(&self) -> u32 {
        lock(&self.state).attempts
    }

    /// Outcomes that were accepted, one entry per successful attempt.
    pub fn delivered(&self) -> Vec<Outcome> {
        lock(&self.state).delivered.clone()
    }
}

#[async_trait]
impl ReportSink for RecordingReportSink {
    async fn send(&self, outcome: &Outcome) -> Result<(), SendError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let mut state = lock(&self.state);
        state.attempts += 1;
        let response = state.script.pop_front().unwrap_or(Ok(()));
        if response.is_ok() {
            state.delivered.push(outcome.clone());
        }
        response
    }
}
