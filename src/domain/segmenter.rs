use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmenterState {
    Idle,
    Accumulating,
}

/// What the segmenter did with one raw edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeVerdict {
    /// First accepted edge of a new burst.
    Opened,
    /// Accepted edge inside an open burst.
    Counted,
    /// Arrived within the debounce interval of the previous accepted edge.
    Bounce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseBurst {
    pub raw_count: u32,
    pub last_edge_at: Instant,
}

/// Groups debounced edges into bursts separated by quiescence gaps.
///
/// Time is always supplied by the caller, which keeps the segmenter a plain
/// state machine: the controller owns the clock and the burst timer.
#[derive(Debug)]
pub struct PulseSegmenter {
    debounce: Duration,
    quiescence: Duration,
    last_accepted: Option<Instant>,
    burst: Option<PulseBurst>,
}

impl PulseSegmenter {
    pub fn new(debounce: Duration, quiescence: Duration) -> Self {
        Self {
            debounce,
            quiescence,
            last_accepted: None,
            burst: None,
        }
    }

    pub fn state(&self) -> SegmenterState {
        if self.burst.is_some() {
            SegmenterState::Accumulating
        } else {
            SegmenterState::Idle
        }
    }

    pub fn is_accumulating(&self) -> bool {
        self.burst.is_some()
    }

    pub fn pending_pulses(&self) -> u32 {
        self.burst.map(|b| b.raw_count).unwrap_or(0)
    }

    pub fn on_edge(&mut self, at: Instant) -> EdgeVerdict {
        if let Some(prev) = self.last_accepted
            && at.saturating_duration_since(prev) <= self.debounce
        {
            return EdgeVerdict::Bounce;
        }
        self.last_accepted = Some(at);

        match self.burst.as_mut() {
            Some(burst) => {
                burst.raw_count += 1;
                burst.last_edge_at = at;
                EdgeVerdict::Counted
            }
            None => {
                self.burst = Some(PulseBurst {
                    raw_count: 1,
                    last_edge_at: at,
                });
                EdgeVerdict::Opened
            }
        }
    }

    /// When the open burst closes if no further edge is accepted.
    pub fn close_deadline(&self) -> Option<Instant> {
        self.burst.map(|b| b.last_edge_at + self.quiescence)
    }

    /// Ends the open burst and returns its raw pulse count.
    pub fn close(&mut self) -> Option<u32> {
        self.burst.take().map(|b| b.raw_count)
    }

    /// Forgets the open burst and the debounce reference.
    pub fn reset(&mut self) {
        self.burst = None;
        self.last_accepted = None;
    }
}
