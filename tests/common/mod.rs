#![allow(dead_code)]

use bill_acceptor::application::controller::{AcceptorController, AcceptorHandle, EdgeSender};
use bill_acceptor::application::reporter::{Reporter, RetryPolicy};
use bill_acceptor::config::{ControllerConfig, Settings, Timings};
use bill_acceptor::domain::transaction::FinishedTransaction;
use bill_acceptor::infrastructure::in_memory::{RecordingEnableLine, RecordingReportSink};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};

pub const DEBOUNCE: Duration = Duration::from_millis(50);
pub const BURST_QUIESCENCE: Duration = Duration::from_millis(300);
pub const SETTLE_WINDOW: Duration = Duration::from_secs(2);
pub const TIMEOUT: Duration = Duration::from_secs(30);
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Gap between two pulses of the same note; comfortably above the debounce.
pub const PULSE_GAP: Duration = Duration::from_millis(100);

pub fn controller_config() -> ControllerConfig {
    ControllerConfig {
        timings: Timings {
            debounce: DEBOUNCE,
            burst_quiescence: BURST_QUIESCENCE,
            settle_window: SETTLE_WINDOW,
            transaction_timeout: TIMEOUT,
        },
        enable_active_high: true,
        close_on_target: false,
        resume_on_amount_mismatch: true,
    }
}

pub struct Rig {
    pub handle: AcceptorHandle,
    pub edges: EdgeSender,
    pub line: RecordingEnableLine,
    pub sink: RecordingReportSink,
    pub finished: broadcast::Receiver<FinishedTransaction>,
    pub task: JoinHandle<()>,
}

pub fn rig() -> Rig {
    rig_with(controller_config(), RecordingReportSink::new())
}

pub fn rig_with(config: ControllerConfig, sink: RecordingReportSink) -> Rig {
    let table = Settings::default().denomination_table().unwrap();
    let line = RecordingEnableLine::new();
    let reporter = Reporter::new(Box::new(sink.clone()), RetryPolicy::new(3, RETRY_DELAY));
    let (handle, task) =
        AcceptorController::spawn(config, table, Box::new(line.clone()), reporter).unwrap();
    Rig {
        edges: handle.edges(),
        finished: handle.subscribe(),
        handle,
        line,
        sink,
        task,
    }
}

/// Emits one note's worth of pulses, `gap` apart, ending `gap` after the last.
pub async fn pulses(edges: &EdgeSender, count: u32, gap: Duration) {
    for _ in 0..count {
        assert!(edges.notify());
        sleep(gap).await;
    }
}

pub async fn note(edges: &EdgeSender, count: u32) {
    pulses(edges, count, PULSE_GAP).await;
}

pub fn assert_elapsed(start: Instant, expected: Duration) {
    let elapsed = Instant::now() - start;
    assert!(
        elapsed >= expected && elapsed <= expected + Duration::from_millis(5),
        "expected ~{:?}, got {:?}",
        expected,
        elapsed
    );
}
