use super::gate::Gate;
use super::reporter::Reporter;
use super::scheduler::{CompletionScheduler, TimerSlot, Wake};
use crate::config::ControllerConfig;
use crate::domain::amount::Amount;
use crate::domain::denomination::DenominationTable;
use crate::domain::ledger::Ledger;
use crate::domain::ports::EnableLineBox;
use crate::domain::segmenter::{EdgeVerdict, PulseSegmenter, SegmenterState};
use crate::domain::transaction::{
    Delivery, FinishedTransaction, OutcomeStatus, TransactionState,
};
use crate::error::{AcceptorError, RejectionKind, Result, StartRejection};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

const FINISHED_CAPACITY: usize = 64;

/// Point-in-time view of the controller for the request layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub state: TransactionState,
    pub id: Option<String>,
    pub target: Option<Amount>,
    pub total_inserted: Amount,
    pub remainder: Option<i128>,
    pub segmenter: SegmenterState,
    pub burst_pulses: u32,
}

enum Command {
    Edge(Instant),
    Start {
        id: String,
        target: i64,
        reply: oneshot::Sender<std::result::Result<(), StartRejection>>,
    },
    Status {
        reply: oneshot::Sender<StatusSnapshot>,
    },
    Abort {
        reply: oneshot::Sender<bool>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct ReportDone {
    sequence: u64,
    delivery: Delivery,
}

/// Producer side of the pulse input. Safe to call from a hardware callback:
/// sending never blocks and never waits on the controller.
#[derive(Clone)]
pub struct EdgeSender {
    commands: mpsc::UnboundedSender<Command>,
}

impl EdgeSender {
    /// Records a rising edge observed now. Returns `false` once the
    /// controller has stopped.
    pub fn notify(&self) -> bool {
        self.notify_at(Instant::now())
    }

    pub fn notify_at(&self, at: Instant) -> bool {
        self.commands.send(Command::Edge(at)).is_ok()
    }
}

/// Cloneable handle to a running [`AcceptorController`].
#[derive(Clone)]
pub struct AcceptorHandle {
    commands: mpsc::UnboundedSender<Command>,
    finished: broadcast::Sender<FinishedTransaction>,
}

impl AcceptorHandle {
    pub fn edges(&self) -> EdgeSender {
        EdgeSender {
            commands: self.commands.clone(),
        }
    }

    pub async fn start_transaction(
        &self,
        id: impl Into<String>,
        target: i64,
    ) -> std::result::Result<(), StartRejection> {
        let (reply, rx) = oneshot::channel();
        let cmd = Command::Start {
            id: id.into(),
            target,
            reply,
        };
        self.commands
            .send(cmd)
            .map_err(|_| StartRejection::Stopped)?;
        rx.await.unwrap_or(Err(StartRejection::Stopped))
    }

    pub async fn status(&self) -> Result<StatusSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Status { reply })
            .map_err(|_| AcceptorError::ControllerStopped)?;
        rx.await.map_err(|_| AcceptorError::ControllerStopped)
    }

    /// Cancels the active transaction, if any. Returns whether one existed.
    pub async fn abort(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Abort { reply })
            .map_err(|_| AcceptorError::ControllerStopped)?;
        rx.await.map_err(|_| AcceptorError::ControllerStopped)
    }

    /// Receives every transaction as it is released.
    pub fn subscribe(&self) -> broadcast::Receiver<FinishedTransaction> {
        self.finished.subscribe()
    }

    /// Stops accepting new transactions and waits until the current one
    /// (timers and report included) has been released.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Shutdown { reply })
            .map_err(|_| AcceptorError::ControllerStopped)?;
        rx.await.map_err(|_| AcceptorError::ControllerStopped)
    }
}

/// Owns every piece of mutable acceptor state and serializes all access to it.
///
/// Edges, trigger commands, timer expiries and report completions are handled
/// one at a time on a single task, and every enable-line write happens right
/// next to the state change it reflects.
pub struct AcceptorController {
    config: ControllerConfig,
    table: DenominationTable,
    gate: Gate,
    reporter: Reporter,
    ledger: Ledger,
    segmenter: PulseSegmenter,
    burst: TimerSlot,
    scheduler: CompletionScheduler,
    /// The settle timer fired mid-burst; evaluate once the burst closes.
    settle_deferred: bool,
    commands: mpsc::UnboundedReceiver<Command>,
    commands_closed: bool,
    reports: mpsc::UnboundedReceiver<ReportDone>,
    reports_tx: mpsc::UnboundedSender<ReportDone>,
    finished: broadcast::Sender<FinishedTransaction>,
    stopping: bool,
    shutdown_waiters: Vec<oneshot::Sender<()>>,
}

impl AcceptorController {
    /// Closes the acceptor, then starts the controller task.
    ///
    /// Fails if the enable line can't be written: without it the acceptor
    /// can't be kept from swallowing notes, so no transaction may start.
    pub fn spawn(
        config: ControllerConfig,
        table: DenominationTable,
        line: EnableLineBox,
        reporter: Reporter,
    ) -> Result<(AcceptorHandle, JoinHandle<()>)> {
        let mut gate = Gate::new(line, config.enable_active_high);
        gate.close_at_startup()?;

        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (reports_tx, reports) = mpsc::unbounded_channel();
        let (finished, _) = broadcast::channel(FINISHED_CAPACITY);
        let timings = config.timings;

        let controller = Self {
            config,
            table,
            gate,
            reporter,
            ledger: Ledger::new(),
            segmenter: PulseSegmenter::new(timings.debounce, timings.burst_quiescence),
            burst: TimerSlot::new(),
            scheduler: CompletionScheduler::new(
                timings.settle_window,
                timings.transaction_timeout,
            ),
            settle_deferred: false,
            commands,
            commands_closed: false,
            reports,
            reports_tx,
            finished: finished.clone(),
            stopping: false,
            shutdown_waiters: Vec::new(),
        };

        let handle = AcceptorHandle {
            commands: commands_tx,
            finished,
        };
        info!("Acceptor controller started, acceptor closed");
        Ok((handle, tokio::spawn(controller.run())))
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.commands.recv(), if !self.commands_closed => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => self.commands_closed = true,
                },
                Some(done) = self.reports.recv() => self.on_report_done(done),
                _ = self.burst.expired() => {
                    self.burst.cancel();
                    self.on_burst_timeout();
                }
                wake = self.scheduler.next() => self.on_wake(wake),
            }

            if (self.stopping || self.commands_closed)
                && self.ledger.state() == TransactionState::Idle
            {
                break;
            }
        }

        self.gate.close();
        for waiter in self.shutdown_waiters.drain(..) {
            let _ = waiter.send(());
        }
        info!("Acceptor controller stopped");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Edge(at) => self.on_edge(at),
            Command::Start { id, target, reply } => {
                let _ = reply.send(self.start(&id, target));
            }
            Command::Status { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Abort { reply } => {
                let _ = reply.send(self.abort());
            }
            Command::Shutdown { reply } => {
                info!("Shutdown requested");
                self.stopping = true;
                self.shutdown_waiters.push(reply);
            }
        }
    }

    fn start(&mut self, id: &str, target: i64) -> std::result::Result<(), StartRejection> {
        if self.stopping {
            return Err(StartRejection::Stopped);
        }
        if let Err(rejection) = self.ledger.start(id, target) {
            warn!(
                id,
                target_amount = target,
                reason = rejection.code(),
                "Transaction start rejected"
            );
            return Err(rejection);
        }

        self.segmenter.reset();
        self.burst.cancel();
        self.settle_deferred = false;
        self.scheduler.start(Instant::now());
        self.gate.open();
        info!(id, target_amount = target, "Transaction started, acceptor open");
        Ok(())
    }

    fn on_edge(&mut self, at: Instant) {
        if !self.ledger.is_active() {
            debug!("Pulse ignored, no active transaction");
            return;
        }
        match self.segmenter.on_edge(at) {
            EdgeVerdict::Bounce => {
                trace!("Pulse discarded as bounce");
                return;
            }
            EdgeVerdict::Opened => {
                // One note at a time: hold the next one back until this burst is counted.
                self.gate.close();
                debug!("Burst started");
            }
            EdgeVerdict::Counted => {
                trace!(pulses = self.segmenter.pending_pulses(), "Pulse counted");
            }
        }
        if let Some(deadline) = self.segmenter.close_deadline() {
            self.burst.arm_at(deadline);
        }
    }

    fn on_burst_timeout(&mut self) {
        let Some(raw_count) = self.segmenter.close() else {
            return;
        };
        let credited = self.apply_burst(raw_count);

        if !credited && self.settle_deferred {
            self.settle_deferred = false;
            self.evaluate_settle();
        }

        if self.ledger.is_active() {
            if self.config.close_on_target && self.ledger.is_settled() {
                debug!("Target met, acceptor stays closed until finalize");
            } else {
                self.gate.open();
            }
        }
    }

    /// Corrects a closed burst and credits it. Returns whether it was valid.
    fn apply_burst(&mut self, raw_count: u32) -> bool {
        let Some(amount) = self.table.correct(raw_count) else {
            warn!(raw_count, "Burst rejected, no denomination within tolerance");
            return false;
        };
        let Some(remainder) = self.ledger.credit(amount) else {
            return false;
        };
        self.scheduler.restart_settle(Instant::now());
        self.settle_deferred = false;

        let total = self
            .ledger
            .current()
            .map(|tx| tx.total_inserted)
            .unwrap_or_default();
        info!(
            raw_count,
            %amount,
            %total,
            %remainder,
            "Note accepted"
        );
        true
    }

    fn on_wake(&mut self, wake: Wake) {
        match wake {
            Wake::Settle => {
                if self.segmenter.is_accumulating() {
                    self.settle_deferred = true;
                    return;
                }
                self.evaluate_settle();
            }
            Wake::Deadline => {
                if let Some(raw_count) = self.segmenter.close() {
                    self.burst.cancel();
                    self.apply_burst(raw_count);
                }
                info!("Transaction timeout reached");
                self.finalize();
            }
        }
    }

    fn evaluate_settle(&mut self) {
        if self.ledger.is_settled() {
            self.finalize();
        } else if let Some(remainder) = self.ledger.remainder() {
            info!(%remainder, "Balance still due, waiting for more notes");
        }
    }

    fn finalize(&mut self) {
        let Some((sequence, outcome)) = self.ledger.finalize() else {
            return;
        };
        self.scheduler.cancel_all();
        self.burst.cancel();
        self.segmenter.reset();
        self.settle_deferred = false;
        self.gate.close();

        info!(
            id = %outcome.id,
            status = outcome.status.as_str(),
            total_inserted = %outcome.total_inserted,
            overpaid = %outcome.overpaid,
            remaining_due = %outcome.remaining_due,
            "Transaction finalized, acceptor closed"
        );

        let reporter = self.reporter.clone();
        let reports = self.reports_tx.clone();
        tokio::spawn(async move {
            let delivery = reporter.report(&outcome).await;
            let _ = reports.send(ReportDone { sequence, delivery });
        });
    }

    fn on_report_done(&mut self, done: ReportDone) {
        if self.is_short_payment_dispute(&done.delivery) && self.resume(done.sequence) {
            return;
        }

        let Some(finished) = self.ledger.complete(done.sequence, done.delivery) else {
            debug!(
                sequence = done.sequence,
                "Ignoring report completion for a released transaction"
            );
            return;
        };

        let id = &finished.outcome.id;
        match &finished.delivery {
            Delivery::Delivered { .. } => {}
            Delivery::Rejected {
                kind: RejectionKind::AlreadySettled,
                ..
            } => warn!(%id, "Remote already settled this transaction, abandoning"),
            Delivery::Rejected {
                kind: RejectionKind::AmountMismatch,
                ..
            } => warn!(%id, "Remote disputes the amount, abandoning"),
            Delivery::Rejected { message, .. } => {
                warn!(%id, %message, "Remote rejected the report, abandoning")
            }
            Delivery::Exhausted { .. } => {
                warn!(%id, "Report undelivered, transaction released locally")
            }
        }

        let _ = self.finished.send(finished);
        info!("Acceptor ready for the next transaction");
    }

    /// The remote says the amount is wrong and we reported a shortfall: the
    /// customer can still pay the balance.
    fn is_short_payment_dispute(&self, delivery: &Delivery) -> bool {
        self.config.resume_on_amount_mismatch
            && matches!(
                delivery,
                Delivery::Rejected {
                    kind: RejectionKind::AmountMismatch,
                    ..
                }
            )
            && self
                .ledger
                .current()
                .is_some_and(|tx| tx.outcome().status == OutcomeStatus::Failed)
    }

    /// Takes a rejected transaction back to Active with fresh timers and the
    /// acceptor open. Returns `false` if the completion was stale.
    fn resume(&mut self, sequence: u64) -> bool {
        let Some(tx) = self.ledger.resume(sequence) else {
            return false;
        };
        let id = tx.id.clone();
        let remainder = tx.remainder();

        self.segmenter.reset();
        self.burst.cancel();
        self.settle_deferred = false;
        self.scheduler.start(Instant::now());
        self.gate.open();
        warn!(%id, %remainder, "Remote disputes the amount, acceptor re-opened for the balance");
        true
    }

    fn abort(&mut self) -> bool {
        let Some(tx) = self.ledger.abort() else {
            return false;
        };
        self.scheduler.cancel_all();
        self.burst.cancel();
        self.segmenter.reset();
        self.settle_deferred = false;
        self.gate.close();
        warn!(id = %tx.id, total_inserted = %tx.total_inserted, "Transaction aborted");
        true
    }

    fn snapshot(&self) -> StatusSnapshot {
        let tx = self.ledger.current();
        StatusSnapshot {
            state: self.ledger.state(),
            id: tx.map(|tx| tx.id.clone()),
            target: tx.map(|tx| tx.target),
            total_inserted: tx.map(|tx| tx.total_inserted).unwrap_or_default(),
            remainder: self.ledger.remainder().map(|r| r.value()),
            segmenter: self.segmenter.state(),
            burst_pulses: self.segmenter.pending_pulses(),
        }
    }
}
