use super::amount::{Amount, Remainder};
use super::transaction::{
    Delivery, FinishedTransaction, Outcome, Transaction, TransactionState,
};
use crate::error::StartRejection;

/// Holds the one active transaction and enforces its lifecycle:
/// `Idle -> Active -> Finalizing -> (Completed) -> Idle`.
///
/// `finalize` is the latch: it succeeds once per transaction and is a no-op
/// afterwards, so an outcome can never be produced twice.
#[derive(Debug, Default)]
pub struct Ledger {
    current: Option<Transaction>,
    next_sequence: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TransactionState {
        self.current
            .as_ref()
            .map(|tx| tx.state)
            .unwrap_or(TransactionState::Idle)
    }

    pub fn current(&self) -> Option<&Transaction> {
        self.current.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    pub fn remainder(&self) -> Option<Remainder> {
        self.current.as_ref().map(Transaction::remainder)
    }

    pub fn start(&mut self, id: &str, target: i64) -> Result<&Transaction, StartRejection> {
        if self.current.is_some() {
            return Err(StartRejection::Busy);
        }
        if id.trim().is_empty() {
            return Err(StartRejection::EmptyId);
        }
        if target <= 0 {
            return Err(StartRejection::NonPositiveTarget);
        }

        self.next_sequence += 1;
        let tx = Transaction::new(
            id.to_string(),
            self.next_sequence,
            Amount::new(target as u64),
        );
        Ok(self.current.insert(tx))
    }

    /// Adds a corrected burst to the running total. Ignored unless Active.
    pub fn credit(&mut self, amount: Amount) -> Option<Remainder> {
        let tx = self
            .current
            .as_mut()
            .filter(|tx| tx.state == TransactionState::Active)?;
        tx.total_inserted += amount;
        Some(tx.remainder())
    }

    /// Whether the active transaction has reached or passed its target.
    pub fn is_settled(&self) -> bool {
        self.current
            .as_ref()
            .filter(|tx| tx.state == TransactionState::Active)
            .is_some_and(|tx| tx.remainder().is_settled())
    }

    /// Latches Active -> Finalizing and returns the outcome to report along
    /// with the transaction's sequence number.
    pub fn finalize(&mut self) -> Option<(u64, Outcome)> {
        let tx = self
            .current
            .as_mut()
            .filter(|tx| tx.state == TransactionState::Active)?;
        tx.state = TransactionState::Finalizing;
        Some((tx.sequence, tx.outcome()))
    }

    /// Releases a finalizing transaction once its report has finished.
    ///
    /// Completions for any other sequence (an aborted or older transaction)
    /// are ignored.
    pub fn complete(&mut self, sequence: u64, delivery: Delivery) -> Option<FinishedTransaction> {
        let matches = self.current.as_ref().is_some_and(|tx| {
            tx.sequence == sequence && tx.state == TransactionState::Finalizing
        });
        if !matches {
            return None;
        }
        let mut tx = self.current.take()?;
        tx.state = TransactionState::Completed;
        Some(FinishedTransaction {
            outcome: tx.outcome(),
            delivery,
            state: tx.state,
        })
    }

    /// Puts a finalizing transaction back to Active so more notes can be
    /// credited against it. It gets a fresh sequence number, which makes any
    /// completion still carrying the old one stale.
    pub fn resume(&mut self, sequence: u64) -> Option<&Transaction> {
        let tx = self.current.as_mut().filter(|tx| {
            tx.sequence == sequence && tx.state == TransactionState::Finalizing
        })?;
        self.next_sequence += 1;
        tx.sequence = self.next_sequence;
        tx.state = TransactionState::Active;
        Some(&*tx)
    }

    /// Drops whatever transaction is held, in any state.
    pub fn abort(&mut self) -> Option<Transaction> {
        self.current.take()
    }
}
