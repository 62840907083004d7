use super::amount::{Amount, Remainder};
use crate::error::RejectionKind;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    #[default]
    Idle,
    Active,
    Finalizing,
    Completed,
}

/// The single payment currently being collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: String,
    /// Monotonic per-controller counter used to match late report completions.
    pub sequence: u64,
    pub target: Amount,
    pub total_inserted: Amount,
    pub state: TransactionState,
}

impl Transaction {
    pub fn new(id: String, sequence: u64, target: Amount) -> Self {
        Self {
            id,
            sequence,
            target,
            total_inserted: Amount::ZERO,
            state: TransactionState::Active,
        }
    }

    pub fn remainder(&self) -> Remainder {
        self.target.remainder_after(self.total_inserted)
    }

    /// Builds the final outcome. Only a settled remainder can be a success.
    pub fn outcome(&self) -> Outcome {
        let remainder = self.remainder();
        let status = if remainder.value() < 0 {
            OutcomeStatus::Overpaid
        } else if remainder.value() == 0 {
            OutcomeStatus::Success
        } else {
            OutcomeStatus::Failed
        };
        Outcome {
            id: self.id.clone(),
            status,
            total_inserted: self.total_inserted,
            overpaid: remainder.overpaid(),
            remaining_due: remainder.due(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Overpaid,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::Overpaid => "overpaid",
            OutcomeStatus::Failed => "failed",
        }
    }
}

/// Final state of a transaction, in the shape the remote system expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    #[serde(rename = "id_trx")]
    pub id: String,
    pub status: OutcomeStatus,
    pub total_inserted: Amount,
    pub overpaid: Amount,
    pub remaining_due: Amount,
}

/// How reporting an outcome ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered {
        attempts: u32,
    },
    Rejected {
        kind: RejectionKind,
        message: String,
        attempts: u32,
    },
    Exhausted {
        attempts: u32,
        last_error: String,
    },
}

impl Delivery {
    pub fn attempts(&self) -> u32 {
        match self {
            Delivery::Delivered { attempts }
            | Delivery::Rejected { attempts, .. }
            | Delivery::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Delivery::Delivered { .. } => "delivered",
            Delivery::Rejected { .. } => "rejected",
            Delivery::Exhausted { .. } => "exhausted",
        }
    }
}

/// Published once per transaction when it is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedTransaction {
    pub outcome: Outcome,
    pub delivery: Delivery,
    pub state: TransactionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(target: u64, inserted: u64) -> Transaction {
        let mut tx = Transaction::new("TRX-1".to_string(), 1, Amount::new(target));
        tx.total_inserted = Amount::new(inserted);
        tx
    }

    #[test]
    fn test_outcome_success() {
        let outcome = tx(15_000, 15_000).outcome();
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert_eq!(outcome.overpaid, Amount::ZERO);
        assert_eq!(outcome.remaining_due, Amount::ZERO);
    }

    #[test]
    fn test_outcome_overpaid() {
        let outcome = tx(5_000, 10_000).outcome();
        assert_eq!(outcome.status, OutcomeStatus::Overpaid);
        assert_eq!(outcome.overpaid, Amount::new(5_000));
    }

    #[test]
    fn test_outcome_failed() {
        let outcome = tx(5_000, 2_000).outcome();
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.remaining_due, Amount::new(3_000));
        assert_eq!(outcome.total_inserted, Amount::new(2_000));
    }

    #[test]
    fn test_outcome_wire_format() {
        let json = serde_json::to_value(tx(5_000, 10_000).outcome()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id_trx": "TRX-1",
                "status": "overpaid",
                "total_inserted": 10000,
                "overpaid": 5000,
                "remaining_due": 0
            })
        );
    }
}
