use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcceptorError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),
    #[error("Denomination table error: {0}")]
    TableError(#[from] TableError),
    #[error("Hardware error: {0}")]
    HardwareError(#[from] HardwareError),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
    #[error("Reporter error: {0}")]
    ReporterError(String),
    #[error("Acceptor controller has stopped")]
    ControllerStopped,
}

pub type Result<T> = std::result::Result<T, AcceptorError>;

/// Problems found while validating a denomination table at load time.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TableError {
    #[error("denomination table is empty")]
    Empty,
    #[error("pulse count must be positive")]
    ZeroPulses,
    #[error("amount for {pulses} pulses must be positive")]
    ZeroAmount { pulses: u32 },
    #[error("pulse count {0} is defined more than once")]
    DuplicatePulses(u32),
    #[error("override band {min}..={max} is empty")]
    EmptyBand { min: u32, max: u32 },
    #[error("override band {min}..={max} must not cover 0 or 1 pulses")]
    BandCoversExactMatch { min: u32, max: u32 },
    #[error("override band targets undefined pulse count {0}")]
    UnknownOverrideTarget(u32),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    #[error("enable line unavailable: {0}")]
    Unavailable(String),
    #[error("failed to write enable line: {0}")]
    WriteFailed(String),
}

/// Why a `StartTransaction` request was refused. No state changes on rejection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartRejection {
    #[error("a transaction is already in progress")]
    Busy,
    #[error("transaction id must not be empty")]
    EmptyId,
    #[error("target amount must be positive")]
    NonPositiveTarget,
    #[error("acceptor controller has stopped")]
    Stopped,
}

impl StartRejection {
    /// Stable reason code for the request layer.
    pub fn code(&self) -> &'static str {
        match self {
            StartRejection::Busy => "busy",
            StartRejection::EmptyId => "empty_id",
            StartRejection::NonPositiveTarget => "non_positive_target",
            StartRejection::Stopped => "stopped",
        }
    }
}

/// Classification of a terminal rejection returned by the remote system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    AlreadySettled,
    AmountMismatch,
    Other,
}

impl RejectionKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "already_paid" | "already_settled" => RejectionKind::AlreadySettled,
            "amount_mismatch" => RejectionKind::AmountMismatch,
            _ => RejectionKind::Other,
        }
    }
}

/// Failure of a single report attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("rejected by remote ({kind:?}): {message}")]
    Rejected { kind: RejectionKind, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_kind_from_code() {
        assert_eq!(
            RejectionKind::from_code("already_paid"),
            RejectionKind::AlreadySettled
        );
        assert_eq!(
            RejectionKind::from_code("already_settled"),
            RejectionKind::AlreadySettled
        );
        assert_eq!(
            RejectionKind::from_code("amount_mismatch"),
            RejectionKind::AmountMismatch
        );
        assert_eq!(RejectionKind::from_code("nope"), RejectionKind::Other);
    }

    #[test]
    fn test_start_rejection_codes() {
        assert_eq!(StartRejection::Busy.code(), "busy");
        assert_eq!(StartRejection::EmptyId.code(), "empty_id");
        assert_eq!(
            StartRejection::NonPositiveTarget.code(),
            "non_positive_target"
        );
    }
}
