use super::transaction::Outcome;
use crate::error::{HardwareError, SendError};
use async_trait::async_trait;

/// Output line that enables or disables the acceptor.
///
/// Writes happen on the controller task next to the state change they mirror,
/// so implementations must not block.
pub trait EnableLine: Send + Sync {
    fn write(&self, level: bool) -> Result<(), HardwareError>;
}

/// Delivers a final outcome to the remote system. One call is one attempt.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn send(&self, outcome: &Outcome) -> Result<(), SendError>;
}

pub type EnableLineBox = Box<dyn EnableLine>;
pub type ReportSinkBox = Box<dyn ReportSink>;
