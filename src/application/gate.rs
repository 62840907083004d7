use crate::domain::ports::EnableLineBox;
use crate::error::HardwareError;
use tracing::error;

/// Logical open/closed view of the acceptor's enable line.
///
/// Translates to the physical level through `active_high` and skips writes
/// that would not change the line.
pub struct Gate {
    line: EnableLineBox,
    active_high: bool,
    open: Option<bool>,
}

impl Gate {
    pub fn new(line: EnableLineBox, active_high: bool) -> Self {
        Self {
            line,
            active_high,
            open: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open == Some(true)
    }

    /// First write at startup. Failure here means there is no hardware to drive.
    pub fn close_at_startup(&mut self) -> Result<(), HardwareError> {
        self.line.write(self.level(false))?;
        self.open = Some(false);
        Ok(())
    }

    pub fn open(&mut self) {
        self.set(true);
    }

    pub fn close(&mut self) {
        self.set(false);
    }

    fn level(&self, open: bool) -> bool {
        open == self.active_high
    }

    fn set(&mut self, open: bool) {
        if self.open == Some(open) {
            return;
        }
        match self.line.write(self.level(open)) {
            Ok(()) => self.open = Some(open),
            Err(e) => error!(open, error = %e, "Failed to drive acceptor enable line"),
        }
    }
}
