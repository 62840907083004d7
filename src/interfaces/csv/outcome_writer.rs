use crate::domain::transaction::FinishedTransaction;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct OutcomeRow<'a> {
    id: &'a str,
    status: &'static str,
    total_inserted: u64,
    overpaid: u64,
    remaining_due: u64,
    delivery: &'static str,
    attempts: u32,
}

/// Writes finished transactions as CSV.
pub struct OutcomeWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OutcomeWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_all<'a>(
        &mut self,
        finished: impl IntoIterator<Item = &'a FinishedTransaction>,
    ) -> Result<()> {
        for f in finished {
            self.writer.serialize(OutcomeRow {
                id: &f.outcome.id,
                status: f.outcome.status.as_str(),
                total_inserted: f.outcome.total_inserted.value(),
                overpaid: f.outcome.overpaid.value(),
                remaining_due: f.outcome.remaining_due.value(),
                delivery: f.delivery.label(),
                attempts: f.delivery.attempts(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
