//! CSV adapters for the replay tool: recorded pulse traces in, finished
//! transactions out.

pub mod outcome_writer;
pub mod trace_reader;
