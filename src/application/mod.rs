//! Application layer: the acceptor controller and the collaborators it drives.
//!
//! `AcceptorController` runs as an actor on its own `tokio` task. Edges,
//! trigger commands, timers and report completions are all funnelled through
//! it, so the ledger and the enable line never disagree.

pub mod controller;
pub mod gate;
pub mod reporter;
pub mod scheduler;
