//! Pure domain types: amounts, denomination correction, burst segmentation
//! and the transaction ledger. Nothing here touches the clock or the network.

pub mod amount;
pub mod denomination;
pub mod ledger;
pub mod ports;
pub mod segmenter;
pub mod transaction;
