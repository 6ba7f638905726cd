//! Event Data
//!
//! State snapshot logs and their CSV adapters
pub mod io;
pub mod state_snapshot_log;

#[doc(inline)]
pub use state_snapshot_log::StateSnapshotLog;
