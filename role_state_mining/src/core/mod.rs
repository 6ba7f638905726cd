//! Core modules for role-state mining

pub mod event_data;

pub mod process_models;

pub use event_data::state_snapshot_log::StateSnapshotLog;
pub use process_models::role_state_net::RoleStateNet;
pub use process_models::trace_frequency::TraceFrequency;
