#![warn(
    clippy::doc_markdown,
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs
)]
#![doc = include_str!("../README.md")]

///
/// Core: state snapshot logs, role-state nets and trace frequencies
///
pub mod core;

///
/// Discovery of role-state nets
///
pub mod discovery;

///
/// Stochastic replay of role-state nets
///
pub mod simulation;

///
/// Scoring models against logs
///
pub mod conformance;

#[doc(inline)]
pub use crate::core::event_data::io::{
    export_state_snapshot_log_csv, export_trace_frequency_csv, import_state_snapshot_log_csv,
    import_state_snapshot_log_csv_from_path, SnapshotColumns, SnapshotLogIOError,
};

#[doc(inline)]
pub use crate::core::event_data::state_snapshot_log::{
    StateSnapshot, StateSnapshotLog, StateSnapshotLogOptions, TraceVariant,
};

#[doc(inline)]
pub use crate::core::process_models::role_state_net::{FiringRule, Marking, RoleStateNet};

#[doc(inline)]
pub use crate::core::process_models::trace_frequency::TraceFrequency;

#[doc(inline)]
pub use crate::discovery::{discover_closed_net, discover_role_state_net, MinerOptions};

#[doc(inline)]
pub use crate::simulation::{GeneratorOptions, StochasticLogGenerator};

#[doc(inline)]
pub use crate::conformance::{earth_movers, entropic_relevance, entropic_relevance_of_net, BackgroundModel};
