//! Role-state nets
//!
//! Weighted Petri nets whose places are roles, with firing rules, markings and reachability.
pub mod macros;
pub(crate) mod marking;
pub(crate) mod net_struct;
pub mod reachability;
pub mod semantics;

pub use marking::*;
pub use net_struct::*;
#[doc(inline)]
pub use reachability::{reachability_graph, reachable_markings};
#[doc(inline)]
pub use semantics::{FiringError, FiringRule};
