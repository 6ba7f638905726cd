//! Conformance Checking
//!
//! Compare the trace distribution of a model with the trace distribution of a log.
pub mod earth_movers;
pub mod entropic_relevance;
pub mod role_state_metrics;

#[doc(inline)]
pub use earth_movers::earth_movers;
#[doc(inline)]
pub use entropic_relevance::{entropic_relevance, BackgroundModel, RelevanceCost, RelevanceError};
#[doc(inline)]
pub use role_state_metrics::{earth_movers_of_net, entropic_relevance_of_net};
