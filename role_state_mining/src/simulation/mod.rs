//! Simulation of role-state nets
pub mod stochastic_log;

#[doc(inline)]
pub use stochastic_log::{GeneratorOptions, StochasticLogGenerator};
