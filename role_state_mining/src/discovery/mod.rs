//! Process Discovery
//!
//! Mining role-state nets from state snapshot logs
pub mod role_state;

#[doc(inline)]
pub use role_state::{discover_closed_net, discover_role_state_net, MinerOptions};
