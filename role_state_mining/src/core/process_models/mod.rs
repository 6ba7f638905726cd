//! Process Models
//!
//! Role-state nets and the trace frequency tables they are compared with
pub mod role_state_net;
pub mod trace_frequency;
