//! Noise reduction for mined nets and for logs before mining
use tracing::debug;

use crate::core::event_data::state_snapshot_log::{trace_to_variant, StateSnapshotLog};
use crate::core::process_models::role_state_net::RoleStateNet;

///
/// Drop every transition whose weight is at most `threshold × total weight`
///
/// Arcs of dropped transitions go with them, as does every place left without arcs.
/// The result may be disconnected; this is not repaired.
///
pub fn prune_by_transition_weight(net: &RoleStateNet, threshold: f64) -> RoleStateNet {
    let limit = threshold * net.total_weight();
    let pruned = net.restrict_transitions(|t| t.weight > limit);
    debug!(
        limit,
        dropped = net.transition_count() - pruned.transition_count(),
        "pruned light transitions"
    );
    pruned
}

///
/// Drop every case whose trace variant occurs in fewer than `threshold × case count` cases
///
/// A non-positive threshold keeps all cases.
///
pub fn filter_variants_by_frequency(log: &StateSnapshotLog, threshold: f64) -> StateSnapshotLog {
    if threshold <= 0.0 {
        return log.clone();
    }
    let variants = log.variants();
    let limit = threshold * log.len() as f64;
    let filtered = log.retain_cases(|_, trace| {
        variants
            .get(&trace_to_variant(trace))
            .is_some_and(|count| *count as f64 >= limit)
    });
    debug!(limit, kept = filtered.len(), of = log.len(), "filtered rare variants");
    filtered
}
