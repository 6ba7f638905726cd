//! Scoring role-state nets against logs
//!
//! Generated model traces start in `{I}` and end in `{F}`, log variants do not.
//! Log variants are therefore enclosed before being compared.
use tracing::debug;

use super::earth_movers::earth_movers;
use super::entropic_relevance::{relevance_cost, BackgroundModel, RelevanceCost, RelevanceError};
use crate::core::event_data::state_snapshot_log::{role_set, RoleSet};
use crate::core::process_models::role_state_net::{FiringRule, Marking, FINAL_PLACE, INITIAL_PLACE};
use crate::core::process_models::trace_frequency::TraceFrequency;
use crate::simulation::stochastic_log::{
    GeneratorError, GeneratorOptions, StochasticLogGenerator, DEFAULT_LOG_SIZE,
};

/// Default number of model traces generated for scoring
pub const DEFAULT_GRANULARITY: u64 = DEFAULT_LOG_SIZE;

/// Wrap a trace variant with the initial entry `{I}` and the final entry `{F}`
pub fn enclose_trace(trace: &[RoleSet]) -> Vec<RoleSet> {
    let mut result = Vec::with_capacity(trace.len() + 2);
    result.push(role_set([INITIAL_PLACE]));
    result.extend(trace.iter().cloned());
    result.push(role_set([FINAL_PLACE]));
    result
}

/// [`enclose_trace`] applied to every trace of a table
pub fn enclose_traces(log: &TraceFrequency<RoleSet>) -> TraceFrequency<RoleSet> {
    TraceFrequency::new(
        log.elements()
            .iter()
            .map(|(trace, freq)| (enclose_trace(trace), *freq)),
    )
}

/// Generate `granularity` model traces from `initial` (truncation warnings disabled)
pub fn model_traces(
    initial: &Marking<'_>,
    rule: FiringRule,
    granularity: u64,
) -> Result<TraceFrequency<RoleSet>, GeneratorError> {
    let options = GeneratorOptions {
        log_size: granularity,
        warnings: false,
        ..Default::default()
    };
    StochasticLogGenerator::new(rule, options).generate(initial)
}

///
/// Components of entropic relevance of a net with respect to log variants
///
/// `log` holds the plain (not yet enclosed) variants, e.g. from
/// [`TraceFrequency::from_log`].
///
pub fn relevance_cost_of_net(
    log: &TraceFrequency<RoleSet>,
    initial: &Marking<'_>,
    rule: FiringRule,
    granularity: u64,
    background: BackgroundModel,
) -> Result<RelevanceCost, RelevanceError> {
    let model = model_traces(initial, rule, granularity)?;
    let enclosed = enclose_traces(log);
    let cost = relevance_cost(&enclosed, &model, background)?;
    debug!(
        model_traces = model.len(),
        log_traces = enclosed.len(),
        relevance = cost.total(),
        "scored net against log"
    );
    Ok(cost)
}

/// Entropic relevance of a net with respect to log variants (see [`relevance_cost_of_net`])
pub fn entropic_relevance_of_net(
    log: &TraceFrequency<RoleSet>,
    initial: &Marking<'_>,
    rule: FiringRule,
    granularity: u64,
    background: BackgroundModel,
) -> Result<f64, RelevanceError> {
    Ok(relevance_cost_of_net(log, initial, rule, granularity, background)?.total())
}

/// Earth mover's distance between log variants and the traces generated by a net
pub fn earth_movers_of_net(
    log: &TraceFrequency<RoleSet>,
    initial: &Marking<'_>,
    rule: FiringRule,
    granularity: u64,
) -> Result<f64, GeneratorError> {
    let model = model_traces(initial, rule, granularity)?;
    Ok(earth_movers(&enclose_traces(log), &model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_data::state_snapshot_log::{StateSnapshot, StateSnapshotLog};
    use crate::core::process_models::role_state_net::{RoleStateNet, RoleStateNetBuilder};
    use crate::discovery::role_state::{discover_role_state_net, MinerOptions};

    fn equal_choice_net() -> RoleStateNet {
        let mut builder = RoleStateNetBuilder::new();
        let to_a = builder.add_transition(None, 20.0);
        builder.connect(["I"], to_a, ["A"]).unwrap();
        let a_done = builder.add_transition(None, 20.0);
        builder.connect(["A"], a_done, ["F"]).unwrap();
        let to_b = builder.add_transition(None, 10.0);
        builder.connect(["I"], to_b, ["B"]).unwrap();
        let b_done = builder.add_transition(None, 10.0);
        builder.connect(["B"], b_done, ["F"]).unwrap();
        builder.build()
    }

    fn choice_log() -> TraceFrequency<RoleSet> {
        TraceFrequency::new([(vec![role_set(["A"])], 20), (vec![role_set(["B"])], 10)])
    }

    #[test]
    fn enclosing() {
        assert_eq!(
            enclose_trace(&[role_set(["A", "B"])]),
            vec![role_set(["I"]), role_set(["A", "B"]), role_set(["F"])]
        );
        let enclosed = enclose_traces(&choice_log());
        assert_eq!(enclosed.freq(&[role_set(["I"]), role_set(["A"]), role_set(["F"])]), 20);
        assert_eq!(enclosed.trace_total(), 30);
    }

    #[test]
    fn choice_matches_log() {
        let net = equal_choice_net();
        let start = net.initial_marking().unwrap();
        let model = model_traces(&start, FiringRule::Active, DEFAULT_GRANULARITY).unwrap();
        assert_eq!(model.freq(&[role_set(["I"]), role_set(["A"]), role_set(["F"])]), 666);
        assert_eq!(model.freq(&[role_set(["I"]), role_set(["B"]), role_set(["F"])]), 334);

        let cost = relevance_cost_of_net(
            &choice_log(),
            &start,
            FiringRule::Active,
            DEFAULT_GRANULARITY,
            BackgroundModel::UniformRoleSet,
        )
        .unwrap();
        assert_eq!(cost.selector, 0.0);
        assert!((cost.total() - 0.91829727578).abs() < 1e-6);

        let emd = earth_movers_of_net(&choice_log(), &start, FiringRule::Active, DEFAULT_GRANULARITY)
            .unwrap();
        assert!((emd - (1.0 - (20.0 / 30.0 - 0.666))).abs() < 1e-9);
    }

    #[test]
    fn mined_net_scores_its_own_log() {
        let mut traces = Vec::new();
        for i in 0..3 {
            let case = format!("s{i}");
            traces.push((case.clone(), vec![StateSnapshot::new(case, 0.0, ["Student"])]));
        }
        let case = "mixed".to_string();
        traces.push((
            case.clone(),
            vec![
                StateSnapshot::new(case.clone(), 0.0, ["Student"]),
                StateSnapshot::new(case, 1.0, ["Student", "Tutor"]),
            ],
        ));
        let log = StateSnapshotLog::from_traces(traces);
        let net = discover_role_state_net(&log, &MinerOptions::default()).unwrap();
        let variants = TraceFrequency::from_log(&log);
        let start = net.initial_marking().unwrap();

        for background in [
            BackgroundModel::Uniform,
            BackgroundModel::UniformRoleSet,
            BackgroundModel::ZeroOrder,
        ] {
            let relevance =
                entropic_relevance_of_net(&variants, &start, FiringRule::Active, 1000, background)
                    .unwrap();
            assert!(relevance >= 0.0);
        }
        let emd = earth_movers_of_net(&variants, &start, FiringRule::Active, 1000).unwrap();
        assert!(emd > 0.9, "{emd}");
    }

    #[test]
    fn empty_log_cannot_be_scored() {
        let net = equal_choice_net();
        let start = net.initial_marking().unwrap();
        assert_eq!(
            entropic_relevance_of_net(
                &TraceFrequency::default(),
                &start,
                FiringRule::Active,
                10,
                BackgroundModel::Uniform
            ),
            Err(RelevanceError::EmptyLog)
        );
    }
}
