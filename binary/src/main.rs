use std::{env, process::ExitCode, time::Instant};

use role_state_mining::{
    conformance::role_state_metrics::{earth_movers_of_net, DEFAULT_GRANULARITY},
    discover_role_state_net, entropic_relevance_of_net, import_state_snapshot_log_csv_from_path,
    BackgroundModel, FiringRule, MinerOptions, SnapshotColumns, StateSnapshotLogOptions,
    TraceFrequency,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn run(path: &str, columns: SnapshotColumns) -> Result<(), Box<dyn std::error::Error>> {
    let now = Instant::now();
    let log = import_state_snapshot_log_csv_from_path(
        path,
        &columns,
        &StateSnapshotLogOptions::default(),
    )?;
    println!(
        "Imported log in {:#?}: {}",
        now.elapsed(),
        serde_json::to_string(&log.stats())?
    );

    let now = Instant::now();
    let net = discover_role_state_net(&log, &MinerOptions::default())?;
    println!(
        "Mined role-state net with {} places and {} transitions in {:#?}",
        net.place_count(),
        net.transition_count(),
        now.elapsed()
    );

    let variants = TraceFrequency::from_log(&log);
    let start = net
        .initial_marking()
        .ok_or("Mined net has no initial place")?;
    for background in [
        BackgroundModel::Uniform,
        BackgroundModel::UniformRoleSet,
        BackgroundModel::ZeroOrder,
    ] {
        let relevance = entropic_relevance_of_net(
            &variants,
            &start,
            FiringRule::Active,
            DEFAULT_GRANULARITY,
            background,
        )?;
        println!("Entropic relevance ({background:?}): {relevance:.6}");
    }
    let emd = earth_movers_of_net(&variants, &start, FiringRule::Active, DEFAULT_GRANULARITY)?;
    println!("Earth mover's stochastic conformance: {emd:.6}");

    println!("{}", net.to_json()?);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(path) = args.first() else {
        eprintln!("Usage: binary <log.csv[.gz]> [case column] [role column] [time column]");
        return ExitCode::FAILURE;
    };
    let column = |i: usize, default: &'static str| args.get(i).map_or(default, String::as_str);
    let columns = SnapshotColumns::point(column(1, "case"), column(2, "role"), column(3, "time"));
    info!(path = path.as_str(), ?columns, "mining role-state net");

    match run(path, columns) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
