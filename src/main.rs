use std::process;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nodescale::cli::{format_snapshot_summary, Args, PolicyKind};
use nodescale::config::{load_cost_table, load_snapshot_file, Settings};
use nodescale::cost::CostState;
use nodescale::growth::GrowthState;
use nodescale::operations::{DryRunProvider, LogNotifier};
use nodescale::pod::group_pending_pods;
use nodescale::policy::ScalingPolicy;
use nodescale::ClusterContext;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // Load .env file if specified
    if let Some(ref env_file) = args.env_file {
        if let Err(e) = dotenvy::from_path(env_file) {
            error!("Failed to load env file {}: {}", env_file.display(), e);
            process::exit(1);
        }
    }

    let settings = Settings::from_env();
    let over_provision = args.over_provision.unwrap_or(settings.over_provision);
    let cost_data = args.cost_data.clone().unwrap_or(settings.cost_data);

    // Build the chosen policy
    let mut policy = match args.policy {
        PolicyKind::Basic => ScalingPolicy::Basic,
        PolicyKind::Cost => {
            let table = match load_cost_table(&cost_data) {
                Ok(table) => table,
                Err(e) => {
                    error!(
                        "Failed to load cost data {}: {}",
                        cost_data.display(),
                        e
                    );
                    process::exit(1);
                }
            };
            match CostState::new(args.max_cost_per_hour, args.region.as_str(), &table, Utc::now()) {
                Ok(state) => ScalingPolicy::CostConstrained(state),
                Err(e) => {
                    error!("Failed to build cost state: {}", e);
                    process::exit(1);
                }
            }
        }
        PolicyKind::Growth => ScalingPolicy::GrowthTriggered(GrowthState::new(
            args.growth_factor,
            args.triggers_to_provision,
        )),
    };

    let cluster = ClusterContext::new(Arc::new(DryRunProvider), Arc::new(LogNotifier))
        .with_over_provision(over_provision);

    // First snapshot, also printed as a summary
    let snapshot = match load_snapshot_file(&args.snapshot_file) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!(
                "Failed to load snapshot {}: {}",
                args.snapshot_file.display(),
                e
            );
            process::exit(1);
        }
    };
    println!("{}", format_snapshot_summary(&snapshot));

    let pending = group_pending_pods(snapshot.pods.clone());
    policy.apply(&pending, &snapshot.groups, &cluster).await;

    if args.interval == 0 {
        return;
    }

    // Re-run a cycle on every tick, reloading the snapshot so external
    // state changes are picked up
    info!("running a decision cycle every {}s", args.interval);
    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval));
    ticker.tick().await; // first tick completes immediately

    loop {
        ticker.tick().await;
        let snapshot = match load_snapshot_file(&args.snapshot_file) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(
                    "Failed to reload snapshot {}: {}",
                    args.snapshot_file.display(),
                    e
                );
                continue;
            }
        };
        let pending = group_pending_pods(snapshot.pods.clone());
        policy.apply(&pending, &snapshot.groups, &cluster).await;
    }
}
