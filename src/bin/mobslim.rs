//! `mobslim` CLI: builds the Network/Population/Optimizer pipeline and
//! runs it, following the teacher's own `clap::Parser` binaries under
//! `src/bin` (spec.md §6 "CLI surface").

use clap::{Parser, Subcommand};
use mobslim::config::Config;
use mobslim::expected::ExpectedLinkDurations;
use mobslim::io::event_writer::EventCsvWriter;
use mobslim::network::{self, Network};
use mobslim::optimizer::Optimizer;
use mobslim::plan::{self, Population};
use mobslim::planner::Planner;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Loads a MATSim-style network and plans file and runs the optimizer.
    Run {
        #[arg(long)]
        network: String,
        #[arg(long)]
        plans: String,
        #[arg(long, default_value = "./")]
        output_dir: String,
        #[arg(long, default_value_t = 1)]
        max_runs: u32,
        #[arg(long, default_value_t = 0.5)]
        p: f64,
        #[arg(long, default_value_t = 1.0)]
        alpha: f64,
        #[arg(long, default_value_t = 86400)]
        horizon: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Runs the optimizer on a synthetic grid network.
    Grid {
        #[arg(long)]
        size: u32,
        #[arg(long)]
        agents: u64,
        #[arg(long, default_value_t = 100.0)]
        length: f64,
        #[arg(long, default_value_t = 13.9)]
        free_speed: f64,
        #[arg(long, default_value_t = 0.5)]
        flow_capacity: f64,
        #[arg(long, default_value = "./")]
        output_dir: String,
        #[arg(long, default_value_t = 1)]
        max_runs: u32,
        #[arg(long, default_value_t = 0.5)]
        p: f64,
        #[arg(long, default_value_t = 1.0)]
        alpha: f64,
        #[arg(long, default_value_t = 86400)]
        horizon: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Runs the optimizer on a synthetic linear (chain) network.
    Linear {
        #[arg(long)]
        size: u32,
        #[arg(long)]
        agents: u64,
        #[arg(long, default_value_t = 100.0)]
        length: f64,
        #[arg(long, default_value_t = 13.9)]
        free_speed: f64,
        #[arg(long, default_value_t = 0.5)]
        flow_capacity: f64,
        #[arg(long, default_value = "./")]
        output_dir: String,
        #[arg(long, default_value_t = 1)]
        max_runs: u32,
        #[arg(long, default_value_t = 0.5)]
        p: f64,
        #[arg(long, default_value_t = 1.0)]
        alpha: f64,
        #[arg(long, default_value_t = 86400)]
        horizon: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    mobslim::logging::init_logging();
    let args = Args::parse();

    match args.command {
        Command::Run { network, plans, output_dir, max_runs, p, alpha, horizon, seed } => {
            let net = network::io::load(&network)?;
            let (population, raw_routes) = plan::io::load(&plans)?;
            let population = resolve_routes(&net, population, raw_routes);
            let config = Config::builder()
                .network_file(network)
                .plans_file(plans)
                .output_dir(output_dir.clone())
                .max_runs(max_runs)
                .p(p)
                .alpha(alpha)
                .end_time(horizon)
                .build()?;
            run(&net, population, &config, seed)?;
        }
        Command::Grid { size, agents, length, free_speed, flow_capacity, output_dir, max_runs, p, alpha, horizon, seed } => {
            let net = Network::grid(size, length, 1, free_speed, flow_capacity)?;
            let population = corner_to_corner_population(&net, agents, (size as u64 + 1) * (size as u64 + 1) - 1);
            let config = Config::builder()
                .output_dir(output_dir)
                .max_runs(max_runs)
                .p(p)
                .alpha(alpha)
                .end_time(horizon)
                .build()?;
            run(&net, population, &config, seed)?;
        }
        Command::Linear { size, agents, length, free_speed, flow_capacity, output_dir, max_runs, p, alpha, horizon, seed } => {
            let net = Network::linear(size, length, 1, free_speed, flow_capacity)?;
            let population = corner_to_corner_population(&net, agents, size as u64);
            let config = Config::builder()
                .output_dir(output_dir)
                .max_runs(max_runs)
                .p(p)
                .alpha(alpha)
                .end_time(horizon)
                .build()?;
            run(&net, population, &config, seed)?;
        }
    }

    Ok(())
}

/// Resolves the raw external-id routes carried by plans XML into this
/// crate's `RouteEdge` sequences, pre-populating each trip's route so an
/// agent loaded with an already-routed plan does not require an initial
/// planner pass (spec.md §6 "Plans XML").
fn resolve_routes(net: &Network, mut population: Population, raw_routes: Vec<(plan::AgentId, Vec<u64>)>) -> Population {
    use std::collections::HashMap;
    let mut by_agent: HashMap<plan::AgentId, Vec<Vec<u64>>> = HashMap::new();
    for (agent, route) in raw_routes {
        by_agent.entry(agent).or_default().push(route);
    }

    for (agent, routes) in by_agent {
        if let Some(plan) = population.plans.get_mut(&agent) {
            let mut routes = routes.into_iter();
            for trip in plan.trips_mut() {
                let Some(external_ids) = routes.next() else { break };
                trip.route = external_ids
                    .iter()
                    .filter_map(|id| net.edge_by_external_id(*id))
                    .filter_map(|edge| net.edge_attrs(edge).map(|attrs| (edge, attrs)))
                    .map(|(edge, attrs)| plan::RouteEdge {
                        edge,
                        expected_duration: attrs.min_duration as f64,
                        min_duration: attrs.min_duration,
                    })
                    .collect();
            }
        }
    }
    population
}

fn corner_to_corner_population(net: &Network, agents: u64, destination: u64) -> Population {
    use mobslim::network::NodeId;
    use mobslim::plan::{Activity, ActivityKind, Plan, Trip};

    let mut population = Population::new();
    for agent in 0..agents {
        let mut plan = Plan::new();
        plan.push_activity(Activity::new(ActivityKind::Home, NodeId(0), Some(0)));
        plan.push_trip(Trip::unrouted(NodeId(0), NodeId(destination)));
        plan.push_activity(Activity::new(ActivityKind::Work, NodeId(destination), None));
        population.plans.insert(agent, plan);
        let _ = net;
    }
    population
}

fn run(net: &Network, population: Population, config: &Config, seed: u64) -> Result<(), Box<dyn std::error::Error>> {
    let mut expected = ExpectedLinkDurations::new(net, config.alpha)?;
    let planner = Planner::new(config.p, config.end_time)?;
    let optimizer = Optimizer::new(net, config.end_time);
    let mut rng = StdRng::seed_from_u64(seed);

    let (log, reports) = optimizer.run(population, &mut expected, &planner, &mut rng, config.max_runs)?;

    for report in &reports {
        info!(
            iteration = report.iteration,
            mean_trip_duration = report.mean_trip_duration,
            mean_trip_length = report.mean_trip_length,
            mean_link_duration = report.mean_link_duration,
            "iteration report"
        );
    }

    std::fs::create_dir_all(&config.output_dir)?;
    let events_path = std::path::Path::new(&config.output_dir).join("events.csv");
    let mut writer = EventCsvWriter::create(events_path)?;
    writer.add_all(log)?;
    writer.finish()?;

    Ok(())
}
