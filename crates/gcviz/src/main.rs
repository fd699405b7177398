//! gcviz: collector simulation front end
//!
//! Builds a simulator from a config file, runs collector simulations and
//! prints the results as JSON on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use gcviz_sim::{GcSimulator, SimulationParameters, SimulatorConfig};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn cli() -> Command {
    Command::new("gcviz")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run reference-counting and mark-and-sweep collector simulations")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Simulator config (.toml or .json)"),
        )
        .subcommand(
            Command::new("run")
                .about("Run both collectors for one scenario")
                .arg(
                    Arg::new("scenario")
                        .long("scenario")
                        .default_value("basic")
                        .help("Scenario identifier"),
                )
                .arg(
                    Arg::new("heap-size")
                        .long("heap-size")
                        .value_parser(value_parser!(u64))
                        .help("Heap capacity in bytes"),
                )
                .arg(
                    Arg::new("objects")
                        .long("objects")
                        .value_parser(value_parser!(u64))
                        .help("Number of objects to allocate"),
                )
                .arg(
                    Arg::new("object-size")
                        .long("object-size")
                        .value_parser(value_parser!(u64))
                        .help("Size of each object in bytes"),
                ),
        )
        .subcommand(
            Command::new("sweep").about("Run every configured scenario with default parameters"),
        )
        .subcommand(Command::new("scenarios").about("Show scenarios, defaults and limits"))
}

fn load_config(matches: &ArgMatches) -> Result<SimulatorConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => SimulatorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(SimulatorConfig::default()),
    }
}

fn request_from(matches: &ArgMatches, config: &SimulatorConfig) -> SimulationParameters {
    let defaults = &config.defaults;
    let scenario = matches
        .get_one::<String>("scenario")
        .cloned()
        .unwrap_or_else(|| "basic".to_string());

    SimulationParameters::new(
        matches.get_one::<u64>("heap-size").copied().unwrap_or(defaults.heap_size),
        matches.get_one::<u64>("objects").copied().unwrap_or(defaults.num_objects),
        matches.get_one::<u64>("object-size").copied().unwrap_or(defaults.object_size),
        scenario,
    )
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("run", sub)) => {
            let params = request_from(sub, &config);
            config.check_request(&params)?;

            let simulator = GcSimulator::new(config);
            let (rc, ms) = simulator.run(params.clone()).await;
            print_json(&json!({
                "success": true,
                "parameters": params,
                "rc": rc,
                "ms": ms,
            }))?;
        }
        Some(("sweep", _)) => {
            let scenarios: Vec<String> = config.scenarios.keys().cloned().collect();
            let simulator = GcSimulator::new(config);
            for scenario in scenarios {
                let params = simulator.config().default_request(scenario);
                simulator.run(params).await;
            }
            let history = simulator.get_history().await;
            info!("Sweep finished: {} runs", history.len());
            print_json(&json!({
                "success": true,
                "history": history,
                "total": history.len(),
            }))?;
        }
        Some(("scenarios", _)) => {
            print_json(&json!({
                "scenarios": config.scenarios,
                "defaults": config.defaults,
                "limits": config.limits,
            }))?;
        }
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}
