//! Benchmark group CLI.
//!
//! Examples:
//!   benchmark-group list
//!   benchmark-group materialize admet_group --path data/
//!   benchmark-group evaluate admet_group --predictions preds.json
//!   benchmark-group evaluate admet_group --predictions caco2.json --benchmark Caco2_Wang
//!   benchmark-group summarize admet_group run1.json run2.json run3.json run4.json run5.json

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use benchmark_group::{BenchmarkGroup, Config, LoaderRegistry, Registry};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

#[derive(Parser)]
#[command(name = "benchmark-group")]
#[command(about = "Materialize, iterate and score benchmark dataset groups")]
struct Cli {
    /// Base directory for dataset sources and cached splits [env: BENCH_DATA_ROOT]
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Registry JSON replacing the built-in registry [env: BENCH_REGISTRY]
    #[arg(short, long, global = true)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered groups with their datasets and metrics
    List,
    /// Create and cache the splits of every dataset in a group
    Materialize {
        group: String,
    },
    /// Score predictions against cached test labels
    Evaluate {
        group: String,
        /// JSON object {dataset: [scores]}, or a JSON array with --benchmark
        #[arg(long)]
        predictions: PathBuf,
        /// Score a single dataset
        #[arg(short, long)]
        benchmark: Option<String>,
    },
    /// Mean and std of scores across independent prediction runs
    Summarize {
        group: String,
        /// One JSON object {dataset: [scores]} per run
        #[arg(required = true)]
        runs: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(path) = cli.path {
        config.data_root = path;
    }
    if let Some(registry) = cli.registry {
        config.registry_path = Some(registry);
    }
    let registry = config.load_registry().context("loading registry")?;

    match cli.command {
        Command::List => list(&registry),
        Command::Materialize { group } => {
            let group = open(&group, &config, &registry)?;
            for dataset in group.datasets() {
                println!("{}", group.root().join(dataset).display());
            }
            Ok(())
        }
        Command::Evaluate {
            group,
            predictions,
            benchmark,
        } => {
            let group = open(&group, &config, &registry)?;
            let scores = match benchmark {
                Some(name) => {
                    let pred: Vec<f64> = read_json(&predictions)?;
                    serde_json::to_value(group.evaluate(&pred, &name)?)?
                }
                None => {
                    let preds: BTreeMap<String, Vec<f64>> = read_json(&predictions)?;
                    serde_json::to_value(group.evaluate_all(&preds)?)?
                }
            };
            println!("{}", serde_json::to_string_pretty(&scores)?);
            Ok(())
        }
        Command::Summarize { group, runs } => {
            let group = open(&group, &config, &registry)?;
            let runs = runs
                .iter()
                .map(|path| read_json::<BTreeMap<String, Vec<f64>>>(path))
                .collect::<Result<Vec<_>>>()?;
            let summary = group.evaluate_many(&runs)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

fn open(name: &str, config: &Config, registry: &Registry) -> Result<BenchmarkGroup> {
    BenchmarkGroup::new(name, &config.data_root, registry, &LoaderRegistry::builtin())
        .with_context(|| format!("opening group '{name}' under {}", config.data_root.display()))
}

fn list(registry: &Registry) -> Result<()> {
    for name in registry.group_names() {
        println!("{name}");
        let Some(spec) = registry.group(name) else {
            continue;
        };
        for (task, dataset) in spec.members() {
            let metric = registry.metric(name, dataset).unwrap_or("-");
            println!("  {task:<6} {dataset:<34} {metric}");
        }
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))
}
