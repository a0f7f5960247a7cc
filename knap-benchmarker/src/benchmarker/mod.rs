pub mod discover_instances;
pub mod result_log;
pub mod run_benchmark;
pub mod summarise;

use anyhow::{Context, Result};
use knap_algorithms::knapsack::Algorithm;
use knap_runtime::Harness;
use knap_structs::{
    config::BenchmarkConfig,
    core::{ResultRecord, Status},
};
use log::info;
use serde::Serialize;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

pub const RESULTS_SUFFIX: &str = "_results.csv";

/// The instance set was empty. The process exits with status 2 on this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoInstancesFound {
    pub data_dirs: Vec<PathBuf>,
}

impl fmt::Display for NoInstancesFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dirs: Vec<String> = self
            .data_dirs
            .iter()
            .map(|dir| dir.display().to_string())
            .collect();
        write!(
            f,
            "No instance files found under {}. Did you download the datasets?",
            dirs.join(", ")
        )
    }
}

impl std::error::Error for NoInstancesFound {}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct InstanceFile {
    pub id: String,
    pub path: PathBuf,
}

/// One algorithm and the log its records go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub algorithm: Algorithm,
    pub log_path: PathBuf,
}

impl Task {
    pub fn new(algorithm: Algorithm, results_dir: &Path) -> Self {
        Self {
            algorithm,
            log_path: log_path(results_dir, algorithm.id()),
        }
    }
}

pub fn log_path(results_dir: &Path, algorithm_id: &str) -> PathBuf {
    results_dir.join(format!("{}{}", algorithm_id, RESULTS_SUFFIX))
}

#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub completed: usize,
    pub skipped: usize,
    pub timed_out: usize,
    pub failed: usize,
}

impl RunStats {
    pub fn record(&mut self, record: &ResultRecord) {
        match record.status {
            Status::Feasible(_) => self.completed += 1,
            Status::Timeout => self.timed_out += 1,
            Status::Error(_) => self.failed += 1,
        }
    }

    /// Rows appended across all logs.
    pub fn written(&self) -> usize {
        self.completed + self.timed_out + self.failed
    }
}

/// Runs every configured algorithm over every discovered instance, appending to
/// `<results_dir>/<algorithm>_results.csv` and skipping instances already logged
/// unless `force` is set.
pub fn run(config: &BenchmarkConfig) -> Result<RunStats> {
    config.validate()?;

    let instances = discover_instances::execute(&config.data_dirs)?;
    if instances.is_empty() {
        return Err(NoInstancesFound {
            data_dirs: config.data_dirs.clone(),
        }
        .into());
    }
    info!("found {} instances", instances.len());

    fs::create_dir_all(&config.results_dir).with_context(|| {
        format!(
            "could not create results dir: {}",
            config.results_dir.display()
        )
    })?;

    let harness = Harness::new(config.time_limit(), config.grace());
    let hyperparameters = config.hyperparameters();
    let mut stats = RunStats::default();
    for &algorithm in &config.algorithms {
        let task = Task::new(algorithm, &config.results_dir);
        run_benchmark::execute(
            &harness,
            &task,
            &instances,
            &hyperparameters,
            config.force,
            &mut stats,
        )?;
    }
    info!(
        "benchmark finished: {} written ({} timeouts, {} failures), {} skipped. Results stored under {}",
        stats.written(),
        stats.timed_out,
        stats.failed,
        stats.skipped,
        config.results_dir.display()
    );
    Ok(stats)
}
