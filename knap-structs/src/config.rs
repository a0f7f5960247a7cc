use anyhow::{anyhow, Result};
use knap_algorithms::knapsack::{fptas, Algorithm};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::{path::PathBuf, time::Duration};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Wall-clock limit per (algorithm, instance) run
    pub time_limit_secs: u64,
    /// How long a timed-out solver gets to acknowledge its interrupt
    pub grace_secs: u64,
    pub epsilon: f64,
    /// Rerun instances that already have a row in the log
    pub force: bool,
    pub data_dirs: Vec<PathBuf>,
    pub results_dir: PathBuf,
    pub algorithms: Vec<Algorithm>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 600,
            grace_secs: 1,
            epsilon: fptas::DEFAULT_EPSILON,
            force: false,
            data_dirs: vec![PathBuf::from("data")],
            results_dir: PathBuf::from("results"),
            algorithms: Algorithm::ALL.to_vec(),
        }
    }
}

impl BenchmarkConfig {
    pub fn validate(&self) -> Result<()> {
        fptas::Params {
            epsilon: self.epsilon,
        }
        .validate()?;
        if self.time_limit_secs == 0 {
            return Err(anyhow!("time_limit_secs must be positive"));
        }
        if self.algorithms.is_empty() {
            return Err(anyhow!("No algorithms selected"));
        }
        if self.data_dirs.is_empty() {
            return Err(anyhow!("No data directories given"));
        }
        Ok(())
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    /// Hyperparameters handed to every solver. Only the FPTAS reads them.
    pub fn hyperparameters(&self) -> Option<Map<String, Value>> {
        match json!({ "epsilon": self.epsilon }) {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }
}
