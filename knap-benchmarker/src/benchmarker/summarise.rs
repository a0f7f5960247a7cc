use super::{result_log, RESULTS_SUFFIX};
use anyhow::{anyhow, Context, Result};
use knap_challenges::knapsack::instance_name;
use knap_structs::core::ResultRecord;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fmt::Write,
    fs,
    path::{Path, PathBuf},
};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AlgorithmSummary {
    pub algorithm: String,
    /// Distinct instance ids
    pub instances: usize,
    pub runs: usize,
    pub avg_time: Option<f64>,
    pub med_time: Option<f64>,
    pub max_time: Option<f64>,
    /// Share of runs with no time or a time above the limit
    pub timeout_rate: f64,
    /// MiB
    pub avg_mem: Option<f64>,
    pub avg_profit: Option<f64>,
    /// `1 - profit / reference` over runs whose instance has a positive reference profit
    pub avg_rel_error: Option<f64>,
    pub max_rel_error: Option<f64>,
    /// Share of runs that finished with a feasible selection
    pub success_rate: f64,
}

/// Where the per-instance reference profit for relative error comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// Best profit any algorithm logged for the instance
    BestSeen,
    /// Best profit the named algorithm logged for the instance
    Algorithm(String),
    /// `File,Optimum` CSV of known optima
    Optimum(PathBuf),
}

#[derive(Deserialize)]
struct OptimumRow {
    #[serde(rename = "File")]
    file: String,
    #[serde(rename = "Optimum")]
    optimum: f64,
}

/// Reads a `File,Optimum` table. File names are reduced to instance ids.
pub fn load_optimum(path: &Path) -> Result<HashMap<String, f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("could not open optimum table: {}", path.display()))?;
    let mut optima = HashMap::new();
    for row in reader.deserialize::<OptimumRow>() {
        let row = row.with_context(|| format!("could not read optimum table: {}", path.display()))?;
        optima.insert(instance_name(Path::new(&row.file)), row.optimum);
    }
    Ok(optima)
}

fn best_profits<'a>(records: impl Iterator<Item = &'a ResultRecord>) -> HashMap<String, f64> {
    let mut best: HashMap<String, f64> = HashMap::new();
    for record in records {
        if let Some(profit) = record.profit {
            let entry = best.entry(record.instance.clone()).or_insert(0.0);
            *entry = entry.max(profit as f64);
        }
    }
    best
}

/// Summarises every `<algorithm>_results.csv` under `results_dir`, ordered by algorithm.
pub fn execute(
    results_dir: &Path,
    time_limit_secs: f64,
    reference: &Reference,
) -> Result<Vec<AlgorithmSummary>> {
    let mut logs: Vec<(String, PathBuf)> = fs::read_dir(results_dir)
        .with_context(|| format!("could not read results dir: {}", results_dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let algorithm = name.strip_suffix(RESULTS_SUFFIX)?.to_string();
            Some((algorithm, path))
        })
        .collect();
    logs.sort();

    let logs = logs
        .into_iter()
        .map(|(algorithm, path)| Ok((algorithm, result_log::read_records(&path)?)))
        .collect::<Result<Vec<_>>>()?;

    let references = match reference {
        Reference::BestSeen => best_profits(logs.iter().flat_map(|(_, records)| records)),
        Reference::Algorithm(id) => {
            let (_, records) = logs
                .iter()
                .find(|(algorithm, _)| algorithm == id)
                .ok_or_else(|| anyhow!("No result log for reference algorithm '{}'", id))?;
            best_profits(records.iter())
        }
        Reference::Optimum(path) => load_optimum(path)?,
    };

    Ok(logs
        .into_iter()
        .map(|(algorithm, records)| summarise(algorithm, &records, time_limit_secs, &references))
        .collect())
}

pub fn summarise(
    algorithm: String,
    records: &[ResultRecord],
    time_limit_secs: f64,
    references: &HashMap<String, f64>,
) -> AlgorithmSummary {
    let runs = records.len();
    let instances = records
        .iter()
        .map(|r| r.instance.as_str())
        .collect::<HashSet<_>>()
        .len();

    let mut times: Vec<f64> = records
        .iter()
        .filter_map(|r| r.time)
        .filter(|&t| t <= time_limit_secs)
        .collect();
    times.sort_by(|a, b| a.total_cmp(b));

    let memories: Vec<f64> = records.iter().filter_map(|r| r.memory).collect();
    let profits: Vec<f64> = records
        .iter()
        .filter_map(|r| r.profit)
        .map(|p| p as f64)
        .collect();
    let rel_errors: Vec<f64> = records
        .iter()
        .filter_map(|r| {
            let reference = *references.get(&r.instance)?;
            let profit = r.profit? as f64;
            (reference > 0.0).then(|| 1.0 - profit / reference)
        })
        .collect();
    let successes = records.iter().filter(|r| r.is_success()).count();

    AlgorithmSummary {
        algorithm,
        instances,
        runs,
        avg_time: mean(&times),
        med_time: median(&times),
        max_time: times.last().copied(),
        timeout_rate: rate(runs - times.len(), runs),
        avg_mem: mean(&memories),
        avg_profit: mean(&profits),
        avg_rel_error: mean(&rel_errors),
        max_rel_error: rel_errors.iter().copied().reduce(f64::max),
        success_rate: rate(successes, runs),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// `sorted` must be ascending.
fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

pub fn render(summaries: &[AlgorithmSummary]) -> String {
    fn cell(value: Option<f64>) -> String {
        value
            .map(|v| format!("{:.4}", v))
            .unwrap_or_else(|| "-".to_string())
    }
    let mut out = format!(
        "{:<10} {:>9} {:>6} {:>10} {:>10} {:>10} {:>8} {:>10} {:>12} {:>12} {:>12} {:>8}\n",
        "algorithm",
        "instances",
        "runs",
        "avg_time",
        "med_time",
        "max_time",
        "timeout",
        "avg_mem",
        "avg_profit",
        "avg_rel_err",
        "max_rel_err",
        "success"
    );
    for s in summaries {
        let _ = writeln!(
            out,
            "{:<10} {:>9} {:>6} {:>10} {:>10} {:>10} {:>8.4} {:>10} {:>12} {:>12} {:>12} {:>8.4}",
            s.algorithm,
            s.instances,
            s.runs,
            cell(s.avg_time),
            cell(s.med_time),
            cell(s.max_time),
            s.timeout_rate,
            cell(s.avg_mem),
            cell(s.avg_profit),
            cell(s.avg_rel_error),
            cell(s.max_rel_error),
            s.success_rate
        );
    }
    out
}
