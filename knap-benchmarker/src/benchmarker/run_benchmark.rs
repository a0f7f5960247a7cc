use super::{result_log, result_log::ResultLog, InstanceFile, RunStats, Task};
use anyhow::Result;
use knap_challenges::knapsack::Challenge;
use knap_runtime::Harness;
use knap_structs::core::{FailureKind, ResultRecord, Status};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::{collections::HashSet, sync::Arc};

/// Runs `task.algorithm` over `instances`, one at a time, appending a row per run.
/// Only log I/O errors stop the loop.
pub fn execute(
    harness: &Harness,
    task: &Task,
    instances: &[InstanceFile],
    hyperparameters: &Option<Map<String, Value>>,
    force: bool,
    stats: &mut RunStats,
) -> Result<()> {
    let completed = if force {
        HashSet::new()
    } else {
        result_log::load_completed(&task.log_path)?
    };
    let mut log = ResultLog::open_append(&task.log_path)?;

    for instance in instances {
        if completed.contains(&instance.id) {
            debug!("{}: {} already logged, skipping", task.algorithm, instance.id);
            stats.skipped += 1;
            continue;
        }
        info!("{:<8} <- {}", task.algorithm.id(), instance.path.display());

        let record = match Challenge::load(&instance.path) {
            Ok(challenge) => harness.run(
                task.algorithm,
                &instance.id,
                Arc::new(challenge),
                hyperparameters,
            )?,
            Err(e) => {
                warn!("{}: could not load instance: {:#}", instance.id, e);
                ResultRecord::failed(&instance.id, FailureKind::LoadError)
            }
        };
        match record.status {
            Status::Timeout => warn!(
                "{}: {} timed out after {:?}",
                task.algorithm, instance.id, harness.deadline
            ),
            Status::Error(kind) => warn!("{}: {} failed ({})", task.algorithm, instance.id, kind),
            Status::Feasible(_) => {}
        }
        stats.record(&record);
        log.append(&record)?;
    }
    Ok(())
}
