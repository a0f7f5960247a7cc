use anyhow::Result;
use knap_algorithms::{
    knapsack::{Algorithm, SolveChallengeFn},
    Interrupt, Interrupted,
};
use knap_challenges::knapsack::{Challenge, Solution};
use knap_structs::core::{FailureKind, ResultRecord};
use knap_utils::{bytes_to_mib, PeakScope};
use log::{debug, warn};
use serde_json::{Map, Value};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(600);
pub const DEFAULT_GRACE: Duration = Duration::from_secs(1);

/// How a single solver invocation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        solution: Solution,
        /// Whether the selection fits the capacity without duplicates or bad indices
        feasible: bool,
        elapsed: Duration,
        peak_bytes: usize,
    },
    TimedOut,
    Failed(FailureKind),
}

impl Outcome {
    pub fn into_record(&self, instance: &str) -> ResultRecord {
        match self {
            Outcome::Success {
                solution,
                feasible,
                elapsed,
                peak_bytes,
            } => ResultRecord::success(
                instance,
                elapsed.as_secs_f64(),
                bytes_to_mib(*peak_bytes),
                solution.value,
                *feasible,
            ),
            Outcome::TimedOut => ResultRecord::timed_out(instance),
            Outcome::Failed(kind) => ResultRecord::failed(instance, *kind),
        }
    }
}

/// Raises the interrupt when the invocation ends, however it ends.
struct RaiseOnDrop(Interrupt);

impl Drop for RaiseOnDrop {
    fn drop(&mut self) {
        self.0.raise();
    }
}

type Report = (thread::Result<Result<Solution>>, Duration, usize);

/// Runs solvers one at a time on a worker thread under a wall-clock deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Harness {
    pub deadline: Duration,
    /// Extra time a solver gets to notice its interrupt before it is abandoned
    pub grace: Duration,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(DEFAULT_DEADLINE, DEFAULT_GRACE)
    }
}

impl Harness {
    pub fn new(deadline: Duration, grace: Duration) -> Self {
        Self { deadline, grace }
    }

    /// Checks `hyperparameters` up front, then runs `algorithm`. Only bad
    /// hyperparameters produce an `Err`; everything the solver does ends up in the `Outcome`.
    pub fn execute(
        &self,
        algorithm: Algorithm,
        challenge: Arc<Challenge>,
        hyperparameters: &Option<Map<String, Value>>,
    ) -> Result<Outcome> {
        algorithm.validate(hyperparameters)?;
        Ok(self.execute_with(
            algorithm.id(),
            algorithm.solve_fn(),
            challenge,
            hyperparameters,
        ))
    }

    pub fn execute_with(
        &self,
        name: &str,
        solve_challenge: SolveChallengeFn,
        challenge: Arc<Challenge>,
        hyperparameters: &Option<Map<String, Value>>,
    ) -> Outcome {
        let interrupt = Interrupt::new();
        let _raise_on_exit = RaiseOnDrop(interrupt.clone());
        let (sender, receiver) = mpsc::channel::<Report>();

        let worker = {
            let interrupt = interrupt.clone();
            let challenge = challenge.clone();
            let hyperparameters = hyperparameters.clone();
            thread::Builder::new()
                .name(format!("solver-{}", name))
                .spawn(move || {
                    let scope = PeakScope::start();
                    let start = Instant::now();
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        solve_challenge(&challenge, &hyperparameters, &interrupt)
                    }));
                    let elapsed = start.elapsed();
                    // Receiver is gone once the run was abandoned
                    let _ = sender.send((result, elapsed, scope.peak_bytes()));
                })
        };
        let worker = match worker {
            Ok(handle) => handle,
            Err(e) => {
                warn!("{}: could not start solver thread: {}", name, e);
                return Outcome::Failed(FailureKind::Spawn);
            }
        };

        match receiver.recv_timeout(self.deadline) {
            Ok((result, elapsed, peak_bytes)) => {
                let _ = worker.join();
                self.classify(name, &challenge, result, elapsed, peak_bytes)
            }
            Err(RecvTimeoutError::Timeout) => {
                interrupt.raise();
                match receiver.recv_timeout(self.grace) {
                    Ok(_) => {
                        debug!("{}: stopped after interrupt", name);
                        let _ = worker.join();
                    }
                    Err(_) => warn!(
                        "{}: still running {:?} past its deadline, abandoning it",
                        name, self.grace
                    ),
                }
                Outcome::TimedOut
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("{}: solver thread exited without reporting", name);
                Outcome::Failed(FailureKind::Disconnected)
            }
        }
    }

    fn classify(
        &self,
        name: &str,
        challenge: &Challenge,
        result: thread::Result<Result<Solution>>,
        elapsed: Duration,
        peak_bytes: usize,
    ) -> Outcome {
        match result {
            Ok(Ok(solution)) => {
                let feasible = match challenge.verify_solution(&solution) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("{}: infeasible solution: {}", name, e);
                        false
                    }
                };
                Outcome::Success {
                    solution,
                    feasible,
                    elapsed,
                    peak_bytes,
                }
            }
            Ok(Err(e)) if e.downcast_ref::<Interrupted>().is_some() => Outcome::TimedOut,
            Ok(Err(e)) => {
                warn!("{}: solver error: {}", name, e);
                Outcome::Failed(FailureKind::SolverError)
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!("{}: solver panicked: {}", name, message);
                Outcome::Failed(FailureKind::Panic)
            }
        }
    }

    pub fn run(
        &self,
        algorithm: Algorithm,
        instance: &str,
        challenge: Arc<Challenge>,
        hyperparameters: &Option<Map<String, Value>>,
    ) -> Result<ResultRecord> {
        let outcome = self.execute(algorithm, challenge, hyperparameters)?;
        Ok(outcome.into_record(instance))
    }
}

/// Runs `algorithm` once with the default grace period.
pub fn run(
    algorithm: Algorithm,
    instance: &str,
    challenge: Arc<Challenge>,
    deadline: Duration,
    hyperparameters: &Option<Map<String, Value>>,
) -> Result<ResultRecord> {
    Harness::new(deadline, DEFAULT_GRACE).run(algorithm, instance, challenge, hyperparameters)
}
