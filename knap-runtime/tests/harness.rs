use anyhow::{anyhow, Result};
use knap_algorithms::{knapsack::Algorithm, Interrupt};
use knap_challenges::knapsack::{Challenge, Solution};
use knap_runtime::{run, Harness, Outcome};
use knap_structs::core::{FailureKind, ResultRecord, Status};
use serde_json::{json, Map, Value};
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use test_case::test_case;

fn small_example() -> Arc<Challenge> {
    Arc::new(Challenge::from_pairs(&[(2, 3), (3, 4), (4, 5), (5, 6)], 5))
}

fn quick_harness() -> Harness {
    Harness::new(Duration::from_millis(100), Duration::from_millis(100))
}

fn epsilon(value: f64) -> Option<Map<String, Value>> {
    match json!({ "epsilon": value }) {
        Value::Object(map) => Some(map),
        _ => unreachable!(),
    }
}

fn spins_until_interrupted(
    _: &Challenge,
    _: &Option<Map<String, Value>>,
    interrupt: &Interrupt,
) -> Result<Solution> {
    loop {
        interrupt.check()?;
        thread::sleep(Duration::from_millis(5));
    }
}

fn ignores_interrupt(
    _: &Challenge,
    _: &Option<Map<String, Value>>,
    _: &Interrupt,
) -> Result<Solution> {
    thread::sleep(Duration::from_secs(2));
    Ok(Solution::new())
}

fn panics(_: &Challenge, _: &Option<Map<String, Value>>, _: &Interrupt) -> Result<Solution> {
    let items: Vec<usize> = Vec::new();
    Ok(Solution::from_items(0, vec![items[3]]))
}

fn fails(_: &Challenge, _: &Option<Map<String, Value>>, _: &Interrupt) -> Result<Solution> {
    Err(anyhow!("cannot solve"))
}

fn takes_everything(
    challenge: &Challenge,
    _: &Option<Map<String, Value>>,
    _: &Interrupt,
) -> Result<Solution> {
    let items: Vec<usize> = (0..challenge.num_items).collect();
    Ok(Solution::from_items(challenge.total_value(&items), items))
}

fn allocates(_: &Challenge, _: &Option<Map<String, Value>>, _: &Interrupt) -> Result<Solution> {
    let buffer = std::hint::black_box(vec![1u8; 64 << 20]);
    Ok(Solution::from_items(buffer.len() as u64 / (64 << 20), vec![]))
}

#[test_case(Algorithm::BranchAndBound, 7)]
#[test_case(Algorithm::TwoApprox, 7)]
fn test_success_record(algorithm: Algorithm, profit: u64) {
    let record = run(
        algorithm,
        "example",
        small_example(),
        Duration::from_secs(10),
        &None,
    )
    .unwrap();
    assert_eq!(record.instance, "example");
    assert_eq!(record.profit, Some(profit));
    assert_eq!(record.status, Status::Feasible(true));
    assert!(record.time.unwrap() >= 0.0);
    assert!(record.memory.unwrap() >= 0.0);
}

#[test]
fn test_fptas_record_uses_epsilon() {
    let record = Harness::default()
        .run(Algorithm::Fptas, "example", small_example(), &epsilon(0.5))
        .unwrap();
    assert!(record.profit.unwrap() >= 4);
    assert!(record.is_success());
}

#[test]
fn test_invalid_epsilon_is_rejected_before_running() {
    assert!(run(
        Algorithm::Fptas,
        "example",
        small_example(),
        Duration::from_secs(10),
        &epsilon(1.5),
    )
    .is_err());
}

#[test_case(1e-15; "table too large to allocate")]
#[test_case(1e-300; "scaled values overflow")]
fn test_fptas_table_that_cannot_be_built_is_a_solver_error(tiny: f64) {
    let challenge = Arc::new(Challenge::from_pairs(&[(1, 100), (1, 100)], 2));
    let record = run(
        Algorithm::Fptas,
        "tiny_epsilon",
        challenge,
        Duration::from_secs(5),
        &epsilon(tiny),
    )
    .unwrap();
    assert_eq!(record.status, Status::Error(FailureKind::SolverError));
    assert_eq!(record.profit, None);
}

#[test]
fn test_cooperative_solver_times_out() {
    let start = Instant::now();
    let outcome = quick_harness().execute_with("spin", spins_until_interrupted, small_example(), &None);
    assert_eq!(outcome, Outcome::TimedOut);
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(outcome.into_record("spin"), ResultRecord::timed_out("spin"));
}

#[test]
fn test_stubborn_solver_is_abandoned_after_grace() {
    let start = Instant::now();
    let outcome = quick_harness().execute_with("sleep", ignores_interrupt, small_example(), &None);
    assert_eq!(outcome, Outcome::TimedOut);
    assert!(start.elapsed() < Duration::from_millis(1500));
}

#[test]
fn test_next_run_after_timeout_is_unaffected() {
    let harness = quick_harness();
    let first = harness.execute_with("sleep", ignores_interrupt, small_example(), &None);
    assert_eq!(first, Outcome::TimedOut);

    let second = Harness::new(Duration::from_secs(10), Duration::from_millis(100))
        .run(Algorithm::BranchAndBound, "next", small_example(), &None)
        .unwrap();
    assert_eq!(second.profit, Some(7));
    assert_eq!(second.status, Status::Feasible(true));
}

#[test]
fn test_panic_is_contained() {
    let outcome = quick_harness().execute_with("panic", panics, small_example(), &None);
    assert_eq!(outcome, Outcome::Failed(FailureKind::Panic));
    assert_eq!(
        outcome.into_record("x").to_row()[4],
        "error:Panic".to_string()
    );
}

#[test]
fn test_solver_error_is_contained() {
    let outcome = quick_harness().execute_with("fail", fails, small_example(), &None);
    assert_eq!(outcome, Outcome::Failed(FailureKind::SolverError));
}

#[test]
fn test_infeasible_solution_is_flagged() {
    let outcome = Harness::new(Duration::from_secs(10), Duration::from_millis(100))
        .execute_with("all", takes_everything, small_example(), &None);
    match outcome {
        Outcome::Success {
            feasible, solution, ..
        } => {
            assert!(!feasible);
            assert_eq!(solution.value, 18);
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[test]
fn test_peak_memory_is_measured() {
    let outcome = Harness::new(Duration::from_secs(30), Duration::from_millis(100))
        .execute_with("alloc", allocates, small_example(), &None);
    let record = outcome.into_record("alloc");
    assert_eq!(record.status, Status::Feasible(true));
    assert!(record.memory.unwrap() >= 32.0, "{:?}", record.memory);
}
