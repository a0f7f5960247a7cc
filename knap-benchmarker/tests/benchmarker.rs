use knap_algorithms::knapsack::Algorithm;
use knap_benchmarker::benchmarker::{
    self, discover_instances, log_path, result_log, result_log::ResultLog, summarise,
    summarise::Reference, NoInstancesFound,
};
use knap_structs::{
    config::BenchmarkConfig,
    core::{FailureKind, ResultRecord, Status},
};
use std::{fs, path::Path};
use tempfile::TempDir;

fn write_pair(dir: &Path, stem: &str, capacity: u32, items: &[(u32, u32)]) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(format!("{}_info.csv", stem)), format!("c,{}\n", capacity)).unwrap();
    let mut rows = String::from("id,value,weight\n");
    for (i, (weight, value)) in items.iter().enumerate() {
        rows.push_str(&format!("{},{},{}\n", i, value, weight));
    }
    fs::write(dir.join(format!("{}_items.csv", stem)), rows).unwrap();
}

fn corpus() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    write_pair(&data, "small", 5, &[(2, 3), (3, 4), (4, 5), (5, 6)]);
    fs::create_dir_all(data.join("low")).unwrap();
    fs::write(data.join("low").join("f1_l-d_kp_4_11.txt"), "4 11\n5 3\n4 4\n6 5\n7 6\n").unwrap();
    tmp
}

fn config(tmp: &TempDir) -> BenchmarkConfig {
    BenchmarkConfig {
        time_limit_secs: 30,
        data_dirs: vec![tmp.path().join("data")],
        results_dir: tmp.path().join("results"),
        algorithms: vec![Algorithm::BranchAndBound, Algorithm::TwoApprox],
        ..BenchmarkConfig::default()
    }
}

fn read_log(config: &BenchmarkConfig, algorithm: Algorithm) -> String {
    fs::read_to_string(log_path(&config.results_dir, algorithm.id())).unwrap()
}

#[test]
fn test_run_writes_one_row_per_instance() {
    let tmp = corpus();
    let config = config(&tmp);
    let stats = benchmarker::run(&config).unwrap();
    assert_eq!(stats.written(), 4);
    assert_eq!(stats.completed, 4);

    let log = read_log(&config, Algorithm::BranchAndBound);
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines[0], "instance,time,memory,profit,status_or_feasible");
    assert_eq!(lines.len(), 3);

    let records = result_log::read_records(&log_path(&config.results_dir, "bnb")).unwrap();
    let small = records.iter().find(|r| r.instance == "small").unwrap();
    assert_eq!(small.profit, Some(7));
    assert_eq!(small.status, Status::Feasible(true));
    let text = records.iter().find(|r| r.instance == "f1_l-d_kp_4_11").unwrap();
    assert_eq!(text.profit, Some(13));
}

#[test]
fn test_rerun_is_idempotent() {
    let tmp = corpus();
    let config = config(&tmp);
    benchmarker::run(&config).unwrap();
    let before = read_log(&config, Algorithm::BranchAndBound);

    let stats = benchmarker::run(&config).unwrap();
    assert_eq!(stats.written(), 0);
    assert_eq!(stats.skipped, 4);
    assert_eq!(read_log(&config, Algorithm::BranchAndBound), before);
}

#[test]
fn test_force_appends_again() {
    let tmp = corpus();
    let mut config = config(&tmp);
    benchmarker::run(&config).unwrap();
    config.force = true;
    let stats = benchmarker::run(&config).unwrap();
    assert_eq!(stats.written(), 4);

    let log = read_log(&config, Algorithm::TwoApprox);
    assert_eq!(log.lines().filter(|l| l.starts_with("small,")).count(), 2);
    assert_eq!(log.lines().filter(|l| l.starts_with("instance,")).count(), 1);
}

#[test]
fn test_new_instances_are_picked_up() {
    let tmp = corpus();
    let config = config(&tmp);
    benchmarker::run(&config).unwrap();
    write_pair(&tmp.path().join("data"), "late", 3, &[(1, 1), (2, 5)]);

    let stats = benchmarker::run(&config).unwrap();
    assert_eq!(stats.written(), 2);
    assert_eq!(stats.skipped, 4);
}

#[test]
fn test_no_instances() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("data")).unwrap();
    let err = benchmarker::run(&config(&tmp)).unwrap_err();
    assert!(err.downcast_ref::<NoInstancesFound>().is_some());
    assert!(!tmp.path().join("results").exists());
}

#[test]
fn test_unreadable_instance_is_logged_and_skipped_over() {
    let tmp = corpus();
    let data = tmp.path().join("data");
    fs::write(data.join("broken_items.csv"), "id,value,weight\n0,abc,1\n").unwrap();
    fs::write(data.join("broken_info.csv"), "c,10\n").unwrap();

    let config = config(&tmp);
    let stats = benchmarker::run(&config).unwrap();
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.completed, 4);

    let records = result_log::read_records(&log_path(&config.results_dir, "bnb")).unwrap();
    let broken = records.iter().find(|r| r.instance == "broken").unwrap();
    assert_eq!(broken, &ResultRecord::failed("broken", FailureKind::LoadError));
    assert!(read_log(&config, Algorithm::BranchAndBound).contains("broken,NA,NA,NA,error:LoadError"));
}

#[test]
fn test_invalid_epsilon_is_a_usage_error() {
    let tmp = corpus();
    let mut config = config(&tmp);
    config.epsilon = 1.5;
    assert!(benchmarker::run(&config).is_err());
    assert!(!config.results_dir.exists());
}

#[test]
fn test_discover_instances() {
    let tmp = corpus();
    let data = tmp.path().join("data");
    fs::write(data.join("notes.md"), "not an instance").unwrap();
    write_pair(&data.join("nested").join("deeper"), "other", 1, &[(1, 1)]);

    let instances =
        discover_instances::execute(&[data.clone(), tmp.path().join("missing")]).unwrap();
    let ids: Vec<&str> = instances.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["f1_l-d_kp_4_11", "other", "small"]);
    assert!(instances
        .iter()
        .all(|i| !i.path.to_string_lossy().ends_with("_info.csv")));
}

#[test]
fn test_header_written_to_empty_log() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bnb_results.csv");
    fs::write(&path, "").unwrap();

    let mut log = ResultLog::open_append(&path).unwrap();
    log.append(&ResultRecord::timed_out("a")).unwrap();
    drop(log);
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "instance,time,memory,profit,status_or_feasible\na,NA,NA,NA,timeout\n"
    );

    let mut log = ResultLog::open_append(&path).unwrap();
    log.append(&ResultRecord::success("b", 0.5, 1.0, 3, true)).unwrap();
    drop(log);
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "instance,time,memory,profit,status_or_feasible\na,NA,NA,NA,timeout\nb,0.5,1,3,1\n"
    );
}

#[test]
fn test_truncated_last_row_is_kept_separate() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bnb_results.csv");
    fs::write(&path, "instance,time,memory,profit,status_or_feasible\na,0.1,0").unwrap();

    let mut log = ResultLog::open_append(&path).unwrap();
    log.append(&ResultRecord::timed_out("b")).unwrap();
    drop(log);

    let completed = result_log::load_completed(&path).unwrap();
    assert!(!completed.contains("a"));
    assert!(completed.contains("b"));
    let records = result_log::read_records(&path).unwrap();
    assert_eq!(records, vec![ResultRecord::timed_out("b")]);
}

#[test]
fn test_instance_with_truncated_row_runs_again() {
    let tmp = corpus();
    let config = config(&tmp);
    let path = log_path(&config.results_dir, "bnb");
    fs::create_dir_all(&config.results_dir).unwrap();
    fs::write(&path, "instance,time,memory,profit,status_or_feasible\nsmall,0.1,0").unwrap();

    benchmarker::run(&config).unwrap();
    let records = result_log::read_records(&path).unwrap();
    assert_eq!(records.iter().filter(|r| r.instance == "small").count(), 1);
    assert_eq!(records.len(), 2);
}

#[test]
fn test_load_completed_missing_log() {
    let tmp = TempDir::new().unwrap();
    assert!(result_log::load_completed(&tmp.path().join("none.csv"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_summarise() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("bnb_results.csv"),
        "instance,time,memory,profit,status_or_feasible\n\
         a,1.0,2.0,10,1\n\
         b,3.0,4.0,20,1\n\
         c,NA,NA,NA,timeout\n\
         d,700.0,1.0,5,1\n",
    )
    .unwrap();
    fs::write(
        tmp.path().join("2approx_results.csv"),
        "instance,time,memory,profit,status_or_feasible\n\
         a,0.5,1.0,8,1\n\
         a,0.5,1.0,8,0\n",
    )
    .unwrap();
    fs::write(tmp.path().join("notes.csv"), "ignored\n").unwrap();

    let summaries = summarise::execute(tmp.path(), 600.0, &Reference::BestSeen).unwrap();
    assert_eq!(summaries.len(), 2);

    let greedy = &summaries[0];
    assert_eq!(greedy.algorithm, "2approx");
    assert_eq!(greedy.instances, 1);
    assert_eq!(greedy.runs, 2);
    assert_eq!(greedy.success_rate, 0.5);
    assert_eq!(greedy.timeout_rate, 0.0);
    assert!((greedy.avg_rel_error.unwrap() - 0.2).abs() < 1e-9);
    assert!((greedy.max_rel_error.unwrap() - 0.2).abs() < 1e-9);

    let exact = &summaries[1];
    assert_eq!(exact.algorithm, "bnb");
    assert_eq!(exact.runs, 4);
    assert_eq!(exact.avg_time, Some(2.0));
    assert_eq!(exact.med_time, Some(2.0));
    assert_eq!(exact.max_time, Some(3.0));
    assert_eq!(exact.timeout_rate, 0.5);
    assert_eq!(exact.avg_mem, Some(7.0 / 3.0));
    assert_eq!(exact.avg_profit, Some(35.0 / 3.0));
    assert_eq!(exact.success_rate, 0.75);
    assert_eq!(exact.avg_rel_error, Some(0.0));
    assert_eq!(exact.max_rel_error, Some(0.0));

    let table = summarise::render(&summaries);
    assert!(table.starts_with("algorithm"));
    assert_eq!(table.lines().count(), 3);

    fs::write(
        tmp.path().join("optima.csv"),
        "File,Optimum\na_items.csv,16\nb.txt,20\n",
    )
    .unwrap();
    let summaries = summarise::execute(
        tmp.path(),
        600.0,
        &Reference::Optimum(tmp.path().join("optima.csv")),
    )
    .unwrap();
    assert_eq!(summaries[0].avg_rel_error, Some(0.5));
    assert_eq!(summaries[1].avg_rel_error, Some(0.1875));
    assert_eq!(summaries[1].max_rel_error, Some(0.375));

    let summaries =
        summarise::execute(tmp.path(), 600.0, &Reference::Algorithm("bnb".to_string())).unwrap();
    assert!((summaries[0].avg_rel_error.unwrap() - 0.2).abs() < 1e-9);
    assert!(summarise::execute(tmp.path(), 600.0, &Reference::Algorithm("dp".to_string())).is_err());
}
