use anyhow::{anyhow, Result};
use clap::{arg, ArgAction, Command};
use knap_algorithms::knapsack::Algorithm;
use knap_challenges::knapsack::{instance_name, Challenge, Solution};
use knap_runtime::{Harness, Outcome, DEFAULT_GRACE};
use knap_structs::core::{OutputData, Status};
use knap_utils::{compress_obj, init_logger, read_json_arg};
use log::LevelFilter;
use serde_json::{json, Map, Value};
use std::{fs, path::PathBuf, sync::Arc, time::Duration};

fn cli() -> Command {
    Command::new("knap-runtime")
        .about("Computes or verifies knapsack solutions")
        .arg_required_else_help(true)
        .arg(
            arg!(--"log-level" [LEVEL] "Log level (error, warn, info, debug, trace)")
                .global(true)
                .default_value("warn")
                .value_parser(clap::value_parser!(LevelFilter)),
        )
        .subcommand(
            Command::new("compute_solution")
                .about("Runs one algorithm on one instance")
                .arg(
                    arg!(<INSTANCE> "Path to an instance (*_items.csv, *_info.csv or *.txt)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(<ALGORITHM> "Algorithm id (bnb, 2approx or fptas)")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--epsilon [EPSILON] "FPTAS error parameter in (0, 1)")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(--timeout [SECONDS] "Wall-clock limit in seconds")
                        .default_value("600")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(--output [OUTPUT_FILE] "If set, the output data will be saved to this file path (default json)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--compress [COMPRESS] "If output file is set, the output data will be compressed as zlib")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("verify_solution")
                .about("Verifies a solution")
                .arg(
                    arg!(<INSTANCE> "Path to an instance (*_items.csv, *_info.csv or *.txt)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(<SOLUTION> "Solution json string, path to json file, or '-' for stdin")
                        .value_parser(clap::value_parser!(String)),
                ),
        )
}

fn main() {
    let matches = cli().get_matches();

    let log_level = matches
        .get_one::<LevelFilter>("log-level")
        .copied()
        .unwrap_or(LevelFilter::Warn);
    if let Err(e) = init_logger(log_level) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = match matches.subcommand() {
        Some(("compute_solution", sub_m)) => compute_solution(
            sub_m.get_one::<PathBuf>("INSTANCE").unwrap().clone(),
            sub_m.get_one::<String>("ALGORITHM").unwrap().clone(),
            sub_m.get_one::<f64>("epsilon").copied(),
            *sub_m.get_one::<f64>("timeout").unwrap(),
            sub_m.get_one::<PathBuf>("output").cloned(),
            *sub_m.get_one::<bool>("compress").unwrap(),
        ),
        Some(("verify_solution", sub_m)) => verify_solution(
            sub_m.get_one::<PathBuf>("INSTANCE").unwrap().clone(),
            sub_m.get_one::<String>("SOLUTION").unwrap().clone(),
        ),
        _ => Err(anyhow!("Invalid subcommand")),
    } {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

pub fn compute_solution(
    instance_path: PathBuf,
    algorithm: String,
    epsilon: Option<f64>,
    timeout: f64,
    output_file: Option<PathBuf>,
    compress: bool,
) -> Result<()> {
    let algorithm: Algorithm = algorithm.parse()?;
    let hyperparameters = epsilon.and_then(|epsilon| match json!({ "epsilon": epsilon }) {
        Value::Object(map) => Some(map),
        _ => None,
    });
    let deadline = Duration::try_from_secs_f64(timeout)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| anyhow!("Invalid timeout: {}", timeout))?;

    let instance = instance_name(&instance_path);
    let challenge = Arc::new(Challenge::load(&instance_path)?);

    let outcome =
        Harness::new(deadline, DEFAULT_GRACE).execute(algorithm, challenge, &hyperparameters)?;
    let solution = match &outcome {
        Outcome::Success { solution, .. } => match serde_json::to_value(solution)? {
            Value::Object(map) => map,
            _ => Map::new(),
        },
        _ => Map::new(),
    };

    let output_data = OutputData {
        instance: instance.clone(),
        algorithm: algorithm.to_string(),
        record: outcome.into_record(&instance),
        solution,
    };
    if let Some(path) = output_file {
        if compress {
            fs::write(&path, compress_obj(&output_data)?)?;
        } else {
            fs::write(&path, output_data.to_json()?)?;
        }
        println!("output_data written to: {:?}", path);
    } else {
        println!("{}", output_data.to_json()?);
    }
    match output_data.record.status {
        Status::Error(kind) => {
            eprintln!("Runtime error: {}", kind);
            std::process::exit(86);
        }
        Status::Timeout => {
            eprintln!("Timed out after {:?}", deadline);
            std::process::exit(85);
        }
        Status::Feasible(_) => Ok(()),
    }
}

pub fn verify_solution(instance_path: PathBuf, solution: String) -> Result<()> {
    let challenge = Challenge::load(&instance_path)?;
    let solution: Map<String, Value> = read_json_arg(&solution)?;
    let solution = Solution::try_from(solution)
        .map_err(|e| anyhow!("Invalid solution. Cannot convert to knapsack::Solution: {}", e))?;
    let value = challenge
        .evaluate_total_value(&solution)
        .map_err(|e| anyhow!("Invalid solution: {}", e))?;
    println!("Solution is valid (total value {})", value);
    Ok(())
}
