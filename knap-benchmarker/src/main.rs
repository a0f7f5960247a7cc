use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use knap_algorithms::knapsack::Algorithm;
use knap_benchmarker::benchmarker::{
    self,
    summarise::{self, Reference},
    NoInstancesFound,
};
use knap_structs::config::BenchmarkConfig;
use knap_utils::{init_logger, jsonify, read_json_arg};
use log::LevelFilter;
use std::path::PathBuf;

fn cli() -> Command {
    Command::new("knap-benchmarker")
        .about("Benchmarks knapsack algorithms over a corpus of instances")
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .help("(Optional) Log level (error, warn, info, debug, trace)")
                .global(true)
                .default_value("info")
                .value_parser(value_parser!(LevelFilter)),
        )
        .subcommand(
            Command::new("run")
                .about("Runs every algorithm on every instance not yet in its result log")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .help("(Optional) Config json string or path to json file")
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("data-dir")
                        .long("data-dir")
                        .help("(Optional) Directory to search for instances. Repeatable")
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("results-dir")
                        .long("results-dir")
                        .help("(Optional) Directory holding the result logs")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("algorithm")
                        .long("algorithm")
                        .help("(Optional) Algorithm to run (bnb, 2approx, fptas). Repeatable")
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("epsilon")
                        .long("epsilon")
                        .help("(Optional) FPTAS error parameter in (0, 1)")
                        .value_parser(value_parser!(f64)),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .help("(Optional) Wall-clock limit per run in seconds")
                        .value_parser(value_parser!(u64)),
                )
                .arg(
                    Arg::new("grace")
                        .long("grace")
                        .help("(Optional) Seconds a timed-out solver gets to stop")
                        .value_parser(value_parser!(u64)),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help("(Optional) Rerun instances that already have a logged result")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("summarise")
                .about("Summarises the result logs per algorithm")
                .arg(
                    Arg::new("results-dir")
                        .long("results-dir")
                        .help("(Optional) Directory holding the result logs")
                        .default_value("results")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .help("(Optional) Times above this many seconds count as timeouts")
                        .default_value("600")
                        .value_parser(value_parser!(f64)),
                )
                .arg(
                    Arg::new("optimum")
                        .long("optimum")
                        .help("(Optional) File,Optimum csv of known optima for relative error")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("reference")
                        .long("reference")
                        .help("(Optional) Algorithm whose profits are the relative error reference")
                        .conflicts_with("optimum")
                        .value_parser(value_parser!(String)),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("(Optional) Print the summary as json")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn main() {
    let matches = cli().get_matches();

    let log_level = matches
        .get_one::<LevelFilter>("log-level")
        .copied()
        .unwrap_or(LevelFilter::Info);
    if let Err(e) = init_logger(log_level) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = match matches.subcommand() {
        Some(("run", sub_m)) => run(sub_m),
        Some(("summarise", sub_m)) => print_summary(
            sub_m.get_one::<PathBuf>("results-dir").unwrap().clone(),
            *sub_m.get_one::<f64>("timeout").unwrap(),
            reference(sub_m),
            sub_m.get_flag("json"),
        ),
        _ => Err(anyhow!("Invalid subcommand")),
    } {
        eprintln!("Error: {}", e);
        let code = if e.downcast_ref::<NoInstancesFound>().is_some() {
            2
        } else {
            1
        };
        std::process::exit(code);
    }
}

fn load_config(matches: &ArgMatches) -> Result<BenchmarkConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(arg) => read_json_arg::<BenchmarkConfig>(arg)?,
        None => BenchmarkConfig::default(),
    };
    if let Some(dirs) = matches.get_many::<PathBuf>("data-dir") {
        config.data_dirs = dirs.cloned().collect();
    }
    if let Some(dir) = matches.get_one::<PathBuf>("results-dir") {
        config.results_dir = dir.clone();
    }
    if let Some(ids) = matches.get_many::<String>("algorithm") {
        config.algorithms = ids
            .map(|id| id.parse::<Algorithm>())
            .collect::<Result<Vec<_>>>()?;
    }
    if let Some(epsilon) = matches.get_one::<f64>("epsilon") {
        config.epsilon = *epsilon;
    }
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        config.time_limit_secs = *timeout;
    }
    if let Some(grace) = matches.get_one::<u64>("grace") {
        config.grace_secs = *grace;
    }
    if matches.get_flag("force") {
        config.force = true;
    }
    config.validate()?;
    Ok(config)
}

fn run(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    benchmarker::run(&config)?;
    Ok(())
}

fn reference(matches: &ArgMatches) -> Reference {
    if let Some(path) = matches.get_one::<PathBuf>("optimum") {
        Reference::Optimum(path.clone())
    } else if let Some(id) = matches.get_one::<String>("reference") {
        Reference::Algorithm(id.clone())
    } else {
        Reference::BestSeen
    }
}

fn print_summary(results_dir: PathBuf, timeout: f64, reference: Reference, json: bool) -> Result<()> {
    let summaries = summarise::execute(&results_dir, timeout, &reference)?;
    if json {
        println!("{}", jsonify(&summaries)?);
    } else {
        print!("{}", summarise::render(&summaries));
    }
    Ok(())
}
