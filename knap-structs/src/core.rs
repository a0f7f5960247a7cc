use anyhow::{anyhow, Result};
use knap_utils::jsonify;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};

/// Placeholder written for fields that have no measurement.
pub const NA: &str = "NA";

pub const HEADER: [&str; 5] = ["instance", "time", "memory", "profit", "status_or_feasible"];

/// Coarse reason a run produced no usable result.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The solver panicked.
    Panic,
    /// The solver returned an error.
    SolverError,
    /// The worker thread went away without reporting.
    Disconnected,
    /// The worker thread could not be started.
    Spawn,
    /// The instance could not be read.
    LoadError,
}

impl FailureKind {
    pub const ALL: [FailureKind; 5] = [
        FailureKind::Panic,
        FailureKind::SolverError,
        FailureKind::Disconnected,
        FailureKind::Spawn,
        FailureKind::LoadError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Panic => "Panic",
            FailureKind::SolverError => "SolverError",
            FailureKind::Disconnected => "Disconnected",
            FailureKind::Spawn => "Spawn",
            FailureKind::LoadError => "LoadError",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        FailureKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| anyhow!("Unknown failure kind '{}'", s))
    }
}

/// The `status_or_feasible` column: `1`/`0` for a finished run, otherwise why it did not finish.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(into = "String", try_from = "String")]
pub enum Status {
    Feasible(bool),
    Timeout,
    Error(FailureKind),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Feasible(true) => f.write_str("1"),
            Status::Feasible(false) => f.write_str("0"),
            Status::Timeout => f.write_str("timeout"),
            Status::Error(kind) => write!(f, "error:{}", kind),
        }
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1" => Ok(Status::Feasible(true)),
            "0" => Ok(Status::Feasible(false)),
            "timeout" => Ok(Status::Timeout),
            _ => match s.strip_prefix("error:") {
                Some(kind) => Ok(Status::Error(kind.parse()?)),
                None => Err(anyhow!("Unknown status '{}'", s)),
            },
        }
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for Status {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// One row of a result log.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub instance: String,
    /// Wall-clock seconds
    pub time: Option<f64>,
    /// Peak MiB allocated during the run
    pub memory: Option<f64>,
    pub profit: Option<u64>,
    pub status: Status,
}

impl ResultRecord {
    pub fn success(instance: &str, time: f64, memory: f64, profit: u64, feasible: bool) -> Self {
        Self {
            instance: instance.to_string(),
            time: Some(time),
            memory: Some(memory),
            profit: Some(profit),
            status: Status::Feasible(feasible),
        }
    }

    pub fn timed_out(instance: &str) -> Self {
        Self::unmeasured(instance, Status::Timeout)
    }

    pub fn failed(instance: &str, kind: FailureKind) -> Self {
        Self::unmeasured(instance, Status::Error(kind))
    }

    fn unmeasured(instance: &str, status: Status) -> Self {
        Self {
            instance: instance.to_string(),
            time: None,
            memory: None,
            profit: None,
            status,
        }
    }

    pub fn to_row(&self) -> [String; 5] {
        fn or_na<T: ToString>(field: &Option<T>) -> String {
            field
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| NA.to_string())
        }
        [
            self.instance.clone(),
            or_na(&self.time),
            or_na(&self.memory),
            or_na(&self.profit),
            self.status.to_string(),
        ]
    }

    pub fn from_row<S: AsRef<str>>(row: &[S]) -> Result<Self> {
        if row.len() != HEADER.len() {
            return Err(anyhow!(
                "Expected {} fields but found {}",
                HEADER.len(),
                row.len()
            ));
        }
        fn parse_or_na<T: FromStr>(raw: &str, name: &str) -> Result<Option<T>> {
            if raw == NA {
                return Ok(None);
            }
            raw.parse::<T>()
                .map(Some)
                .map_err(|_| anyhow!("Invalid {} '{}'", name, raw))
        }
        Ok(Self {
            instance: row[0].as_ref().to_string(),
            time: parse_or_na(row[1].as_ref(), "time")?,
            memory: parse_or_na(row[2].as_ref(), "memory")?,
            profit: parse_or_na(row[3].as_ref(), "profit")?,
            status: row[4].as_ref().parse()?,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Feasible(true)
    }
}

/// What `compute_solution` emits for a single run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OutputData {
    pub instance: String,
    pub algorithm: String,
    pub record: ResultRecord,
    /// The selected items, empty unless the run succeeded
    pub solution: Map<String, Value>,
}

impl OutputData {
    pub fn to_json(&self) -> Result<String> {
        jsonify(self)
    }
}
