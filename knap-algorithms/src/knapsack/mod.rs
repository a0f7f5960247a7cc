pub mod branch_and_bound;
pub mod fptas;
pub mod greedy;

use crate::Interrupt;
use anyhow::{anyhow, Result};
use knap_challenges::knapsack::{Challenge, Solution};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};

pub type SolveChallengeFn =
    fn(&Challenge, &Option<Map<String, Value>>, &Interrupt) -> Result<Solution>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    #[serde(rename = "bnb")]
    BranchAndBound,
    #[serde(rename = "2approx")]
    TwoApprox,
    #[serde(rename = "fptas")]
    Fptas,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [
        Algorithm::BranchAndBound,
        Algorithm::TwoApprox,
        Algorithm::Fptas,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Algorithm::BranchAndBound => "bnb",
            Algorithm::TwoApprox => "2approx",
            Algorithm::Fptas => "fptas",
        }
    }

    pub fn solve_fn(&self) -> SolveChallengeFn {
        match self {
            Algorithm::BranchAndBound => branch_and_bound::solve_challenge,
            Algorithm::TwoApprox => greedy::solve_challenge,
            Algorithm::Fptas => fptas::solve_challenge,
        }
    }

    /// Rejects hyperparameters the solver would refuse, without running it.
    pub fn validate(&self, hyperparameters: &Option<Map<String, Value>>) -> Result<()> {
        match self {
            Algorithm::Fptas => {
                fptas::Params::initialize(hyperparameters)?;
            }
            Algorithm::BranchAndBound | Algorithm::TwoApprox => {}
        }
        Ok(())
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Algorithm {
    type Err = anyhow::Error;

    fn from_str(id: &str) -> Result<Self> {
        Algorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.id() == id)
            .ok_or_else(|| {
                anyhow!(
                    "Unknown algorithm '{}' (expected one of: bnb, 2approx, fptas)",
                    id
                )
            })
    }
}

pub fn get_algorithm(id: &str) -> Option<SolveChallengeFn> {
    id.parse::<Algorithm>().ok().map(|algorithm| algorithm.solve_fn())
}

/// Item indices by descending value density; equal densities keep input order.
pub fn density_order(challenge: &Challenge) -> Vec<usize> {
    let densities: Vec<f64> = challenge.items().map(|item| item.density()).collect();
    let mut order: Vec<usize> = (0..challenge.num_items).collect();
    order.sort_by(|&a, &b| densities[b].total_cmp(&densities[a]));
    order
}
