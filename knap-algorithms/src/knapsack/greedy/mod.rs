use super::density_order;
use crate::Interrupt;
use anyhow::Result;
use knap_challenges::knapsack::*;
use serde_json::{Map, Value};

/// Density-greedy fill compared against the most valuable single item that fits.
/// Returns at least half the optimum.
pub fn solve_challenge(
    challenge: &Challenge,
    _hyperparameters: &Option<Map<String, Value>>,
    interrupt: &Interrupt,
) -> Result<Solution> {
    interrupt.check()?;
    let max_weight = challenge.max_weight as u64;

    let mut remaining = max_weight;
    let mut greedy_value = 0u64;
    let mut greedy_items = Vec::new();
    for i in density_order(challenge) {
        let weight = challenge.weights[i] as u64;
        // Items that do not fit are passed over, later lighter ones may still fit
        if weight <= remaining {
            remaining -= weight;
            greedy_value += challenge.values[i] as u64;
            greedy_items.push(i);
        }
    }

    let best_single = (0..challenge.num_items)
        .filter(|&i| challenge.weights[i] as u64 <= max_weight)
        .fold(None, |best: Option<usize>, i| match best {
            Some(b) if challenge.values[b] >= challenge.values[i] => Some(b),
            _ => Some(i),
        });

    match best_single {
        Some(i) if challenge.values[i] as u64 > greedy_value => {
            Ok(Solution::from_items(challenge.values[i] as u64, vec![i]))
        }
        _ => Ok(Solution::from_items(greedy_value, greedy_items)),
    }
}
