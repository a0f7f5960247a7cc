mod loading;
pub use loading::*;
use anyhow::{anyhow, Result};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{from_value, Map, Value};
use std::collections::HashSet;

/// Parameters for a randomly generated instance.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Track {
    pub n_items: usize,
    /// Capacity as a percentage of the total item weight.
    pub budget: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Item {
    pub weight: u32,
    pub value: u32,
}

impl Item {
    pub fn new(weight: u32, value: u32) -> Self {
        Self { weight, value }
    }

    /// Value per unit of weight. Weightless items rank above every weighted one.
    pub fn density(&self) -> f64 {
        if self.weight == 0 {
            f64::INFINITY
        } else {
            self.value as f64 / self.weight as f64
        }
    }
}

/// A set of selected items together with the objective value the solver reports for it.
///
/// For exact and greedy solvers `value` is the true total value of `items`; the
/// FPTAS reports a rescaled approximation.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Solution {
    #[serde(default)]
    pub value: u64,
    pub items: Vec<usize>,
}

impl Solution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a solution with `items` sorted ascending and deduplicated.
    pub fn from_items(value: u64, mut items: Vec<usize>) -> Self {
        items.sort_unstable();
        items.dedup();
        Self { value, items }
    }
}

impl TryFrom<Map<String, Value>> for Solution {
    type Error = serde_json::Error;

    fn try_from(v: Map<String, Value>) -> Result<Self, Self::Error> {
        from_value(Value::Object(v))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub num_items: usize,
    pub weights: Vec<u32>,
    pub values: Vec<u32>,
    pub max_weight: u32,
}

impl Challenge {
    pub fn new(items: &[Item], max_weight: u32) -> Self {
        Self {
            num_items: items.len(),
            weights: items.iter().map(|item| item.weight).collect(),
            values: items.iter().map(|item| item.value).collect(),
            max_weight,
        }
    }

    /// Builds an instance from `(weight, value)` pairs.
    pub fn from_pairs(pairs: &[(u32, u32)], max_weight: u32) -> Self {
        let items: Vec<Item> = pairs.iter().map(|&(w, v)| Item::new(w, v)).collect();
        Self::new(&items, max_weight)
    }

    pub fn item(&self, index: usize) -> Item {
        Item::new(self.weights[index], self.values[index])
    }

    pub fn items(&self) -> impl Iterator<Item = Item> + '_ {
        self.weights
            .iter()
            .zip(&self.values)
            .map(|(&weight, &value)| Item { weight, value })
    }

    pub fn generate_instance(seed: &[u8; 32], track: &Track) -> Result<Self> {
        if track.budget > 100 {
            return Err(anyhow!("Budget ({}) must be at most 100", track.budget));
        }
        let mut rng = SmallRng::from_seed(seed.clone());

        // Weights in [1, 50], values in [1, 100], drawn independently
        let weights: Vec<u32> = (0..track.n_items)
            .map(|_| rng.gen_range(1..=50))
            .collect();
        let values: Vec<u32> = (0..track.n_items)
            .map(|_| rng.gen_range(1..=100))
            .collect();

        let total_weight: u64 = weights.iter().map(|&w| w as u64).sum();
        let max_weight = (total_weight * track.budget as u64 / 100) as u32;

        Ok(Challenge {
            num_items: track.n_items,
            weights,
            values,
            max_weight,
        })
    }

    pub fn total_weight(&self, items: &[usize]) -> u64 {
        items.iter().map(|&i| self.weights[i] as u64).sum()
    }

    pub fn total_value(&self, items: &[usize]) -> u64 {
        items.iter().map(|&i| self.values[i] as u64).sum()
    }

    /// Checks that `solution` is a feasible selection and returns its true total value.
    pub fn evaluate_total_value(&self, solution: &Solution) -> Result<u64> {
        let selected_items: HashSet<usize> = solution.items.iter().cloned().collect();
        if selected_items.len() != solution.items.len() {
            return Err(anyhow!("Duplicate items selected."));
        }
        if let Some(&item) = solution.items.iter().find(|&&i| i >= self.num_items) {
            return Err(anyhow!("Item ({}) is out of bounds", item));
        }

        let total_weight = self.total_weight(&solution.items);
        if total_weight > self.max_weight as u64 {
            return Err(anyhow!(
                "Total weight ({}) exceeded max weight ({})",
                total_weight,
                self.max_weight
            ));
        }
        Ok(self.total_value(&solution.items))
    }

    pub fn verify_solution(&self, solution: &Solution) -> Result<()> {
        self.evaluate_total_value(solution).map(|_| ())
    }
}
