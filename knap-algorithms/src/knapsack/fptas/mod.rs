mod params;
pub use params::*;

use crate::Interrupt;
use anyhow::{anyhow, Result};
use knap_challenges::knapsack::*;
use serde_json::{Map, Value};

const CELLS_PER_CHECK: usize = 4096;

pub fn solve_challenge(
    challenge: &Challenge,
    hyperparameters: &Option<Map<String, Value>>,
    interrupt: &Interrupt,
) -> Result<Solution> {
    let params = Params::initialize(hyperparameters)?;
    solve(challenge, params.epsilon, interrupt)
}

/// Scaled value `floor(value / mu)`.
pub fn scale_value(value: u32, mu: f64) -> usize {
    (value as f64 / mu).floor() as usize
}

/// One row of "item taken at this scaled value" flags per contributing item, packed into a single bitset.
struct TakenBits {
    words: Vec<u64>,
}

/// `vec![value; len]` that reports a failed allocation instead of aborting.
fn try_filled<T: Clone>(len: usize, value: T, what: &str) -> Result<Vec<T>> {
    let mut table = Vec::new();
    table
        .try_reserve_exact(len)
        .map_err(|_| anyhow!("{} of {} entries does not fit in memory", what, len))?;
    table.resize(len, value);
    Ok(table)
}

impl TakenBits {
    fn with_len(bits: usize) -> Result<Self> {
        let words = try_filled(bits.div_ceil(64), 0u64, "Reconstruction table")?;
        Ok(Self { words })
    }

    fn set(&mut self, bit: usize) {
        self.words[bit / 64] |= 1u64 << (bit % 64);
    }

    fn get(&self, bit: usize) -> bool {
        self.words[bit / 64] & (1u64 << (bit % 64)) != 0
    }
}

/// Value-scaled min-weight DP. The true value of the returned items is at least
/// `(1 - epsilon)` of the optimum; `Solution::value` is the scaled total mapped back.
pub fn solve(challenge: &Challenge, epsilon: f64, interrupt: &Interrupt) -> Result<Solution> {
    Params { epsilon }.validate()?;

    let num_items = challenge.num_items;
    let max_weight = challenge.max_weight as u64;
    let fits = |i: usize| challenge.weights[i] as u64 <= max_weight;

    // Items heavier than the capacity never enter a feasible set, so they do not set the scale
    let vmax = (0..num_items)
        .filter(|&i| fits(i))
        .map(|i| challenge.values[i])
        .max()
        .unwrap_or(0);
    if num_items == 0 || vmax == 0 {
        return Ok(Solution::new());
    }
    let mu = epsilon * vmax as f64 / num_items as f64;

    // (item, scaled value) for items that fit and scale to something
    let contributing: Vec<(usize, usize)> = (0..num_items)
        .filter(|&i| fits(i))
        .map(|i| (i, scale_value(challenge.values[i], mu)))
        .filter(|&(_, scaled)| scaled > 0)
        .collect();

    // Row k spans scaled values 0..=reach[k]
    let mut reach = Vec::with_capacity(contributing.len());
    let mut offsets = Vec::with_capacity(contributing.len());
    let mut total_bits = 0usize;
    let mut top = 0usize;
    for &(_, scaled) in &contributing {
        top = top
            .checked_add(scaled)
            .ok_or_else(|| anyhow!("Scaled value total overflows"))?;
        reach.push(top);
        offsets.push(total_bits);
        total_bits = top
            .checked_add(1)
            .and_then(|row| total_bits.checked_add(row))
            .ok_or_else(|| anyhow!("Reconstruction table size overflows"))?;
    }
    let value_sum = top;

    let mut taken = TakenBits::with_len(total_bits)?;
    let unreachable = max_weight + 1;
    let dp_len = value_sum
        .checked_add(1)
        .ok_or_else(|| anyhow!("Scaled value total overflows"))?;
    let mut dp = try_filled(dp_len, unreachable, "Value table")?;
    dp[0] = 0;

    let mut cells = 0usize;
    for (k, &(i, scaled)) in contributing.iter().enumerate() {
        interrupt.check()?;
        let weight = challenge.weights[i] as u64;
        // Descending x keeps each item to a single use
        for x in (scaled..=reach[k]).rev() {
            cells += 1;
            if cells % CELLS_PER_CHECK == 0 {
                interrupt.check()?;
            }
            let previous = dp[x - scaled];
            if previous == unreachable {
                continue;
            }
            let candidate = previous + weight;
            if candidate <= max_weight && candidate < dp[x] {
                dp[x] = candidate;
                taken.set(offsets[k] + x);
            }
        }
    }

    let best = (0..=value_sum)
        .rev()
        .find(|&x| dp[x] <= max_weight)
        .unwrap_or(0);

    let mut items = Vec::new();
    let mut x = best;
    for (k, &(i, scaled)) in contributing.iter().enumerate().rev() {
        if x <= reach[k] && taken.get(offsets[k] + x) {
            items.push(i);
            x -= scaled;
        }
    }

    let value = (best as f64 * mu).round() as u64;
    Ok(Solution::from_items(value, items))
}
