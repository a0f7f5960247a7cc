use super::density_order;
use crate::Interrupt;
use anyhow::Result;
use knap_challenges::knapsack::*;
use serde_json::{Map, Value};
use std::{cmp::Ordering, collections::BinaryHeap, rc::Rc};

/// Items chosen along a search path, newest first. Sibling nodes share their common prefix.
struct Taken {
    item: usize,
    parent: Option<Rc<Taken>>,
}

impl Drop for Taken {
    // Unlink iteratively so deep paths do not recurse on drop
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(node) = parent {
            match Rc::try_unwrap(node) {
                Ok(mut node) => parent = node.parent.take(),
                Err(_) => break,
            }
        }
    }
}

struct Node {
    bound: f64,
    seq: u64,
    level: usize,
    profit: u64,
    weight: u64,
    taken: Option<Rc<Taken>>,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Highest bound first, then earliest pushed
        self.bound
            .total_cmp(&other.bound)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for Node {}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

/// Items laid out in density order, so the fractional bound is a single forward scan.
struct Sorted {
    order: Vec<usize>,
    weights: Vec<u64>,
    values: Vec<u64>,
    max_weight: u64,
}

impl Sorted {
    fn new(challenge: &Challenge) -> Self {
        let order = density_order(challenge);
        Self {
            weights: order.iter().map(|&i| challenge.weights[i] as u64).collect(),
            values: order.iter().map(|&i| challenge.values[i] as u64).collect(),
            order,
            max_weight: challenge.max_weight as u64,
        }
    }

    /// Dantzig bound: fill greedily from `level`, then take a fraction of the first item that does not fit.
    fn bound(&self, level: usize, profit: u64, weight: u64) -> f64 {
        let mut remaining = self.max_weight - weight;
        let mut profit_bound = profit as f64;
        for j in level..self.order.len() {
            if self.weights[j] <= remaining {
                remaining -= self.weights[j];
                profit_bound += self.values[j] as f64;
            } else {
                profit_bound +=
                    self.values[j] as f64 * remaining as f64 / self.weights[j] as f64;
                break;
            }
        }
        profit_bound
    }
}

pub fn solve_challenge(
    challenge: &Challenge,
    _hyperparameters: &Option<Map<String, Value>>,
    interrupt: &Interrupt,
) -> Result<Solution> {
    let sorted = Sorted::new(challenge);
    let num_items = sorted.order.len();

    let mut queue = BinaryHeap::new();
    let mut seq = 0u64;
    queue.push(Node {
        bound: sorted.bound(0, 0, 0),
        seq,
        level: 0,
        profit: 0,
        weight: 0,
        taken: None,
    });

    let mut best_value = 0u64;
    let mut best_taken: Option<Rc<Taken>> = None;

    while let Some(node) = queue.pop() {
        interrupt.check()?;
        if node.bound <= best_value as f64 || node.level == num_items {
            continue;
        }
        let level = node.level;

        let weight = node.weight + sorted.weights[level];
        if weight <= sorted.max_weight {
            let profit = node.profit + sorted.values[level];
            let taken = Some(Rc::new(Taken {
                item: sorted.order[level],
                parent: node.taken.clone(),
            }));
            if profit > best_value {
                best_value = profit;
                best_taken = taken.clone();
            }
            let bound = sorted.bound(level + 1, profit, weight);
            if bound > best_value as f64 {
                seq += 1;
                queue.push(Node {
                    bound,
                    seq,
                    level: level + 1,
                    profit,
                    weight,
                    taken,
                });
            }
        }

        let bound = sorted.bound(level + 1, node.profit, node.weight);
        if bound > best_value as f64 {
            seq += 1;
            queue.push(Node {
                bound,
                seq,
                level: level + 1,
                profit: node.profit,
                weight: node.weight,
                taken: node.taken,
            });
        }
    }

    let mut items = Vec::new();
    let mut cursor = best_taken.as_deref();
    while let Some(taken) = cursor {
        items.push(taken.item);
        cursor = taken.parent.as_deref();
    }
    Ok(Solution::from_items(best_value, items))
}
