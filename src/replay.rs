use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::features::Observation;
use crate::pos::Action;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: Observation,
    pub action: Action,
    pub reward: f32,
    pub next_state: Observation,
    pub done: bool,
}

/// Fixed-capacity FIFO of transitions. Once full, each push overwrites the
/// oldest entry regardless of its reward.
pub struct ReplayMemory {
    items: Vec<Transition>,
    cap: usize,
    idx: usize,
    full: bool,
}

impl ReplayMemory {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self { items: Vec::with_capacity(cap.min(1 << 16)), cap, idx: 0, full: false }
    }

    pub fn push(&mut self, t: Transition) {
        if self.full {
            self.items[self.idx] = t;
        } else {
            self.items.push(t);
            if self.items.len() == self.cap {
                self.full = true;
            }
        }
        self.idx = (self.idx + 1) % self.cap;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        let split = if self.full { self.idx } else { 0 };
        self.items[split..].iter().chain(self.items[..split].iter())
    }

    /// `k` distinct transitions drawn uniformly, or everything when fewer
    /// than `k` are stored.
    pub fn sample<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> Vec<Transition> {
        if self.items.len() < k {
            return self.iter().copied().collect();
        }
        self.items.choose_multiple(rng, k).copied().collect()
    }
}
