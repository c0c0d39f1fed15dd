use ahash::AHashMap;

use crate::error::Result;
use crate::features::Observation;
use crate::pos::ACTIONS;
use crate::replay::Transition;

/// The learner behind the training loop. Errors are fatal to the run.
pub trait Policy {
    /// Per-action scores, indexed like `Action::ALL`.
    fn predict(&mut self, state: &Observation) -> Result<[f32; ACTIONS]>;

    fn update(&mut self, batch: &[Transition]) -> Result<()>;

    fn update_one(&mut self, t: &Transition) -> Result<()> {
        self.update(std::slice::from_ref(t))
    }
}

/// First index wins ties.
pub fn argmax(scores: &[f32; ACTIONS]) -> usize {
    let mut best = 0;
    for i in 1..ACTIONS {
        if scores[i] > scores[best] {
            best = i;
        }
    }
    best
}

/// Tabular Q-learning over the 2^11 observation keys.
#[derive(Clone, Debug)]
pub struct QTablePolicy {
    q: AHashMap<u16, [f32; ACTIONS]>,
    alpha: f32,
    gamma: f32,
}

impl QTablePolicy {
    pub fn new(alpha: f32, gamma: f32) -> Self {
        Self { q: AHashMap::new(), alpha, gamma }
    }

    pub fn states_seen(&self) -> usize {
        self.q.len()
    }

    fn get_qs(&mut self, s: u16) -> &mut [f32; ACTIONS] {
        self.q.entry(s).or_insert([0.0; ACTIONS])
    }

    fn learn(&mut self, t: &Transition) {
        let next_max = if t.done {
            0.0
        } else {
            let nqs = self.q.get(&t.next_state.key()).copied().unwrap_or([0.0; ACTIONS]);
            nqs.into_iter().fold(f32::NEG_INFINITY, f32::max)
        };
        let alpha = self.alpha;
        let td_target = t.reward + self.gamma * next_max;
        let qsa = &mut self.get_qs(t.state.key())[t.action.index()];
        *qsa += alpha * (td_target - *qsa);
    }
}

impl Policy for QTablePolicy {
    fn predict(&mut self, state: &Observation) -> Result<[f32; ACTIONS]> {
        Ok(self.q.get(&state.key()).copied().unwrap_or([0.0; ACTIONS]))
    }

    fn update(&mut self, batch: &[Transition]) -> Result<()> {
        for t in batch {
            self.learn(t);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::Action;

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[1.0, 1.0, 0.5]), 0);
        assert_eq!(argmax(&[0.0, 2.0, 2.0]), 1);
        assert_eq!(argmax(&[0.0, 0.0, 3.0]), 2);
    }

    #[test]
    fn td_update_moves_towards_reward() {
        let mut p = QTablePolicy::new(0.5, 0.9);
        let mut flags = [false; 11];
        flags[4] = true;
        let s = Observation(flags);
        let t = Transition { state: s, action: Action::Right, reward: 10.0, next_state: s, done: true };
        p.update_one(&t).unwrap();
        assert_eq!(p.predict(&s).unwrap(), [0.0, 5.0, 0.0]);
        p.update(&[t, t]).unwrap();
        assert_eq!(p.predict(&s).unwrap()[1], 8.75);
        assert_eq!(p.states_seen(), 1);
    }
}
