//! Training scheduler.
//!
//! Per step: encode, pick an action epsilon-greedily, advance the simulator,
//! re-encode, then
//! - release any delayed food updates whose frame has come,
//! - either update the policy on the new transition right away, or, if the
//!   head landed on food, hold it back until `release_offset(length)` frames
//!   later,
//! - append it to replay memory.
//!
//! At the end of each episode any food updates still waiting are released
//! early, in release order, and then a batch sampled from replay memory is
//! submitted as one update.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::TrainConfig;
use crate::error::Result;
use crate::features::{self, Observation};
use crate::game::{Game, StepOutcome};
use crate::pacing::FramePacer;
use crate::policy::{Policy, argmax};
use crate::pos::Action;
use crate::replay::{ReplayMemory, Transition};

/// Frames a food transition waits before its single-sample update.
pub fn release_offset(length: usize) -> u64 {
    if length <= 10 { 6 } else { (0.6 * length as f64 + 2.0).floor() as u64 }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepReport {
    pub transition: Transition,
    pub outcome: StepOutcome,
    /// Frame at which this transition's delayed update fires, if it was held back.
    pub scheduled_for: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub episodes: usize,
    pub record: usize,
    pub mean_score: f64,
    pub max_steps: u64,
    pub mean_steps: f64,
    pub scores: Vec<usize>,
}

pub struct Agent<P: Policy> {
    policy: P,
    memory: ReplayMemory,
    config: TrainConfig,
    rng: SmallRng,
    /// Delayed food updates keyed by release frame.
    pending: BTreeMap<u64, Vec<Transition>>,
    pub n_games: usize,
    pub record: usize,
    total_score: usize,
    scores: Vec<usize>,
}

impl<P: Policy> Agent<P> {
    pub fn new(policy: P, config: TrainConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            policy,
            memory: ReplayMemory::new(config.max_memory),
            config,
            rng: SmallRng::seed_from_u64(seed),
            pending: BTreeMap::new(),
            n_games: 0,
            record: 0,
            total_score: 0,
            scores: Vec::new(),
        })
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn memory(&self) -> &ReplayMemory {
        &self.memory
    }

    pub fn pending_updates(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Exploration threshold out of `epsilon_range`; reaches zero after
    /// `epsilon_base` games.
    pub fn epsilon(&self) -> i64 {
        (self.config.epsilon_base - self.n_games as i64).max(0)
    }

    pub fn select_action(&mut self, state: &Observation) -> Result<Action> {
        let draw = self.rng.gen_range(0..self.config.epsilon_range);
        if draw < self.epsilon() {
            let i = self.rng.gen_range(0..Action::ALL.len());
            return Ok(Action::ALL[i]);
        }
        let scores = self.policy.predict(state)?;
        Ok(Action::ALL[argmax(&scores)])
    }

    /// One simulator step with a policy-chosen action.
    pub fn train_step(&mut self, game: &mut Game) -> Result<StepReport> {
        let state = features::encode(game);
        let action = self.select_action(&state)?;
        self.step_with(game, state, action)
    }

    /// One simulator step with a given action. Ends the episode (long update,
    /// reset) when the step is terminal.
    pub fn step_with(&mut self, game: &mut Game, state: Observation, action: Action) -> Result<StepReport> {
        let outcome = game.step(action);
        let next_state = features::encode(game);
        let transition = Transition { state, action, reward: outcome.reward, next_state, done: outcome.done };

        let frame = game.frames.steps_this_episode;
        self.release_due(frame)?;

        let mut scheduled_for = None;
        if outcome.ate_food {
            let release = frame + release_offset(game.snake.len());
            self.pending.entry(release).or_default().push(transition);
            scheduled_for = Some(release);
        } else {
            self.policy.update_one(&transition)?;
        }

        self.memory.push(transition);

        if outcome.done {
            self.finish_episode(game, outcome.score)?;
        }
        Ok(StepReport { transition, outcome, scheduled_for })
    }

    fn release_due(&mut self, frame: u64) -> Result<()> {
        let later = self.pending.split_off(&(frame + 1));
        let due = std::mem::replace(&mut self.pending, later);
        for (release, batch) in due {
            for t in batch {
                tracing::debug!("Delayed update due at frame {} released at {}", release, frame);
                self.policy.update_one(&t)?;
            }
        }
        Ok(())
    }

    fn finish_episode(&mut self, game: &mut Game, score: usize) -> Result<()> {
        let early = self.pending_updates();
        if early > 0 {
            tracing::debug!("Episode ended with {} delayed updates pending; releasing them now", early);
        }
        for (_, batch) in std::mem::take(&mut self.pending) {
            for t in batch {
                self.policy.update_one(&t)?;
            }
        }

        let steps = game.frames.steps_this_episode;
        game.reset()?;
        self.n_games += 1;
        self.train_long_memory()?;

        self.record = self.record.max(score);
        self.total_score += score;
        self.scores.push(score);
        tracing::info!(
            "Game {} Score {} Record {} Steps {} Epsilon {}",
            self.n_games,
            score,
            self.record,
            steps,
            self.epsilon()
        );
        Ok(())
    }

    pub fn train_long_memory(&mut self) -> Result<()> {
        let batch = self.memory.sample(self.config.batch_size, &mut self.rng);
        if batch.is_empty() {
            return Ok(());
        }
        self.policy.update(&batch)
    }

    /// Plays `episodes` complete episodes.
    pub fn run(&mut self, game: &mut Game, episodes: usize, pacer: &mut FramePacer) -> Result<TrainingSummary> {
        let target = self.n_games + episodes;
        while self.n_games < target {
            self.train_step(game)?;
            pacer.wait();
        }
        Ok(self.summary(game))
    }

    pub fn summary(&self, game: &Game) -> TrainingSummary {
        let games = self.n_games.max(1) as f64;
        TrainingSummary {
            episodes: self.n_games,
            record: self.record,
            mean_score: self.total_score as f64 / games,
            max_steps: game.frames.max_steps,
            mean_steps: game.frames.total_steps as f64 / games,
            scores: self.scores.clone(),
        }
    }
}
