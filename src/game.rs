use crate::config::{GameConfig, RewardConfig};
use crate::error::{Result, SnakeError};
use crate::features::{self, Observation};
use crate::pos::{Action, Dir, Grid, Pos};
use crate::spatial::SpatialScoreTable;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::Arc;

/// Step counters. `total_steps` and `max_steps` survive `reset`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frames {
    pub steps_this_episode: u64,
    pub steps_since_food: u64,
    pub total_steps: u64,
    pub max_steps: u64,
}

/// Bookkeeping updated on every collision check. Nothing reads it back into
/// the reward; it is kept for parity runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollisionMemory {
    pub last_frame: u64,
    pub prior_frame: u64,
    pub predicted_gap: i64,
    pub deferred: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpisodeEnd {
    Collision,
    Timeout,
    /// The snake filled the board; no free cell for food.
    BoardCleared,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub reward: f32,
    pub done: bool,
    pub score: usize,
    /// The head landed on food this step (base term, before any shaping).
    pub ate_food: bool,
    pub end: Option<EpisodeEnd>,
}

/// Openness of one candidate heading, taken before the move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub dir: Dir,
    pub tail: i64,
    pub wall: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Openness {
    pub candidates: Vec<Candidate>,
}

impl Openness {
    pub fn tail_range(&self) -> Option<(i64, i64)> {
        let min = self.candidates.iter().map(|c| c.tail).min()?;
        let max = self.candidates.iter().map(|c| c.tail).max()?;
        Some((min, max))
    }

    pub fn wall_range(&self) -> Option<(i32, i32)> {
        let min = self.candidates.iter().map(|c| c.wall).min()?;
        let max = self.candidates.iter().map(|c| c.wall).max()?;
        Some((min, max))
    }

    /// Extremal adjustment for having taken `dir`: minus `bonus` for matching
    /// the minimum, plus `bonus` for matching the maximum, separately for the
    /// tail and the wall rating.
    pub fn bonus(&self, dir: Dir, bonus: f32) -> f32 {
        let (Some(taken), Some((tmin, tmax)), Some((wmin, wmax))) = (
            self.candidates.iter().find(|c| c.dir == dir),
            self.tail_range(),
            self.wall_range(),
        ) else {
            return 0.0;
        };
        let mut r = 0.0;
        if taken.tail == tmin {
            r -= bonus;
        }
        if taken.tail == tmax {
            r += bonus;
        }
        if taken.wall == wmin {
            r -= bonus;
        }
        if taken.wall == wmax {
            r += bonus;
        }
        r
    }
}

#[derive(Clone)]
pub struct Game {
    table: Arc<SpatialScoreTable>,
    grid: Grid,
    block_size: f32,
    timeout_steps: u64,
    rewards: RewardConfig,
    rng: SmallRng,
    /// Head first.
    pub snake: VecDeque<Pos>,
    pub dir: Dir,
    pub food: Pos,
    pub alive: bool,
    pub score: usize,
    pub frames: Frames,
    pub collisions: CollisionMemory,
}

impl Game {
    pub fn new(config: &GameConfig, table: Arc<SpatialScoreTable>, seed: u64) -> Result<Self> {
        config.validate()?;
        let grid = config.grid();
        if table.grid() != grid {
            return Err(SnakeError::GridMismatch {
                expected: (grid.rows, grid.cols),
                found: (table.grid().rows, table.grid().cols),
            });
        }

        let mut g = Self {
            table,
            grid,
            block_size: config.block_size as f32,
            timeout_steps: config.timeout_steps as u64,
            rewards: config.rewards.clone(),
            rng: SmallRng::seed_from_u64(seed),
            snake: VecDeque::new(),
            dir: Dir::Right,
            food: Pos::new(0, 0),
            alive: true,
            score: 0,
            frames: Frames::default(),
            collisions: CollisionMemory::default(),
        };
        g.reset()?;
        Ok(g)
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn head(&self) -> Pos {
        self.snake[0]
    }

    /// Starts a fresh episode: centred length-3 snake heading right, new food,
    /// counters cleared. Running totals absorb the finished episode.
    pub fn reset(&mut self) -> Result<Observation> {
        let start = Pos::new(self.grid.rows / 2, self.grid.cols / 2);
        self.snake.clear();
        self.snake.push_back(start);
        self.snake.push_back(Pos::new(start.row, start.col - 1));
        self.snake.push_back(Pos::new(start.row, start.col - 2));
        self.dir = Dir::Right;
        self.alive = true;
        self.score = 0;

        let frames = &mut self.frames;
        frames.max_steps = frames.max_steps.max(frames.steps_this_episode);
        frames.total_steps += frames.steps_this_episode;
        frames.steps_this_episode = 0;
        frames.steps_since_food = 0;
        self.collisions = CollisionMemory::default();

        self.place_food()?;
        Ok(features::encode(self))
    }

    /// Uniform rejection sampling over the board. Fails instead of spinning
    /// when the snake covers every cell.
    pub fn place_food(&mut self) -> Result<()> {
        if self.snake.len() >= self.grid.area() {
            return Err(SnakeError::BoardFull);
        }
        loop {
            let p = Pos::new(
                self.rng.gen_range(0..self.grid.rows),
                self.rng.gen_range(0..self.grid.cols),
            );
            if !self.snake_contains(p) {
                self.food = p;
                return Ok(());
            }
        }
    }

    pub fn snake_contains(&self, p: Pos) -> bool {
        self.snake.iter().any(|&s| s == p)
    }

    /// Off the board or on the body. Pure; used by the featurizer.
    pub fn is_blocked(&self, p: Pos) -> bool {
        !self.grid.contains(p) || self.snake_contains(p)
    }

    /// Rates every heading available from the current head, except the one
    /// pointing back into the neck, using the spatial table.
    pub fn openness(&self) -> Openness {
        let head = self.head();
        let neck = self.snake.get(1).copied();
        let candidates = Dir::ALL
            .into_iter()
            .filter(|&d| Some(head.step(d)) != neck)
            .filter_map(|d| {
                let entry = self.table.get(head, d)?;
                Some(Candidate { dir: d, tail: entry.tail_rating(&self.snake), wall: entry.min_to_wall })
            })
            .collect();
        Openness { candidates }
    }

    pub fn step(&mut self, action: Action) -> StepOutcome {
        self.frames.steps_this_episode += 1;
        self.frames.steps_since_food += 1;

        let openness = self.openness();

        let old_head = self.head();
        self.dir = action.apply(self.dir);
        let new_head = old_head.step(self.dir);
        self.snake.push_front(new_head);

        if self.check_collision(new_head) {
            self.alive = false;
            return self.finish(self.rewards.collision, false, EpisodeEnd::Collision);
        }

        let len = self.snake.len() as f32;
        let mut reward = 0.0;
        let stall_after = self.rewards.stall_factor * len + self.rewards.stall_offset;
        if self.frames.steps_since_food as f32 > stall_after {
            reward -= self.rewards.stall_penalty / len;
        }

        if self.frames.steps_since_food >= self.timeout_steps {
            self.alive = false;
            return self.finish(reward + self.rewards.timeout, false, EpisodeEnd::Timeout);
        }

        let mut ate_food = false;
        if new_head == self.food {
            ate_food = true;
            self.score += 1;
            self.frames.steps_since_food = 0;
            reward += self.rewards.food;
            if let Err(SnakeError::BoardFull) = self.place_food() {
                tracing::warn!("Board cleared at score {}", self.score);
                self.alive = false;
                return self.finish(reward, true, EpisodeEnd::BoardCleared);
            }
        } else {
            reward += self.approach_reward(old_head, new_head);
            self.snake.pop_back();
        }

        reward += openness.bonus(self.dir, self.rewards.openness_bonus);

        StepOutcome { reward, done: false, score: self.score, ate_food, end: None }
    }

    /// `scale * log_L((L + d_old) / (L + d_new))`, distances in pixels.
    /// Skipped for L < 2 where the base is degenerate.
    fn approach_reward(&self, old_head: Pos, new_head: Pos) -> f32 {
        let len = self.snake.len() as f32;
        if len < 2.0 {
            return 0.0;
        }
        let d_old = old_head.distance(self.food) * self.block_size;
        let d_new = new_head.distance(self.food) * self.block_size;
        self.rewards.approach_scale * ((len + d_old) / (len + d_new)).log(len)
    }

    /// `head` has already been pushed; the body check skips it.
    fn check_collision(&mut self, head: Pos) -> bool {
        let frame = self.frames.steps_this_episode;
        let mem = &mut self.collisions;
        let horizon = frame as i64 + mem.predicted_gap;
        mem.deferred = mem.last_frame as i64 <= horizon && mem.predicted_gap > 0 && !mem.deferred;

        let hit = !self.grid.contains(head) || self.snake.iter().skip(1).any(|&s| s == head);
        if hit {
            mem.prior_frame = mem.last_frame;
            mem.last_frame = frame;
            if mem.prior_frame != 0 && mem.last_frame != 0 {
                let gap = mem.last_frame as i64 - mem.prior_frame as i64;
                mem.predicted_gap = self.snake.len() as i64 - gap + 1;
            }
        }
        hit
    }

    fn finish(&self, reward: f32, ate_food: bool, end: EpisodeEnd) -> StepOutcome {
        StepOutcome { reward, done: true, score: self.score, ate_food, end: Some(end) }
    }
}
