//! Tunables for the simulator and the trainer.
//!
//! Everything deserialises from a single JSON document; missing fields fall
//! back to the defaults below, so `{}` is a valid config.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Result, SnakeError};
use crate::pos::Grid;

/// Reward terms of the step function.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub collision: f32,
    pub timeout: f32,
    pub food: f32,
    /// Multiplier of the log-ratio approach term.
    pub approach_scale: f32,
    /// Stalling starts after `stall_factor * length + stall_offset` steps without food.
    pub stall_factor: f32,
    pub stall_offset: f32,
    /// Divided by the snake length before being subtracted.
    pub stall_penalty: f32,
    /// Magnitude of each extremal tail/wall openness adjustment.
    pub openness_bonus: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            collision: -10.0,
            timeout: -20.0,
            food: 10.0,
            approach_scale: 10.0,
            stall_factor: 0.7,
            stall_offset: 10.0,
            stall_penalty: 0.5,
            openness_bonus: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Board width in pixels
    pub width: u32,
    /// Board height in pixels
    pub height: u32,
    pub block_size: u32,
    /// Steps without food after which the episode is cut off.
    pub timeout_steps: u32,
    pub rewards: RewardConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            block_size: 20,
            timeout_steps: 1000,
            rewards: RewardConfig::default(),
        }
    }
}

impl GameConfig {
    /// Board of `rows` x `cols` cells with the default block size.
    pub fn with_cells(rows: u32, cols: u32) -> Self {
        let block_size = GameConfig::default().block_size;
        Self {
            width: cols * block_size,
            height: rows * block_size,
            block_size,
            ..Default::default()
        }
    }

    pub fn grid(&self) -> Grid {
        let block = self.block_size.max(1);
        Grid::new((self.height / block) as i32, (self.width / block) as i32)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(SnakeError::InvalidConfig("block_size must be positive".into()));
        }
        if self.width % self.block_size != 0 || self.height % self.block_size != 0 {
            return Err(SnakeError::InvalidConfig(format!(
                "{}x{} is not a multiple of block size {}",
                self.width, self.height, self.block_size
            )));
        }
        let grid = self.grid();
        // the starting snake is three cells wide, centred
        if grid.cols < 4 || grid.rows < 2 {
            return Err(SnakeError::InvalidConfig(format!(
                "board of {}x{} cells is too small",
                grid.rows, grid.cols
            )));
        }
        if self.timeout_steps == 0 {
            return Err(SnakeError::InvalidConfig("timeout_steps must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Replay memory capacity
    pub max_memory: usize,
    /// Transitions per end-of-episode update
    pub batch_size: usize,
    pub learning_rate: f32,
    pub gamma: f32,
    /// Step size of the tabular policy
    pub alpha: f32,
    /// Exploration starts at `epsilon_base / epsilon_range` and decays by one per game.
    pub epsilon_base: i64,
    pub epsilon_range: i64,
    pub episodes: usize,
    pub seed: Option<u64>,
    /// Frames per second for watched runs; `None` runs unthrottled.
    pub fps: Option<u32>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            max_memory: 100_000,
            batch_size: 1000,
            learning_rate: 0.001,
            gamma: 0.5,
            alpha: 0.4,
            epsilon_base: 80,
            epsilon_range: 200,
            episodes: 250,
            seed: None,
            fps: None,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_memory == 0 {
            return Err(SnakeError::InvalidConfig("max_memory must be positive".into()));
        }
        if self.epsilon_range <= 0 {
            return Err(SnakeError::InvalidConfig("epsilon_range must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub game: GameConfig,
    pub train: TrainConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&text)
            .map_err(|e| SnakeError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        config.game.validate()?;
        config.train.validate()?;
        Ok(config)
    }
}
