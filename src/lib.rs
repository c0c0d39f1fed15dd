//! Snake self-play trainer with openness-shaped rewards.
//!
//! The spatial score table is precomputed once (see [`spatial`]) and shared
//! read-only by every [`game::Game`]. [`agent::Agent`] drives episodes,
//! featurizes states with [`features::encode`] and feeds transitions to a
//! [`policy::Policy`].

pub mod agent;
pub mod config;
#[cfg(feature = "dqn-gpu")]
pub mod dqn;
pub mod error;
pub mod features;
pub mod game;
pub mod pacing;
pub mod policy;
pub mod pos;
pub mod replay;
pub mod spatial;

pub use agent::{Agent, StepReport, TrainingSummary};
pub use config::{AppConfig, GameConfig, RewardConfig, TrainConfig};
pub use error::{Result, SnakeError};
pub use features::{Observation, encode};
pub use game::{EpisodeEnd, Game, StepOutcome};
pub use policy::{Policy, QTablePolicy};
pub use pos::{Action, Dir, Grid, Pos};
pub use replay::{ReplayMemory, Transition};
pub use spatial::SpatialScoreTable;
