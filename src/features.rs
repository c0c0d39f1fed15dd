use serde::{Deserialize, Serialize};

use crate::game::Game;
use crate::pos::Dir;

pub const OBS_LEN: usize = 11;

/// Fixed 11-flag observation:
/// danger straight/right/left, heading left/right/up/down,
/// food left/right/up/down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Observation(pub [bool; OBS_LEN]);

impl Observation {
    pub fn to_f32(&self) -> [f32; OBS_LEN] {
        self.0.map(|b| if b { 1.0 } else { 0.0 })
    }

    /// Packs the flags into a table key, flag `i` at bit `i`.
    pub fn key(&self) -> u16 {
        self.0
            .iter()
            .enumerate()
            .fold(0u16, |k, (i, &b)| if b { k | (1 << i) } else { k })
    }
}

pub fn encode(game: &Game) -> Observation {
    let head = game.head();
    let d = game.dir;
    let food = game.food;

    Observation([
        game.is_blocked(head.step(d)),
        game.is_blocked(head.step(d.right())),
        game.is_blocked(head.step(d.left())),
        d == Dir::Left,
        d == Dir::Right,
        d == Dir::Up,
        d == Dir::Down,
        food.col < head.col,
        food.col > head.col,
        food.row < head.row,
        food.row > head.row,
    ])
}
