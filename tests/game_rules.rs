//! Step semantics of the simulator: movement, termination and reward terms.

use proptest::prelude::*;
use snake_openness_rl::{Action, Dir, EpisodeEnd, Game, GameConfig, Grid, Pos, SnakeError, SpatialScoreTable};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

fn default_table() -> Arc<SpatialScoreTable> {
    static TABLE: OnceLock<Arc<SpatialScoreTable>> = OnceLock::new();
    TABLE
        .get_or_init(|| Arc::new(SpatialScoreTable::build(GameConfig::default().grid())))
        .clone()
}

fn small_table() -> Arc<SpatialScoreTable> {
    static TABLE: OnceLock<Arc<SpatialScoreTable>> = OnceLock::new();
    TABLE
        .get_or_init(|| Arc::new(SpatialScoreTable::build(Grid::new(8, 10))))
        .clone()
}

fn no_bonus() -> GameConfig {
    let mut config = GameConfig::default();
    config.rewards.openness_bonus = 0.0;
    config
}

fn approach(len: f32, old: Pos, new: Pos, food: Pos) -> f32 {
    let d_old = old.distance(food) * 20.0;
    let d_new = new.distance(food) * 20.0;
    10.0 * ((len + d_old) / (len + d_new)).log(len)
}

#[test]
fn three_straight_moves_keep_length() {
    let mut g = Game::new(&no_bonus(), default_table(), 11).unwrap();
    assert_eq!(g.grid(), Grid::new(24, 32));
    assert_eq!(g.head(), Pos::new(12, 16));
    g.food = Pos::new(0, 0);

    for _ in 0..3 {
        let old = g.head();
        let out = g.step(Action::Straight);
        let new = g.head();
        assert_eq!(new, Pos::new(old.row, old.col + 1));
        assert!(!out.done);
        assert!(!out.ate_food);
        assert_eq!(g.snake.len(), 3);
        // length 4 between push and pop
        let expected = approach(4.0, old, new, g.food);
        assert!((out.reward - expected).abs() < 1e-4, "{} vs {}", out.reward, expected);
    }
    assert_eq!(g.frames.steps_this_episode, 3);
    assert_eq!(g.frames.steps_since_food, 3);
}

#[test]
fn eating_grows_scores_and_resets_hunger() {
    let mut g = Game::new(&no_bonus(), default_table(), 3).unwrap();
    g.food = Pos::new(12, 17);
    g.frames.steps_since_food = 40;

    let out = g.step(Action::Straight);
    assert!(out.ate_food);
    assert!(!out.done);
    assert_eq!(out.score, 1);
    assert_eq!(g.score, 1);
    assert_eq!(g.snake.len(), 4);
    assert_eq!(g.frames.steps_since_food, 0);
    // the stall penalty applies before the food reward
    let expected = 10.0 - 0.5 / 4.0;
    assert!((out.reward - expected).abs() < 1e-6);
    assert!(!g.snake_contains(g.food));
}

#[test]
fn wall_collision_is_terminal() {
    let mut g = Game::new(&GameConfig::default(), default_table(), 5).unwrap();
    g.snake = vec![Pos::new(5, 31), Pos::new(5, 30), Pos::new(5, 29)].into();
    g.dir = Dir::Right;

    let out = g.step(Action::Straight);
    assert!(out.done);
    assert_eq!(out.reward, -10.0);
    assert_eq!(out.end, Some(EpisodeEnd::Collision));
    assert!(!g.alive);
    assert_eq!(g.collisions.last_frame, 1);
    assert_eq!(g.collisions.prior_frame, 0);
    assert_eq!(g.collisions.predicted_gap, 0);
}

#[test]
fn body_and_tail_collisions_are_terminal() {
    let mut g = Game::new(&GameConfig::default(), default_table(), 5).unwrap();
    g.snake = vec![Pos::new(5, 5), Pos::new(5, 4), Pos::new(4, 4), Pos::new(4, 5), Pos::new(4, 6)].into();
    g.dir = Dir::Right;
    let out = g.step(Action::Left);
    assert!(out.done);
    assert_eq!(out.reward, -10.0);

    // the tail has not moved out of the way yet
    g.reset().unwrap();
    g.snake = vec![Pos::new(5, 5), Pos::new(5, 4), Pos::new(4, 4), Pos::new(4, 5)].into();
    g.dir = Dir::Right;
    let out = g.step(Action::Left);
    assert!(out.done);
    assert_eq!(out.end, Some(EpisodeEnd::Collision));
}

#[test]
fn starving_times_out_with_stall_penalty() {
    let mut g = Game::new(&GameConfig::default(), default_table(), 9).unwrap();
    g.food = Pos::new(0, 0);
    g.frames.steps_since_food = 999;

    let out = g.step(Action::Straight);
    assert!(out.done);
    assert_eq!(out.end, Some(EpisodeEnd::Timeout));
    let expected = -20.0 - 0.5 / 4.0;
    assert!((out.reward - expected).abs() < 1e-6);
}

#[test]
fn openness_bonus_matches_candidate_extremes() {
    let shaped = GameConfig::default();
    let plain = no_bonus();
    let mut a = Game::new(&shaped, default_table(), 21).unwrap();
    let mut b = Game::new(&plain, default_table(), 21).unwrap();

    for action in [Action::Right, Action::Straight, Action::Left] {
        a.food = Pos::new(0, 0);
        b.food = Pos::new(0, 0);
        let openness = a.openness();
        assert!(!openness.candidates.is_empty());
        let bonus = openness.bonus(action.apply(a.dir), 10.0);

        let ra = a.step(action).reward;
        let rb = b.step(action).reward;
        assert!((ra - rb - bonus).abs() < 1e-4, "{} - {} != {}", ra, rb, bonus);
        assert_eq!(a.snake, b.snake);
    }
}

#[test]
fn filling_the_board_ends_as_a_win() {
    let config = GameConfig::with_cells(2, 4);
    let table = Arc::new(SpatialScoreTable::build(config.grid()));
    let mut g = Game::new(&config, table, 1).unwrap();
    g.snake = vec![
        Pos::new(1, 1),
        Pos::new(1, 2),
        Pos::new(1, 3),
        Pos::new(0, 3),
        Pos::new(0, 2),
        Pos::new(0, 1),
        Pos::new(0, 0),
    ]
    .into();
    g.dir = Dir::Left;
    g.food = Pos::new(1, 0);

    let out = g.step(Action::Straight);
    assert!(out.done);
    assert!(out.ate_food);
    assert_eq!(out.end, Some(EpisodeEnd::BoardCleared));
    assert_eq!(out.score, 1);
    assert_eq!(g.snake.len(), 8);
    assert!(matches!(g.place_food(), Err(SnakeError::BoardFull)));

    g.reset().unwrap();
    assert_eq!(g.snake.len(), 3);
}

#[test]
fn table_must_match_board() {
    let config = GameConfig::with_cells(6, 6);
    let table = Arc::new(SpatialScoreTable::build(Grid::new(6, 7)));
    assert!(matches!(Game::new(&config, table, 0), Err(SnakeError::GridMismatch { .. })));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn random_play_keeps_invariants(seed in any::<u64>(), moves in prop::collection::vec(0usize..3, 1..400)) {
        let config = GameConfig::with_cells(8, 10);
        let mut g = Game::new(&config, small_table(), seed).unwrap();
        let grid = g.grid();

        for m in moves {
            let action = Action::from_index(m).unwrap();
            let target = g.head().step(action.apply(g.dir));
            let blocked = !grid.contains(target) || g.snake_contains(target);
            let score_before = g.score;

            let out = g.step(action);

            if blocked {
                prop_assert!(out.done);
                prop_assert_eq!(out.end, Some(EpisodeEnd::Collision));
                prop_assert_eq!(out.reward, -10.0);
            }
            if out.ate_food {
                prop_assert_eq!(out.score, score_before + 1);
            } else {
                prop_assert_eq!(out.score, score_before);
            }
            if out.done {
                g.reset().unwrap();
                prop_assert_eq!(g.score, 0);
                continue;
            }

            let cells: HashSet<Pos> = g.snake.iter().copied().collect();
            prop_assert_eq!(cells.len(), g.snake.len());
            prop_assert!(g.snake.iter().all(|&p| grid.contains(p)));
            prop_assert!(!cells.contains(&g.food));
        }
    }
}
