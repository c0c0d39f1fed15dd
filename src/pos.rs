use serde::{Deserialize, Serialize};

/// A cell on the board, in cell units (not pixels).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub row: i32,
    pub col: i32,
}

impl Pos {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn step(self, dir: Dir) -> Self {
        let (dr, dc) = dir.offset();
        Pos::new(self.row + dr, self.col + dc)
    }

    pub fn distance(self, other: Pos) -> f32 {
        let dr = (self.row - other.row) as f32;
        let dc = (self.col - other.col) as f32;
        (dr * dr + dc * dc).sqrt()
    }
}

/// Board dimensions in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub rows: i32,
    pub cols: i32,
}

impl Grid {
    pub const fn new(rows: i32, cols: i32) -> Self {
        Self { rows, cols }
    }

    pub fn contains(&self, p: Pos) -> bool {
        p.row >= 0 && p.row < self.rows && p.col >= 0 && p.col < self.cols
    }

    /// True for cells on the outer ring of the board.
    pub fn on_boundary(&self, p: Pos) -> bool {
        self.contains(p)
            && (p.row == 0 || p.row == self.rows - 1 || p.col == 0 || p.col == self.cols - 1)
    }

    pub fn area(&self) -> usize {
        (self.rows.max(0) as usize) * (self.cols.max(0) as usize)
    }

    pub fn index(&self, p: Pos) -> usize {
        (p.row * self.cols + p.col) as usize
    }

    /// Row-major iteration over every cell.
    pub fn cells(&self) -> impl Iterator<Item = Pos> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| Pos::new(row, col)))
    }
}

/// Heading of the snake, also used as the expansion direction of the
/// spatial relaxation. The discriminant is the integer stored on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dir {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl Dir {
    pub const ALL: [Dir; 4] = [Dir::Up, Dir::Right, Dir::Down, Dir::Left];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: i64) -> Option<Dir> {
        match i {
            0 => Some(Dir::Up),
            1 => Some(Dir::Right),
            2 => Some(Dir::Down),
            3 => Some(Dir::Left),
            _ => None,
        }
    }

    /// (row, col) delta of one move.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Dir::Up => (-1, 0),
            Dir::Right => (0, 1),
            Dir::Down => (1, 0),
            Dir::Left => (0, -1),
        }
    }

    pub fn right(self) -> Dir {
        match self {
            Dir::Up => Dir::Right,
            Dir::Right => Dir::Down,
            Dir::Down => Dir::Left,
            Dir::Left => Dir::Up,
        }
    }

    pub fn left(self) -> Dir {
        match self {
            Dir::Up => Dir::Left,
            Dir::Left => Dir::Down,
            Dir::Down => Dir::Right,
            Dir::Right => Dir::Up,
        }
    }
}

pub const ACTIONS: usize = 3;

/// Move relative to the current heading. Reversing is not expressible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Straight = 0,
    Right = 1,
    Left = 2,
}

impl Action {
    pub const ALL: [Action; ACTIONS] = [Action::Straight, Action::Right, Action::Left];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Action> {
        Action::ALL.get(i).copied()
    }

    pub fn apply(self, dir: Dir) -> Dir {
        match self {
            Action::Straight => dir,
            Action::Right => dir.right(),
            Action::Left => dir.left(),
        }
    }
}
