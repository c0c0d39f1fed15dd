//! Precomputed openness tables.
//!
//! For every cell and every heading whose first move stays on the board, a
//! distance field is relaxed under the no-reverse movement model: the first
//! move is forced, every later move may go straight, turn right or turn left.
//! A neighbour is only re-expanded when its recorded distance strictly
//! improves, so a plain stack is enough to reach the fixpoint.
//!
//! The table is built once (offline, in parallel), persisted as text and
//! shared read-only behind an `Arc` by every simulator.

use ahash::AHashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use crate::error::{Result, SnakeError};
use crate::pos::{Dir, Grid, Pos};

/// On-disk and in-memory marker for cells the relaxation never reached.
pub const UNREACHABLE: i32 = -1;

/// Minimum number of moves from the origin to every cell, row-major.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceField {
    grid: Grid,
    cells: Vec<i32>,
}

impl DistanceField {
    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// `None` for cells off the board or never reached.
    pub fn get(&self, p: Pos) -> Option<i32> {
        if !self.grid.contains(p) {
            return None;
        }
        match self.cells[self.grid.index(p)] {
            UNREACHABLE => None,
            d => Some(d),
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[i32]> {
        self.cells.chunks(self.grid.cols.max(1) as usize)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialEntry {
    /// Smallest distance recorded on the outer ring (0 if the origin is on it).
    pub min_to_wall: i32,
    pub field: DistanceField,
}

impl SpatialEntry {
    /// Sum of the distance field over `cells`; unreachable cells count as 0.
    pub fn tail_rating<'a>(&self, cells: impl IntoIterator<Item = &'a Pos>) -> i64 {
        cells
            .into_iter()
            .map(|&p| self.field.get(p).unwrap_or(0) as i64)
            .sum()
    }
}

struct Frontier {
    at: Pos,
    facing: Dir,
    dist: i32,
    can_turn: bool,
}

/// Label-correcting relaxation from `origin`, first move forced to `heading`.
pub fn relax(grid: Grid, origin: Pos, heading: Dir) -> SpatialEntry {
    let mut dist = vec![i32::MAX; grid.area()];
    dist[grid.index(origin)] = 0;
    let mut min_to_wall = if grid.on_boundary(origin) { 0 } else { i32::MAX };

    let mut stack = vec![Frontier { at: origin, facing: heading, dist: 0, can_turn: false }];
    while let Some(f) = stack.pop() {
        let straight = [f.facing];
        let all = [f.facing, f.facing.right(), f.facing.left()];
        let branches: &[Dir] = if f.can_turn { &all } else { &straight };

        for &facing in branches {
            let next = f.at.step(facing);
            if !grid.contains(next) {
                continue;
            }
            let nd = f.dist + 1;
            if grid.on_boundary(next) {
                min_to_wall = min_to_wall.min(nd);
            }
            let slot = &mut dist[grid.index(next)];
            if *slot > nd {
                *slot = nd;
                stack.push(Frontier { at: next, facing, dist: nd, can_turn: true });
            }
        }
    }

    for d in dist.iter_mut() {
        if *d == i32::MAX {
            *d = UNREACHABLE;
        }
    }
    SpatialEntry { min_to_wall, field: DistanceField { grid, cells: dist } }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpatialScoreTable {
    grid: Grid,
    entries: AHashMap<(Pos, Dir), SpatialEntry>,
}

impl SpatialScoreTable {
    /// Headings whose first move stays on the board. Corners have two,
    /// other ring cells three, interior cells four.
    pub fn feasible_headings(grid: Grid, p: Pos) -> impl Iterator<Item = Dir> {
        Dir::ALL.into_iter().filter(move |&d| grid.contains(p.step(d)))
    }

    pub fn build(grid: Grid) -> Self {
        let started = Instant::now();
        let jobs: Vec<(Pos, Dir)> = grid
            .cells()
            .flat_map(|p| Self::feasible_headings(grid, p).map(move |d| (p, d)))
            .collect();
        tracing::info!("Relaxing {} spatial fields on a {}x{} board", jobs.len(), grid.rows, grid.cols);

        let relaxed: Vec<((Pos, Dir), SpatialEntry)> = jobs
            .into_par_iter()
            .map(|(p, d)| ((p, d), relax(grid, p, d)))
            .collect();
        let entries: AHashMap<_, _> = relaxed.into_iter().collect();

        tracing::info!("Spatial table built in {:?}", started.elapsed());
        Self { grid, entries }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, p: Pos, heading: Dir) -> Option<&SpatialEntry> {
        self.entries.get(&(p, heading))
    }

    /// One line per record: `row_col_heading_minToWall_body`, body rows
    /// joined by `;`, values by `,`.
    pub fn write_text<W: Write>(&self, out: &mut W) -> Result<()> {
        for p in self.grid.cells() {
            for d in Dir::ALL {
                let Some(entry) = self.get(p, d) else { continue };
                let body = entry
                    .field
                    .rows()
                    .map(|row| row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","))
                    .collect::<Vec<_>>()
                    .join(";");
                writeln!(out, "{}_{}_{}_{}_{}", p.row, p.col, d.index(), entry.min_to_wall, body)?;
            }
        }
        Ok(())
    }

    /// Parses the text format. Any malformed line fails the whole load.
    pub fn read_text<R: BufRead>(input: R) -> Result<Self> {
        let mut grid: Option<Grid> = None;
        let mut entries = AHashMap::new();

        for (i, line) in input.lines().enumerate() {
            let line = line?;
            let lineno = i + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let bad = |reason: String| SnakeError::Format { line: lineno, reason };

            let fields: Vec<&str> = line.split('_').collect();
            if fields.len() != 5 {
                return Err(bad(format!("expected 5 fields, found {}", fields.len())));
            }
            let row = parse_int(fields[0], lineno)?;
            let col = parse_int(fields[1], lineno)?;
            let heading = parse_int(fields[2], lineno)?;
            let heading = Dir::from_index(heading as i64)
                .ok_or_else(|| bad(format!("heading {} out of range", heading)))?;
            let min_to_wall = parse_int(fields[3], lineno)?;

            let mut cells = Vec::new();
            let mut cols = None;
            let mut rows = 0;
            for body_row in fields[4].split(';') {
                let values = body_row
                    .split(',')
                    .map(|v| parse_int(v, lineno))
                    .collect::<Result<Vec<_>>>()?;
                match cols {
                    None => cols = Some(values.len()),
                    Some(n) if n != values.len() => {
                        return Err(bad(format!("row {} has {} values, expected {}", rows, values.len(), n)));
                    }
                    Some(_) => {}
                }
                if let Some(v) = values.iter().find(|&&v| v < UNREACHABLE) {
                    return Err(bad(format!("negative distance {}", v)));
                }
                cells.extend(values);
                rows += 1;
            }
            let this_grid = Grid::new(rows, cols.unwrap_or(0) as i32);

            match grid {
                None => grid = Some(this_grid),
                Some(g) if g != this_grid => {
                    return Err(bad(format!(
                        "body is {}x{}, earlier records are {}x{}",
                        this_grid.rows, this_grid.cols, g.rows, g.cols
                    )));
                }
                Some(_) => {}
            }

            let origin = Pos::new(row, col);
            if !this_grid.contains(origin) {
                return Err(bad(format!("origin ({}, {}) is off the board", row, col)));
            }
            let entry = SpatialEntry { min_to_wall, field: DistanceField { grid: this_grid, cells } };
            if entries.insert((origin, heading), entry).is_some() {
                return Err(bad(format!("duplicate record ({}, {}, {})", row, col, heading.index())));
            }
        }

        match grid {
            Some(grid) => Ok(Self { grid, entries }),
            None => Err(SnakeError::Format { line: 0, reason: "no records".into() }),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| SnakeError::Codec(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (table, _): (Self, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| SnakeError::Codec(e.to_string()))?;
        table.check_shape()?;
        Ok(table)
    }

    /// Decoded records must agree with the table's board before any lookup.
    fn check_shape(&self) -> Result<()> {
        let bad = |reason: String| -> Result<()> { Err(SnakeError::Codec(reason)) };
        for (&(origin, heading), entry) in &self.entries {
            let field = &entry.field;
            if field.grid != self.grid {
                return bad(format!(
                    "record ({}, {}, {}) is {}x{}, table is {}x{}",
                    origin.row,
                    origin.col,
                    heading.index(),
                    field.grid.rows,
                    field.grid.cols,
                    self.grid.rows,
                    self.grid.cols
                ));
            }
            if field.cells.len() != self.grid.area() {
                return bad(format!(
                    "record ({}, {}, {}) has {} cells, expected {}",
                    origin.row,
                    origin.col,
                    heading.index(),
                    field.cells.len(),
                    self.grid.area()
                ));
            }
            if !self.grid.contains(origin) {
                return bad(format!("origin ({}, {}) is off the board", origin.row, origin.col));
            }
        }
        Ok(())
    }

    /// Writes text, or the binary cache when the path ends in `.bin`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if is_binary(path) {
            fs::write(path, self.to_bytes()?)?;
        } else {
            let mut out = BufWriter::new(File::create(path)?);
            self.write_text(&mut out)?;
            out.flush()?;
        }
        tracing::info!("Saved {} spatial records to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let table = if is_binary(path) {
            Self::from_bytes(&fs::read(path)?)?
        } else {
            Self::read_text(BufReader::new(File::open(path)?))?
        };
        tracing::debug!(
            "Loaded {} spatial records ({}x{}) from {}",
            table.len(),
            table.grid.rows,
            table.grid.cols,
            path.display()
        );
        Ok(table)
    }
}

fn is_binary(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "bin")
}

fn parse_int(s: &str, line: usize) -> Result<i32> {
    s.trim().parse::<i32>().map_err(|_| SnakeError::Format {
        line,
        reason: format!("{:?} is not an integer", s),
    })
}
