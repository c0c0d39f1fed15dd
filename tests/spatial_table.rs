//! Spatial score table: coverage, relaxation properties and the text format.

use proptest::prelude::*;
use snake_openness_rl::spatial::{SpatialScoreTable, relax};
use snake_openness_rl::{Dir, Grid, Pos, SnakeError};
use std::io::Write;

#[test]
fn entry_count_by_cell_class() {
    let grid = Grid::new(5, 6);
    let table = SpatialScoreTable::build(grid);
    // every ring side drops one heading per cell
    assert_eq!(table.len(), (4 * 5 * 6 - 2 * 5 - 2 * 6) as usize);

    let headings = |p: Pos| Dir::ALL.iter().filter(|&&d| table.get(p, d).is_some()).count();
    assert_eq!(headings(Pos::new(0, 0)), 2);
    assert_eq!(headings(Pos::new(4, 5)), 2);
    assert_eq!(headings(Pos::new(0, 3)), 3);
    assert_eq!(headings(Pos::new(2, 0)), 3);
    assert_eq!(headings(Pos::new(2, 3)), 4);

    assert!(table.get(Pos::new(0, 0), Dir::Up).is_none());
    assert!(table.get(Pos::new(0, 0), Dir::Left).is_none());
    assert!(table.get(Pos::new(0, 0), Dir::Right).is_some());
}

#[test]
fn min_to_wall_is_smallest_ring_distance() {
    let grid = Grid::new(6, 7);
    let table = SpatialScoreTable::build(grid);
    for p in grid.cells() {
        for d in Dir::ALL {
            let Some(entry) = table.get(p, d) else { continue };
            let ring_min = grid
                .cells()
                .filter(|&c| grid.on_boundary(c))
                .filter_map(|c| entry.field.get(c))
                .min()
                .unwrap();
            assert_eq!(entry.min_to_wall, ring_min, "cell {:?} heading {:?}", p, d);
        }
    }
}

#[test]
fn first_move_is_forced() {
    let grid = Grid::new(7, 7);
    let entry = relax(grid, Pos::new(3, 3), Dir::Up);
    assert_eq!(entry.field.get(Pos::new(2, 3)), Some(1));
    // the sideways neighbours need the forced move first
    assert_eq!(entry.field.get(Pos::new(3, 4)), Some(3));
    assert_eq!(entry.field.get(Pos::new(3, 2)), Some(3));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Every reached cell other than the origin has an orthogonal neighbour
    /// recorded strictly closer, and nothing beats the origin.
    #[test]
    fn relaxation_has_predecessors(rows in 2i32..9, cols in 2i32..9, r in 0i32..9, c in 0i32..9, h in 0i64..4) {
        let grid = Grid::new(rows, cols);
        let origin = Pos::new(r % rows, c % cols);
        let heading = Dir::from_index(h).unwrap();
        prop_assume!(grid.contains(origin.step(heading)));

        let entry = relax(grid, origin, heading);
        prop_assert_eq!(entry.field.get(origin), Some(0));
        prop_assert_eq!(entry.field.get(origin.step(heading)), Some(1));
        for p in grid.cells() {
            let Some(d) = entry.field.get(p) else { continue };
            if p == origin {
                continue;
            }
            prop_assert!(d > 0);
            let has_pred = Dir::ALL
                .iter()
                .filter_map(|&n| entry.field.get(p.step(n)))
                .any(|nd| nd <= d - 1);
            prop_assert!(has_pred, "cell {:?} at {} has no predecessor", p, d);
        }
    }
}

#[test]
fn text_format_round_trips() {
    let table = SpatialScoreTable::build(Grid::new(3, 4));
    let mut buf = Vec::new();
    table.write_text(&mut buf).unwrap();

    let text = String::from_utf8(buf.clone()).unwrap();
    let first = text.lines().next().unwrap();
    // (0,0) heading Right
    assert!(first.starts_with("0_0_1_0_0,1,2,3;"), "{}", first);
    assert_eq!(text.lines().count(), table.len());

    let loaded = SpatialScoreTable::read_text(buf.as_slice()).unwrap();
    assert_eq!(loaded.grid(), table.grid());
    assert_eq!(loaded.len(), table.len());
    for p in table.grid().cells() {
        for d in Dir::ALL {
            assert_eq!(loaded.get(p, d), table.get(p, d));
        }
    }
}

#[test]
fn file_round_trip_text_and_binary() {
    let table = SpatialScoreTable::build(Grid::new(4, 4));
    let dir = tempfile::tempdir().unwrap();

    for name in ["table.txt", "table.bin"] {
        let path = dir.path().join(name);
        table.save(&path).unwrap();
        let loaded = SpatialScoreTable::load(&path).unwrap();
        assert_eq!(loaded.len(), table.len());
        assert_eq!(loaded.get(Pos::new(1, 1), Dir::Down), table.get(Pos::new(1, 1), Dir::Down));
    }
}

fn format_error_line(text: &str) -> usize {
    match SpatialScoreTable::read_text(text.as_bytes()) {
        Err(SnakeError::Format { line, .. }) => line,
        Err(e) => panic!("expected a format error, got {e}"),
        Ok(_) => panic!("malformed input was accepted"),
    }
}

#[test]
fn malformed_lines_fail_the_load() {
    let good = "0_0_1_0_0,1;1,2";
    assert!(SpatialScoreTable::read_text(good.as_bytes()).is_ok());

    // wrong field count
    assert_eq!(format_error_line(&format!("{good}\n0_1_3_0")), 2);
    // non-integer value
    assert_eq!(format_error_line("0_0_1_x_0,1;1,2"), 1);
    assert_eq!(format_error_line("0_0_1_0_0,1;1,two"), 1);
    // heading out of range
    assert_eq!(format_error_line("0_0_7_0_0,1;1,2"), 1);
    // ragged body
    assert_eq!(format_error_line("0_0_1_0_0,1;1"), 1);
    // body size disagrees with earlier records
    assert_eq!(format_error_line(&format!("{good}\n\n0_1_3_0_0,1,2;1,2,3")), 3);
    // duplicate key
    assert_eq!(format_error_line(&format!("{good}\n{good}")), 2);
    // origin off the board
    assert_eq!(format_error_line("5_0_1_0_0,1;1,2"), 1);
}

#[test]
fn load_reports_format_and_io_errors() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = std::fs::File::create(dir.path().join("bad.txt")).unwrap();
    writeln!(f, "garbage").unwrap();
    assert!(matches!(
        SpatialScoreTable::load(&dir.path().join("bad.txt")),
        Err(SnakeError::Format { line: 1, .. })
    ));
    assert!(matches!(
        SpatialScoreTable::load(&dir.path().join("absent.txt")),
        Err(SnakeError::Io(_))
    ));
}
