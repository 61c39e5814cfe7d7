//! Pure grid rendering: board configuration plus playing set in, a
//! description of every cell out. Drawing and input binding live in the
//! front-end.

use std::collections::HashMap;

use padconfig::BoardConfig;

use crate::color::{Rgb, accent_for_index};
use crate::playing::PlayingSet;

#[derive(Debug, Clone, PartialEq)]
pub struct PadView {
    pub id: String,
    /// Text shown on the pad.
    pub label: String,
    /// Description for assistive output, `Play <label>`.
    pub aria_label: String,
    pub accent: Rgb,
    pub active: bool,
    pub row: u32,
    pub col: u32,
    /// Position of the button in the configuration.
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Pad(PadView),
    Placeholder { row: u32, col: u32, label: String },
}

impl Cell {
    pub fn position(&self) -> (u32, u32) {
        match self {
            Cell::Pad(pad) => (pad.row, pad.col),
            Cell::Placeholder { row, col, .. } => (*row, *col),
        }
    }

    pub fn as_pad(&self) -> Option<&PadView> {
        match self {
            Cell::Pad(pad) => Some(pad),
            Cell::Placeholder { .. } => None,
        }
    }
}

/// Every cell of the grid, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct GridView {
    pub rows: u32,
    pub cols: u32,
    pub cells: Vec<Cell>,
}

impl GridView {
    /// Cell at 1-based `(row, col)`.
    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        if row == 0 || col == 0 || row > self.rows || col > self.cols {
            return None;
        }
        let index = (row - 1) as usize * self.cols as usize + (col - 1) as usize;
        self.cells.get(index)
    }

    pub fn pads(&self) -> impl Iterator<Item = &PadView> {
        self.cells.iter().filter_map(Cell::as_pad)
    }

    pub fn active_ids(&self) -> Vec<&str> {
        self.pads()
            .filter(|pad| pad.active)
            .map(|pad| pad.id.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Builds the grid for `board`, marking pads found in `playing` as active.
///
/// When several buttons claim the same cell the first one declared wins.
pub fn render_grid(board: &BoardConfig, playing: &PlayingSet) -> GridView {
    let mut by_position: HashMap<(u32, u32), usize> = HashMap::new();
    for (index, button) in board.buttons.iter().enumerate() {
        by_position.entry((button.row, button.col)).or_insert(index);
    }

    let rows = board.layout.rows;
    let cols = board.layout.cols;
    let mut cells = Vec::with_capacity(board.layout.slots());

    for row in 1..=rows {
        for col in 1..=cols {
            let cell = match by_position.get(&(row, col)) {
                Some(&index) => {
                    let button = &board.buttons[index];
                    let aria_label = match button.label.as_deref() {
                        Some(label) => format!("Play {label}"),
                        None => format!("Play sound at row {row}, column {col}"),
                    };
                    Cell::Pad(PadView {
                        id: button.id.clone(),
                        label: button.display_label().to_string(),
                        aria_label,
                        accent: accent_for_index(index),
                        active: playing.contains(&button.id),
                        row,
                        col,
                        index,
                    })
                }
                None => Cell::Placeholder {
                    row,
                    col,
                    label: format!("{row},{col}"),
                },
            };
            cells.push(cell);
        }
    }

    GridView { rows, cols, cells }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PALETTE;
    use padconfig::{ButtonSpec, Layout};
    use std::time::Instant;

    fn board(rows: u32, cols: u32, buttons: Vec<ButtonSpec>) -> BoardConfig {
        BoardConfig::new(Layout::new(rows, cols), buttons)
    }

    #[test]
    fn test_cell_count_and_order() {
        for (rows, cols) in [(0, 0), (0, 4), (1, 1), (2, 3), (5, 2)] {
            let grid = render_grid(&board(rows, cols, vec![]), &PlayingSet::new());
            assert_eq!(grid.cells.len(), (rows * cols) as usize);

            let positions: Vec<(u32, u32)> = grid.cells.iter().map(Cell::position).collect();
            let expected: Vec<(u32, u32)> = (1..=rows)
                .flat_map(|r| (1..=cols).map(move |c| (r, c)))
                .collect();
            assert_eq!(positions, expected);
        }
    }

    #[test]
    fn test_pads_and_placeholders() {
        let grid = render_grid(
            &board(2, 2, vec![ButtonSpec::new("horn", Some("Airhorn"), 2, 1)]),
            &PlayingSet::new(),
        );

        let pad = grid.cell(2, 1).and_then(Cell::as_pad).unwrap();
        assert_eq!(pad.label, "Airhorn");
        assert_eq!(pad.aria_label, "Play Airhorn");
        assert!(!pad.active);

        assert_eq!(
            grid.cell(1, 2),
            Some(&Cell::Placeholder {
                row: 1,
                col: 2,
                label: "1,2".to_string()
            })
        );
        assert!(grid.cell(3, 1).is_none());
        assert!(grid.cell(0, 1).is_none());
    }

    #[test]
    fn test_unlabelled_pad_uses_coordinates() {
        let grid = render_grid(
            &board(1, 3, vec![ButtonSpec::new("btn_1_3", None, 1, 3)]),
            &PlayingSet::new(),
        );
        let pad = grid.pads().next().unwrap();
        assert_eq!(pad.aria_label, "Play sound at row 1, column 3");
        assert_eq!(pad.label, "btn_1_3");
    }

    #[test]
    fn test_duplicate_position_first_wins() {
        let grid = render_grid(
            &board(
                1,
                2,
                vec![
                    ButtonSpec::new("first", Some("First"), 1, 1),
                    ButtonSpec::new("second", Some("Second"), 1, 1),
                    ButtonSpec::new("third", Some("Third"), 1, 2),
                ],
            ),
            &PlayingSet::new(),
        );
        let ids: Vec<&str> = grid.pads().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "third"]);

        // colors follow the declaration index, dropped buttons included
        let third = grid.cell(1, 2).and_then(Cell::as_pad).unwrap();
        assert_eq!(third.index, 2);
        assert_eq!(third.accent, PALETTE[2]);
    }

    #[test]
    fn test_accent_cycles_over_palette() {
        let buttons: Vec<ButtonSpec> = (0..14u32)
            .map(|i| ButtonSpec::new(format!("b{i}"), None, i / 7 + 1, i % 7 + 1))
            .collect();
        let grid = render_grid(&board(2, 7, buttons), &PlayingSet::new());
        for pad in grid.pads() {
            assert_eq!(pad.accent, PALETTE[pad.index % 12]);
        }
        assert_eq!(grid.cell(2, 6).and_then(Cell::as_pad).unwrap().accent, PALETTE[0]);
    }

    #[test]
    fn test_out_of_range_buttons_are_not_rendered() {
        let grid = render_grid(
            &board(1, 1, vec![ButtonSpec::new("far", None, 4, 4)]),
            &PlayingSet::new(),
        );
        assert_eq!(grid.pads().count(), 0);
        assert_eq!(grid.cells.len(), 1);
    }

    #[test]
    fn test_active_state_follows_playing_set() {
        let mut playing = PlayingSet::new();
        playing.mark("b", Instant::now());
        let grid = render_grid(
            &board(
                1,
                2,
                vec![
                    ButtonSpec::new("a", None, 1, 1),
                    ButtonSpec::new("b", None, 1, 2),
                ],
            ),
            &playing,
        );
        assert_eq!(grid.active_ids(), vec!["b"]);
    }
}
