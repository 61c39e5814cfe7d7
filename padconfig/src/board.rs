//! Board configuration: the grid layout and the sound buttons placed on it.
//!
//! Loading a board never fails. A missing file, invalid JSON or a document
//! that does not have the expected shape is logged and replaced by an empty
//! `0x0` board, so the UI can always render something.
//!
//! Accepted document shape:
//!
//! ```json
//! {
//!   "layout": [3, 4],
//!   "buttons": [
//!     { "id": "btn_1_1", "label": "Airhorn", "row": 1, "col": 1 },
//!     { "row": 1, "col": 2, "file": "snippets/boo.wav" }
//!   ]
//! }
//! ```
//!
//! `layout` may also be written `{"rows": 3, "cols": 4}`. A button without an
//! `id` gets `btn_<row>_<col>`, the identifier the backend derives.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, error, info};

/// Where the board configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardSource {
    /// A JSON file on disk.
    File(PathBuf),
    /// The JSON document served by the backend at `GET /api/config`.
    Backend,
}

/// Largest grid accepted from a board document.
pub const MAX_CELLS: u32 = 4096;

/// Grid dimensions, `rows x cols`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Layout {
    pub rows: u32,
    pub cols: u32,
}

impl Layout {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    pub fn slots(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (1..=self.rows).contains(&row) && (1..=self.cols).contains(&col)
    }
}

impl<'de> Deserialize<'de> for Layout {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawLayout {
            Pair(u32, u32),
            Named { rows: u32, cols: u32 },
        }

        let (rows, cols) = match RawLayout::deserialize(deserializer)? {
            RawLayout::Pair(rows, cols) => (rows, cols),
            RawLayout::Named { rows, cols } => (rows, cols),
        };
        match rows.checked_mul(cols) {
            Some(cells) if cells <= MAX_CELLS => Ok(Layout { rows, cols }),
            _ => Err(serde::de::Error::custom(format!(
                "layout {rows}x{cols} exceeds {MAX_CELLS} cells"
            ))),
        }
    }
}

/// One sound button. `row` and `col` are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawButton")]
pub struct ButtonSpec {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub row: u32,
    pub col: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Deserialize)]
struct RawButton {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: Option<String>,
    row: u32,
    col: u32,
    #[serde(default)]
    file: Option<String>,
}

impl From<RawButton> for ButtonSpec {
    fn from(raw: RawButton) -> Self {
        let id = raw
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| button_id(raw.row, raw.col));
        Self {
            id,
            label: raw.label.filter(|label| !label.trim().is_empty()),
            row: raw.row,
            col: raw.col,
            file: raw.file,
        }
    }
}

impl ButtonSpec {
    pub fn new(id: impl Into<String>, label: Option<&str>, row: u32, col: u32) -> Self {
        Self {
            id: id.into(),
            label: label.map(str::to_string),
            row,
            col,
            file: None,
        }
    }

    /// Label if set, otherwise the id.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

/// Identifier the backend assigns to the button at `(row, col)`.
pub fn button_id(row: u32, col: u32) -> String {
    format!("btn_{row}_{col}")
}

/// Grid layout plus buttons, read once at start-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawBoard")]
pub struct BoardConfig {
    pub layout: Layout,
    pub buttons: Vec<ButtonSpec>,
}

#[derive(Deserialize)]
struct RawBoard {
    #[serde(default)]
    layout: Option<Layout>,
    #[serde(default)]
    buttons: Option<Vec<ButtonSpec>>,
}

impl From<RawBoard> for BoardConfig {
    fn from(raw: RawBoard) -> Self {
        Self {
            layout: raw.layout.unwrap_or_default(),
            buttons: raw.buttons.unwrap_or_default(),
        }
    }
}

impl BoardConfig {
    pub fn new(layout: Layout, buttons: Vec<ButtonSpec>) -> Self {
        Self { layout, buttons }
    }

    /// Strict parse, for callers that want the error.
    pub fn parse(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Parses a board document, falling back to an empty board on any error.
    pub fn from_json_str(json: &str) -> Self {
        match Self::parse(json) {
            Ok(board) => {
                debug!(
                    rows = board.layout.rows,
                    cols = board.layout.cols,
                    buttons = board.buttons.len(),
                    "Board configuration parsed"
                );
                board
            }
            Err(err) => {
                error!(error = %err, "Invalid board configuration, using an empty board");
                Self::default()
            }
        }
    }

    /// Reads and parses a board file, falling back to an empty board on any error.
    pub fn from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => {
                info!(board_file = %path.display(), "Loading board configuration");
                Self::from_json_str(&json)
            }
            Err(err) => {
                error!(
                    board_file = %path.display(),
                    error = %err,
                    "Cannot read board configuration, using an empty board"
                );
                Self::default()
            }
        }
    }

    /// First button declared for `(row, col)`. Later duplicates are ignored.
    pub fn button_at(&self, row: u32, col: u32) -> Option<&ButtonSpec> {
        self.buttons.iter().find(|b| b.row == row && b.col == col)
    }

    pub fn button(&self, id: &str) -> Option<&ButtonSpec> {
        self.buttons.iter().find(|b| b.id == id)
    }

    /// Human readable name used in status messages.
    pub fn label_for<'a>(&'a self, id: &'a str) -> &'a str {
        self.button(id).map(ButtonSpec::display_label).unwrap_or(id)
    }

    pub fn is_empty(&self) -> bool {
        self.layout.slots() == 0
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Cannot serialize board configuration")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = self.to_json_pretty()?;
        fs::write(path, json + "\n")
            .with_context(|| format!("Cannot write board configuration to {}", path.display()))
    }
}
