//! Soundboard control: backend access, pad state and grid rendering.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::{Duration, Instant};
//!
//! use padconfig::BoardSource;
//! use padcontrol::{Controller, RestBackend, Timings, load_board};
//!
//! let backend = Arc::new(RestBackend::new("http://localhost:8080", Duration::from_secs(5)));
//! let board = load_board(&BoardSource::Backend, backend.as_ref());
//! let mut controller = Controller::new(backend, board, Timings::default());
//!
//! controller.play("btn_1_1");
//! controller.wait_outcome(Duration::from_secs(5));
//! let view = controller.view(Instant::now());
//! println!("{} active pad(s)", view.grid.active_ids().len());
//! ```

pub mod backend;
pub mod board;
pub mod color;
pub mod controller;
pub mod errors;
pub mod playing;
pub mod render;
pub mod status;

use padconfig::{BoardConfig, BoardSource};
use tracing::error;

pub use backend::{RestBackend, SoundBackend};
pub use board::{BoardState, BoardView, Outcome, Request, Timings};
pub use color::{PALETTE, Rgb, accent_for_index};
pub use controller::Controller;
pub use errors::ControlError;
pub use playing::PlayingSet;
pub use render::{Cell, GridView, PadView, render_grid};
pub use status::{Severity, StatusIndicator, StatusMessage};

/// Reads the board from `source`. Never fails: any problem is logged and
/// an empty board is returned.
pub fn load_board<B: SoundBackend + ?Sized>(source: &BoardSource, backend: &B) -> BoardConfig {
    match source {
        BoardSource::File(path) => BoardConfig::from_path(path),
        BoardSource::Backend => match backend.fetch_board() {
            Ok(json) => BoardConfig::from_json_str(&json),
            Err(err) => {
                error!(error = %err, "Cannot fetch board from backend, using an empty board");
                BoardConfig::default()
            }
        },
    }
}
