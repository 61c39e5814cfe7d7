//! Board state machine.
//!
//! Every change to the playing set and to the status line goes through
//! [`BoardState::apply`] (backend answers) or [`BoardState::tick`] (time),
//! both called from the UI loop.

use std::fmt;
use std::time::{Duration, Instant};

use padconfig::BoardConfig;
use tracing::{debug, info, warn};

use crate::backend::SoundBackend;
use crate::errors::ControlError;
use crate::playing::PlayingSet;
use crate::render::{GridView, render_grid};
use crate::status::{Severity, StatusIndicator, StatusMessage};

/// How long a pad stays lit without an explicit stop.
pub const DEFAULT_PLAYING_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a status message stays visible.
pub const DEFAULT_STATUS_DURATION: Duration = Duration::from_millis(2800);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub playing_timeout: Duration,
    pub status_duration: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            playing_timeout: DEFAULT_PLAYING_TIMEOUT,
            status_duration: DEFAULT_STATUS_DURATION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Play(String),
    Stop(String),
    StopAll,
}

impl Request {
    /// Sends the request. Blocks until the backend answers.
    pub fn send<B: SoundBackend + ?Sized>(&self, backend: &B) -> Result<(), ControlError> {
        match self {
            Request::Play(id) => backend.play(id),
            Request::Stop(id) => backend.stop(id),
            Request::StopAll => backend.stop_all(),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Request::Play(_) => "play",
            Request::Stop(_) => "stop",
            Request::StopAll => "stop-all",
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Play(id) | Request::Stop(id) => write!(f, "{} {id}", self.action()),
            Request::StopAll => f.write_str(self.action()),
        }
    }
}

/// A backend answer waiting to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub request: Request,
    pub result: Result<(), ControlError>,
}

impl Outcome {
    pub fn new(request: Request, result: Result<(), ControlError>) -> Self {
        Self { request, result }
    }
}

/// Everything the front-end needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardView {
    pub grid: GridView,
    pub status: Option<StatusMessage>,
}

#[derive(Debug, Clone)]
pub struct BoardState {
    board: BoardConfig,
    playing: PlayingSet,
    status: StatusIndicator,
    timings: Timings,
}

impl BoardState {
    pub fn new(board: BoardConfig, timings: Timings) -> Self {
        Self {
            board,
            playing: PlayingSet::new(),
            status: StatusIndicator::new(timings.status_duration),
            timings,
        }
    }

    pub fn board(&self) -> &BoardConfig {
        &self.board
    }

    pub fn playing(&self) -> &PlayingSet {
        &self.playing
    }

    pub fn is_playing(&self, id: &str) -> bool {
        self.playing.contains(id)
    }

    /// Applies a backend answer.
    pub fn apply(&mut self, outcome: Outcome, now: Instant) {
        let Outcome { request, result } = outcome;
        match request {
            Request::Play(id) => self.apply_play(&id, result, now),
            Request::Stop(id) => self.apply_stop(&id, result),
            Request::StopAll => self.apply_stop_all(result, now),
        }
    }

    fn apply_play(&mut self, id: &str, result: Result<(), ControlError>, now: Instant) {
        let label = self.board.label_for(id).to_string();
        match result {
            Ok(()) => {
                info!(id, "Sound playing");
                self.playing.mark(id, now + self.timings.playing_timeout);
                self.status
                    .show(format!("Playing {label}"), Severity::Success, now);
            }
            Err(ControlError::Rejected(_)) => {
                debug!(id, "Play rejected by backend");
                self.status
                    .show(format!("Could not play {label}"), Severity::Error, now);
            }
            Err(err) => {
                warn!(id, error = %err, "Play request failed");
                self.status.show(
                    format!("Connection error while playing {label}"),
                    Severity::Error,
                    now,
                );
            }
        }
    }

    // Stop failures are logged only, the status line is left alone.
    fn apply_stop(&mut self, id: &str, result: Result<(), ControlError>) {
        match result {
            Ok(()) => {
                if self.playing.remove(id) {
                    debug!(id, "Sound stopped");
                }
            }
            Err(err) => warn!(id, error = %err, "Stop request failed"),
        }
    }

    fn apply_stop_all(&mut self, result: Result<(), ControlError>, now: Instant) {
        match result {
            Ok(()) => {
                let stopped = self.playing.clear();
                info!(count = stopped.len(), "All sounds stopped");
                self.status
                    .show("All sounds stopped", Severity::Success, now);
            }
            Err(ControlError::Rejected(_)) => {
                debug!("Stop-all rejected by backend");
                self.status
                    .show("Could not stop all sounds", Severity::Error, now);
            }
            Err(err) => {
                warn!(error = %err, "Stop-all request failed");
                self.status.show(
                    "Connection error while stopping sounds",
                    Severity::Error,
                    now,
                );
            }
        }
    }

    /// Clears pads whose optimistic timeout has passed and hides an expired
    /// status message. Returns the ids that were cleared.
    pub fn tick(&mut self, now: Instant) -> Vec<String> {
        let expired = self.playing.expire(now);
        for id in &expired {
            debug!(id, "Playing timeout reached");
        }
        self.status.expire(now);
        expired
    }

    pub fn status(&self, now: Instant) -> Option<&StatusMessage> {
        self.status.visible(now)
    }

    pub fn grid(&self) -> GridView {
        render_grid(&self.board, &self.playing)
    }

    pub fn view(&self, now: Instant) -> BoardView {
        BoardView {
            grid: self.grid(),
            status: self.status.visible(now).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use padconfig::{ButtonSpec, Layout};

    fn state() -> BoardState {
        BoardState::new(
            BoardConfig::new(
                Layout::new(1, 3),
                vec![
                    ButtonSpec::new("horn", Some("Airhorn"), 1, 1),
                    ButtonSpec::new("boo", Some("Boo"), 1, 2),
                    ButtonSpec::new("btn_1_3", None, 1, 3),
                ],
            ),
            Timings::default(),
        )
    }

    fn play_ok(id: &str) -> Outcome {
        Outcome::new(Request::Play(id.to_string()), Ok(()))
    }

    fn stop_ok(id: &str) -> Outcome {
        Outcome::new(Request::Stop(id.to_string()), Ok(()))
    }

    #[test]
    fn test_play_success_then_timeout() {
        let now = Instant::now();
        let mut state = state();
        state.apply(play_ok("horn"), now);

        let view = state.view(now);
        assert_eq!(view.grid.active_ids(), vec!["horn"]);
        let status = view.status.unwrap();
        assert_eq!(status.text, "Playing Airhorn");
        assert_eq!(status.severity, Severity::Success);

        assert!(state.tick(now + Duration::from_millis(9_999)).is_empty());
        assert!(state.is_playing("horn"));

        assert_eq!(state.tick(now + DEFAULT_PLAYING_TIMEOUT), vec!["horn"]);
        assert!(!state.is_playing("horn"));
        assert!(state.grid().active_ids().is_empty());
    }

    #[test]
    fn test_stop_before_timeout() {
        let now = Instant::now();
        let mut state = state();
        state.apply(play_ok("horn"), now);
        state.apply(stop_ok("horn"), now + Duration::from_secs(3));

        assert!(!state.is_playing("horn"));
        assert!(state.tick(now + DEFAULT_PLAYING_TIMEOUT).is_empty());
    }

    #[test]
    fn test_stale_timeout_does_not_clear_new_play() {
        let now = Instant::now();
        let mut state = state();
        state.apply(play_ok("horn"), now);
        state.apply(stop_ok("horn"), now + Duration::from_secs(2));
        state.apply(play_ok("horn"), now + Duration::from_secs(8));

        assert!(state.tick(now + DEFAULT_PLAYING_TIMEOUT).is_empty());
        assert!(state.is_playing("horn"));
        assert_eq!(
            state.tick(now + Duration::from_secs(18)),
            vec!["horn"]
        );
    }

    #[test]
    fn test_play_rejected_leaves_pad_inactive() {
        let now = Instant::now();
        let mut state = state();
        state.apply(
            Outcome::new(
                Request::Play("boo".into()),
                Err(ControlError::rejected("play boo")),
            ),
            now,
        );

        assert!(!state.is_playing("boo"));
        let status = state.status(now).unwrap();
        assert_eq!(status.text, "Could not play Boo");
        assert_eq!(status.severity, Severity::Error);
    }

    #[test]
    fn test_play_transport_error_has_its_own_message() {
        let now = Instant::now();
        let mut state = state();
        state.apply(
            Outcome::new(
                Request::Play("btn_1_3".into()),
                Err(ControlError::transport("connection refused")),
            ),
            now,
        );

        assert!(state.playing().is_empty());
        assert_eq!(
            state.status(now).unwrap().text,
            "Connection error while playing btn_1_3"
        );
    }

    #[test]
    fn test_stop_failure_is_silent() {
        let now = Instant::now();
        let mut state = state();
        state.apply(play_ok("horn"), now);
        let later = now + Duration::from_secs(5);
        state.apply(
            Outcome::new(
                Request::Stop("horn".into()),
                Err(ControlError::transport("timeout")),
            ),
            later,
        );

        assert!(state.is_playing("horn"));
        // the play message has expired and nothing replaced it
        assert!(state.status(later).is_none());
    }

    #[test]
    fn test_stop_all_clears_any_number_of_pads() {
        for active in [0usize, 1, 3] {
            let now = Instant::now();
            let mut state = state();
            for id in ["horn", "boo", "btn_1_3"].iter().take(active) {
                state.apply(play_ok(id), now);
            }
            assert_eq!(state.playing().len(), active);

            state.apply(Outcome::new(Request::StopAll, Ok(())), now);
            assert!(state.playing().is_empty());
            assert!(state.grid().active_ids().is_empty());
            assert_eq!(state.status(now).unwrap().text, "All sounds stopped");
        }
    }

    #[test]
    fn test_stop_all_failures() {
        let now = Instant::now();
        let mut state = state();
        state.apply(play_ok("horn"), now);

        state.apply(
            Outcome::new(Request::StopAll, Err(ControlError::rejected("stop-all"))),
            now,
        );
        assert!(state.is_playing("horn"));
        assert_eq!(state.status(now).unwrap().text, "Could not stop all sounds");

        state.apply(
            Outcome::new(Request::StopAll, Err(ControlError::transport("refused"))),
            now,
        );
        let status = state.status(now).unwrap();
        assert_eq!(status.text, "Connection error while stopping sounds");
        assert_eq!(status.severity, Severity::Error);
    }

    #[test]
    fn test_status_expires_on_tick() {
        let now = Instant::now();
        let mut state = state();
        state.apply(play_ok("boo"), now);
        state.tick(now + DEFAULT_STATUS_DURATION);
        assert!(state.status(now).is_none());
        assert!(state.is_playing("boo"));
    }

    #[test]
    fn test_request_display() {
        assert_eq!(Request::Play("a".into()).to_string(), "play a");
        assert_eq!(Request::Stop("a".into()).to_string(), "stop a");
        assert_eq!(Request::StopAll.to_string(), "stop-all");
    }
}
