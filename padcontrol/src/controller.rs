//! Non-blocking front to the board state machine.
//!
//! Each request runs on its own short-lived worker thread so concurrent
//! plays of different pads do not wait on each other. Answers come back
//! through a channel and are applied by [`Controller::pump`] on the caller's
//! thread.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use padconfig::BoardConfig;
use tracing::{debug, error};

use crate::backend::SoundBackend;
use crate::board::{BoardState, BoardView, Outcome, Request, Timings};
use crate::errors::ControlError;

pub struct Controller<B: SoundBackend + 'static> {
    backend: Arc<B>,
    state: BoardState,
    outcomes_tx: Sender<Outcome>,
    outcomes_rx: Receiver<Outcome>,
    in_flight: usize,
}

impl<B: SoundBackend + 'static> Controller<B> {
    pub fn new(backend: Arc<B>, board: BoardConfig, timings: Timings) -> Self {
        let (outcomes_tx, outcomes_rx) = unbounded::<Outcome>();
        Self {
            backend,
            state: BoardState::new(board, timings),
            outcomes_tx,
            outcomes_rx,
            in_flight: 0,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn board(&self) -> &BoardConfig {
        self.state.board()
    }

    /// Requests sent whose answer has not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn play(&mut self, id: &str) {
        self.dispatch(Request::Play(id.to_string()));
    }

    pub fn stop(&mut self, id: &str) {
        self.dispatch(Request::Stop(id.to_string()));
    }

    pub fn stop_all(&mut self) {
        self.dispatch(Request::StopAll);
    }

    fn dispatch(&mut self, request: Request) {
        debug!(request = %request, "Dispatching request");
        let backend = Arc::clone(&self.backend);
        let tx = self.outcomes_tx.clone();
        let worker_request = request.clone();

        let spawned = thread::Builder::new()
            .name(format!("padboard-{}", request.action()))
            .spawn(move || {
                let result = worker_request.send(backend.as_ref());
                let _ = tx.send(Outcome::new(worker_request, result));
            });

        match spawned {
            Ok(_) => self.in_flight += 1,
            Err(err) => {
                error!(request = %request, error = %err, "Cannot spawn request worker");
                let outcome = Outcome::new(request, Err(ControlError::transport(err)));
                self.state.apply(outcome, Instant::now());
            }
        }
    }

    fn apply(&mut self, outcome: Outcome, now: Instant) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.state.apply(outcome, now);
    }

    /// Applies every answer received so far, then expires timeouts.
    /// Returns the number of answers applied.
    pub fn pump(&mut self, now: Instant) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.outcomes_rx.try_recv() {
            self.apply(outcome, now);
            applied += 1;
        }
        self.state.tick(now);
        applied
    }

    /// Waits up to `timeout` for one answer and applies it.
    pub fn wait_outcome(&mut self, timeout: Duration) -> Option<Outcome> {
        match self.outcomes_rx.recv_timeout(timeout) {
            Ok(outcome) => {
                self.apply(outcome.clone(), Instant::now());
                Some(outcome)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Expires timeouts without reading answers.
    pub fn tick(&mut self, now: Instant) -> Vec<String> {
        self.state.tick(now)
    }

    pub fn view(&self, now: Instant) -> BoardView {
        self.state.view(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Severity;
    use padconfig::{ButtonSpec, Layout};
    use std::collections::HashMap;
    use std::sync::Mutex;

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct ScriptedBackend {
        answers: Mutex<HashMap<String, Result<(), ControlError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn answer(&self, key: &str, result: Result<(), ControlError>) {
            self.answers.lock().unwrap().insert(key.to_string(), result);
        }

        fn call(&self, key: String) -> Result<(), ControlError> {
            let result = self
                .answers
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .unwrap_or(Ok(()));
            self.calls.lock().unwrap().push(key);
            result
        }

        fn calls(&self) -> Vec<String> {
            let mut calls = self.calls.lock().unwrap().clone();
            calls.sort();
            calls
        }
    }

    impl SoundBackend for ScriptedBackend {
        fn play(&self, id: &str) -> Result<(), ControlError> {
            self.call(format!("play {id}"))
        }

        fn stop(&self, id: &str) -> Result<(), ControlError> {
            self.call(format!("stop {id}"))
        }

        fn stop_all(&self) -> Result<(), ControlError> {
            self.call("stop-all".to_string())
        }

        fn fetch_board(&self) -> Result<String, ControlError> {
            Ok(r#"{"layout": [1, 1]}"#.to_string())
        }
    }

    fn controller(backend: Arc<ScriptedBackend>) -> Controller<ScriptedBackend> {
        let board = BoardConfig::new(
            Layout::new(2, 2),
            vec![
                ButtonSpec::new("horn", Some("Airhorn"), 1, 1),
                ButtonSpec::new("boo", Some("Boo"), 1, 2),
                ButtonSpec::new("clap", Some("Clap"), 2, 1),
            ],
        );
        Controller::new(backend, board, Timings::default())
    }

    fn drain(controller: &mut Controller<ScriptedBackend>) {
        while controller.in_flight() > 0 {
            assert!(controller.wait_outcome(WAIT).is_some(), "worker did not answer");
        }
    }

    #[test]
    fn test_play_is_applied_after_answer() {
        let backend = Arc::new(ScriptedBackend::default());
        let mut controller = controller(backend.clone());

        controller.play("horn");
        assert_eq!(controller.in_flight(), 1);
        drain(&mut controller);

        assert!(controller.state().is_playing("horn"));
        assert_eq!(backend.calls(), vec!["play horn"]);
        let view = controller.view(Instant::now());
        assert_eq!(view.grid.active_ids(), vec!["horn"]);
        assert_eq!(view.status.unwrap().severity, Severity::Success);
    }

    #[test]
    fn test_concurrent_plays_are_independent() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.answer("play boo", Err(ControlError::rejected("play boo")));
        let mut controller = controller(backend.clone());

        controller.play("horn");
        controller.play("boo");
        controller.play("clap");
        assert_eq!(controller.in_flight(), 3);
        drain(&mut controller);

        let grid = controller.state().grid();
        let mut active = grid.active_ids();
        active.sort();
        assert_eq!(active, vec!["clap", "horn"]);
        assert_eq!(backend.calls(), vec!["play boo", "play clap", "play horn"]);
    }

    #[test]
    fn test_stop_and_stop_all_hooks() {
        let backend = Arc::new(ScriptedBackend::default());
        let mut controller = controller(backend.clone());

        controller.play("horn");
        controller.play("boo");
        drain(&mut controller);
        controller.stop("horn");
        drain(&mut controller);
        assert!(!controller.state().is_playing("horn"));
        assert!(controller.state().is_playing("boo"));

        controller.stop_all();
        drain(&mut controller);
        assert!(controller.state().playing().is_empty());
        assert_eq!(
            controller.view(Instant::now()).status.unwrap().text,
            "All sounds stopped"
        );
    }

    #[test]
    fn test_pump_applies_and_expires() {
        let backend = Arc::new(ScriptedBackend::default());
        let mut controller = controller(backend);

        controller.play("clap");
        let deadline = Instant::now() + WAIT;
        let mut applied = 0;
        while applied == 0 && Instant::now() < deadline {
            applied = controller.pump(Instant::now());
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(applied, 1);
        assert_eq!(controller.in_flight(), 0);
        assert!(controller.state().is_playing("clap"));

        controller.pump(Instant::now() + Duration::from_secs(11));
        assert!(!controller.state().is_playing("clap"));
    }

    #[test]
    fn test_wait_outcome_times_out_when_idle() {
        let backend = Arc::new(ScriptedBackend::default());
        let mut controller = controller(backend);
        assert!(controller.wait_outcome(Duration::from_millis(20)).is_none());
    }
}
