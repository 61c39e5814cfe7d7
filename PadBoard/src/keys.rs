//! Key bindings.
//!
//! Space and Escape stop every sound. They are matched before anything else
//! so no other binding can shadow them.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StopAll,
    PlaySelected,
    StopSelected,
    /// Cursor move by (rows, cols).
    Move(i32, i32),
    Quit,
}

pub fn action_for_key(key: &KeyEvent) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    match key.code {
        KeyCode::Char(' ') | KeyCode::Esc => return Some(Action::StopAll),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return Some(Action::Quit);
        }
        _ => {}
    }

    match key.code {
        KeyCode::Enter => Some(Action::PlaySelected),
        KeyCode::Char('s') => Some(Action::StopSelected),
        KeyCode::Up | KeyCode::Char('k') => Some(Action::Move(-1, 0)),
        KeyCode::Down | KeyCode::Char('j') => Some(Action::Move(1, 0)),
        KeyCode::Left | KeyCode::Char('h') => Some(Action::Move(0, -1)),
        KeyCode::Right | KeyCode::Char('l') => Some(Action::Move(0, 1)),
        KeyCode::Char('q') => Some(Action::Quit),
        _ => None,
    }
}
