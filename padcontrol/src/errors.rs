use thiserror::Error;

/// Failure of a backend action.
///
/// `Rejected` is a well-formed `{"success": false}` answer. `Transport`
/// covers requests that never completed and answers that could not be read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("Backend rejected {0}")]
    Rejected(String),
    #[error("Transport Error: {0}")]
    Transport(String),
}

impl ControlError {
    pub fn rejected(action: &str) -> Self {
        ControlError::Rejected(action.to_string())
    }

    pub fn transport(message: impl std::fmt::Display) -> Self {
        ControlError::Transport(message.to_string())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ControlError::Transport(_))
    }
}
