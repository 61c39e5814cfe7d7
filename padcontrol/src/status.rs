//! Transient status line.
//!
//! A single slot: showing a message replaces the current one and restarts
//! its display window. Nothing is queued.

use std::time::{Duration, Instant};

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub severity: Severity,
    pub shown_at: Instant,
}

#[derive(Debug, Clone)]
pub struct StatusIndicator {
    current: Option<StatusMessage>,
    duration: Duration,
}

impl StatusIndicator {
    pub fn new(duration: Duration) -> Self {
        Self {
            current: None,
            duration,
        }
    }

    pub fn show(&mut self, text: impl Into<String>, severity: Severity, now: Instant) {
        let text = text.into();
        debug!(severity = severity.as_str(), text = %text, "Status shown");
        self.current = Some(StatusMessage {
            text,
            severity,
            shown_at: now,
        });
    }

    pub fn visible(&self, now: Instant) -> Option<&StatusMessage> {
        self.current
            .as_ref()
            .filter(|message| now < message.shown_at + self.duration)
    }

    /// Hides the message once its window is over. Returns true if it did.
    pub fn expire(&mut self, now: Instant) -> bool {
        if self.current.is_some() && self.visible(now).is_none() {
            self.current = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(2800);

    #[test]
    fn test_message_hides_after_window() {
        let now = Instant::now();
        let mut status = StatusIndicator::new(WINDOW);
        status.show("Playing Horn", Severity::Success, now);

        let shown = status.visible(now + Duration::from_millis(2799)).unwrap();
        assert_eq!(shown.text, "Playing Horn");
        assert_eq!(shown.severity, Severity::Success);
        assert!(status.visible(now + WINDOW).is_none());

        assert!(!status.expire(now + Duration::from_secs(1)));
        assert!(status.expire(now + WINDOW));
        assert!(!status.expire(now + WINDOW));
    }

    #[test]
    fn test_overlapping_calls_overwrite_and_reset() {
        let now = Instant::now();
        let mut status = StatusIndicator::new(WINDOW);
        status.show("first", Severity::Success, now);
        let later = now + Duration::from_secs(2);
        status.show("second", Severity::Error, later);

        let shown = status.visible(now + Duration::from_secs(4)).unwrap();
        assert_eq!(shown.text, "second");
        assert_eq!(shown.severity.as_str(), "error");
        assert!(status.visible(later + WINDOW).is_none());
    }
}
