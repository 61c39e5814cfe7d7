//! Soundboard backend access.
//!
//! The backend exposes three actions, each answering `{"success": bool}`:
//!
//! - `POST /api/play/{id}`
//! - `POST /api/stop/{id}`
//! - `POST /api/stop-all`
//!
//! plus `GET /api/config`, which serves the board configuration.

use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use tracing::debug;
use ureq::http;
use ureq::{Agent, Body};

use crate::errors::ControlError;

/// Characters left as-is in path segments (RFC 3986 unreserved).
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Blocking access to the sound backend. Implementations are called from
/// worker threads, never from the UI loop.
pub trait SoundBackend: Send + Sync {
    fn play(&self, id: &str) -> Result<(), ControlError>;

    fn stop(&self, id: &str) -> Result<(), ControlError>;

    fn stop_all(&self) -> Result<(), ControlError>;

    /// Raw board configuration document.
    fn fetch_board(&self) -> Result<String, ControlError>;
}

#[derive(Debug, Deserialize)]
struct ActionResponse {
    success: bool,
}

/// [`SoundBackend`] over the REST API.
pub struct RestBackend {
    base_url: String,
    agent: Agent,
}

impl Clone for RestBackend {
    fn clone(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            agent: self.agent.clone(),
        }
    }
}

impl RestBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        let agent: Agent = config.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url_segments(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&utf8_percent_encode(segment, SEGMENT).to_string());
        }
        url
    }

    fn post_action(&self, action: &str, segments: &[&str]) -> Result<(), ControlError> {
        let url = self.build_url_segments(segments);
        debug!(url = %url, action, "POST");
        let response = self.agent.post(&url).send_empty();
        let (status, body) = Self::read_response(&url, response)?;

        let answer: ActionResponse = serde_json::from_str(&body).map_err(|err| {
            ControlError::transport(format!("HTTP {status} from {url}: unreadable answer ({err})"))
        })?;
        if answer.success {
            Ok(())
        } else {
            Err(ControlError::rejected(action))
        }
    }

    fn read_response(
        url: &str,
        response: Result<http::Response<Body>, ureq::Error>,
    ) -> Result<(http::StatusCode, String), ControlError> {
        let mut response = response.map_err(|err| ControlError::transport(format!("{url}: {err}")))?;
        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|err| ControlError::transport(format!("{url}: cannot read body ({err})")))?;
        Ok((status, body))
    }
}

impl SoundBackend for RestBackend {
    fn play(&self, id: &str) -> Result<(), ControlError> {
        self.post_action(&format!("play {id}"), &["api", "play", id])
    }

    fn stop(&self, id: &str) -> Result<(), ControlError> {
        self.post_action(&format!("stop {id}"), &["api", "stop", id])
    }

    fn stop_all(&self) -> Result<(), ControlError> {
        self.post_action("stop-all", &["api", "stop-all"])
    }

    fn fetch_board(&self) -> Result<String, ControlError> {
        let url = self.build_url_segments(&["api", "config"]);
        debug!(url = %url, "GET");
        let response = self.agent.get(&url).call();
        let (status, body) = Self::read_response(&url, response)?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(ControlError::transport(format!("HTTP {status} from {url}: {body}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_segments_are_encoded() {
        let backend = RestBackend::new("http://localhost:8080/", Duration::from_secs(1));
        assert_eq!(backend.base_url(), "http://localhost:8080");
        assert_eq!(
            backend.build_url_segments(&["api", "play", "btn_1_2"]),
            "http://localhost:8080/api/play/btn_1_2"
        );
        assert_eq!(
            backend.build_url_segments(&["api", "stop-all"]),
            "http://localhost:8080/api/stop-all"
        );
        assert_eq!(
            backend.build_url_segments(&["api", "play", "air horn/2"]),
            "http://localhost:8080/api/play/air%20horn%2F2"
        );
    }
}
