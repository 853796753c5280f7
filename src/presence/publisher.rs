//! Status publisher.
//!
//! Two layers: a pure cooldown decision ([`decide`]) and the HTTP client
//! that PATCHes the chat service's settings resource. The caller owns
//! [`PublishState`] and updates it only after a successful publish.

use reqwest::{header, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use super::token::{self, TokenVerdict};

/// Minimum elapsed time before re-publishing an unchanged status.
pub const PUBLISH_COOLDOWN_MS: i64 = 3_000;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

// ─── Publish decision ─────────────────────────────────────────────────────────

/// Last successfully published status. Process lifetime, never persisted.
#[derive(Debug, Clone, Default)]
pub struct PublishState {
    pub current_status: String,
    pub last_published_ms: i64,
}

impl PublishState {
    /// Record a successful publish of `status` at `now_ms`.
    pub fn mark_published(&mut self, status: &str, now_ms: i64) {
        self.current_status = status.to_string();
        self.last_published_ms = now_ms;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    DuplicateWithinCooldown,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DuplicateWithinCooldown => f.write_str("duplicate-within-cooldown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishDecision {
    Send,
    Skip(SkipReason),
}

/// Should `status` be sent now, given the last published state?
///
/// Re-sending the same status is suppressed inside the cooldown window; a
/// changed status always sends.
pub fn decide(status: &str, state: &PublishState, now_ms: i64) -> PublishDecision {
    if status == state.current_status && now_ms - state.last_published_ms < PUBLISH_COOLDOWN_MS {
        PublishDecision::Skip(SkipReason::DuplicateWithinCooldown)
    } else {
        PublishDecision::Send
    }
}

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("no presence token configured")]
    CredentialMissing,
    #[error("malformed presence token: {verdict}")]
    CredentialMalformed { verdict: TokenVerdict },
    /// 401 from the service — the token is invalid or expired. Surfaced
    /// distinctly so callers can prompt for re-authentication instead of
    /// retrying with the same bad credential.
    #[error("presence token rejected by the service (401)")]
    CredentialRejected,
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),
    #[error("presence API error: HTTP {0}")]
    Remote(StatusCode),
}

// ─── HTTP client ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SettingsResponse {
    custom_status: Option<CustomStatus>,
}

#[derive(Deserialize)]
struct CustomStatus {
    text: Option<String>,
}

/// Client for the presence settings resource.
#[derive(Debug, Clone)]
pub struct PresenceClient {
    http: reqwest::Client,
    api_base: String,
}

impl PresenceClient {
    pub fn new(api_base: impl Into<String>) -> Result<Self, PresenceError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_base: api_base.into(),
        })
    }

    fn settings_url(&self) -> String {
        format!("{}/users/@me/settings", self.api_base)
    }

    /// Check the token shape, then proceed or fail with a credential error.
    fn check_token(token: &str) -> Result<(), PresenceError> {
        if token.is_empty() {
            return Err(PresenceError::CredentialMissing);
        }
        let verdict = token::validate(token);
        if !verdict.permits_publish() {
            return Err(PresenceError::CredentialMalformed { verdict });
        }
        if verdict == TokenVerdict::SegmentTruncated {
            warn!(%verdict, "presence token looks truncated — attempting publish anyway");
        }
        Ok(())
    }

    /// PATCH the custom status text. Success is any 2xx.
    pub async fn set_status(&self, token: &str, status: &str) -> Result<(), PresenceError> {
        Self::check_token(token)?;

        debug!(%status, "publishing presence status");
        let resp = self
            .http
            .patch(self.settings_url())
            .header(header::AUTHORIZATION, token)
            .json(&json!({ "custom_status": { "text": status } }))
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => Err(PresenceError::CredentialRejected),
            s => Err(PresenceError::Remote(s)),
        }
    }

    /// GET the current custom status text, `None` if unset.
    pub async fn current_status(&self, token: &str) -> Result<Option<String>, PresenceError> {
        Self::check_token(token)?;

        let resp = self
            .http
            .get(self.settings_url())
            .header(header::AUTHORIZATION, token)
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => {
                let body: SettingsResponse = resp.json().await?;
                Ok(body.custom_status.and_then(|c| c.text))
            }
            StatusCode::UNAUTHORIZED => Err(PresenceError::CredentialRejected),
            s => Err(PresenceError::Remote(s)),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn state(status: &str, at_ms: i64) -> PublishState {
        PublishState {
            current_status: status.to_string(),
            last_published_ms: at_ms,
        }
    }

    #[test]
    fn duplicate_within_cooldown_is_skipped() {
        let s = state("Coding", 10_000);
        assert_eq!(
            decide("Coding", &s, 11_000),
            PublishDecision::Skip(SkipReason::DuplicateWithinCooldown)
        );
    }

    #[test]
    fn duplicate_after_cooldown_is_sent() {
        let s = state("Coding", 10_000);
        assert_eq!(decide("Coding", &s, 14_000), PublishDecision::Send);
    }

    #[test]
    fn changed_status_sends_immediately() {
        let s = state("Coding", 10_000);
        assert_eq!(decide("Watching YouTube", &s, 10_100), PublishDecision::Send);
    }

    #[test]
    fn fresh_state_always_sends() {
        assert_eq!(decide("Coding", &PublishState::default(), 0), PublishDecision::Send);
    }

    #[test]
    fn empty_token_is_credential_missing() {
        let err = PresenceClient::check_token("").unwrap_err();
        assert!(matches!(err, PresenceError::CredentialMissing));
    }

    #[test]
    fn malformed_token_is_rejected_before_any_network_call() {
        let err = PresenceClient::check_token("way.too.short").unwrap_err();
        assert!(matches!(
            err,
            PresenceError::CredentialMalformed {
                verdict: TokenVerdict::TooShort
            }
        ));
    }
}
