//! Error types for the md2slides library.
//!
//! Every failure is fatal for the request that hit it: a split either
//! returns a complete [`crate::output::SlideSet`] or one [`SlidesError`].
//! There is no partial-success type because half a deck is not something
//! the caller can present.
//!
//! Variants are grouped by [`ErrorKind`] so the HTTP boundary can decide
//! between a client error (bad input, bad configuration) and a server error
//! (transport, provider, malformed model output) without matching on every
//! variant.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the md2slides library.
#[derive(Debug, Error)]
pub enum SlidesError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request failed validation before any network call was made.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    // ── Configuration errors ──────────────────────────────────────────────
    /// The requested model identifier is not in the model registry.
    #[error("Unknown model '{model}'. Known models: {known}")]
    UnknownModel { model: String, known: String },

    /// The model's credential could not be resolved from the environment.
    #[error("No credential for model '{model}'.\nSet the {env_var} environment variable.")]
    MissingCredential { model: String, env_var: String },

    /// Builder or registry validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Transport errors ──────────────────────────────────────────────────
    /// The provider endpoint could not be reached.
    #[error("Failed to reach '{endpoint}': {detail}")]
    Transport { endpoint: String, detail: String },

    /// The provider did not answer within the configured bound.
    #[error("Request to '{endpoint}' timed out after {secs}s\nIncrease --api-timeout.")]
    Timeout { endpoint: String, secs: u64 },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The provider answered with a non-success HTTP status.
    #[error("Provider for model '{model}' returned HTTP {status}: {body}")]
    Provider {
        model: String,
        status: u16,
        body: String,
    },

    // ── Response errors ───────────────────────────────────────────────────
    /// The model's text could not be parsed into a list of sections.
    #[error("Malformed model response: {detail}\nResponse began with: {excerpt:?}")]
    MalformedResponse { detail: String, excerpt: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`SlidesError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Configuration,
    Transport,
    Provider,
    MalformedResponse,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Transport => "transport",
            ErrorKind::Provider => "provider",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SlidesError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SlidesError::InvalidInput { .. } => ErrorKind::InvalidInput,
            SlidesError::UnknownModel { .. }
            | SlidesError::MissingCredential { .. }
            | SlidesError::InvalidConfig(_) => ErrorKind::Configuration,
            SlidesError::Transport { .. } | SlidesError::Timeout { .. } => ErrorKind::Transport,
            SlidesError::Provider { .. } => ErrorKind::Provider,
            SlidesError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            SlidesError::OutputWriteFailed { .. } | SlidesError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// True when the caller, not the service, is at fault.
    ///
    /// The HTTP boundary answers these with a 4xx and everything else with a
    /// generic 5xx.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidInput | ErrorKind::Configuration
        )
    }

    /// Whether a retry policy may reasonably try the same call again.
    ///
    /// Only transport failures, rate limits and 5xx answers qualify; a
    /// response that did not parse will not parse any better the second time.
    pub fn is_retryable(&self) -> bool {
        match self {
            SlidesError::Transport { .. } | SlidesError::Timeout { .. } => true,
            SlidesError::Provider { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        SlidesError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(detail: impl Into<String>, raw: &str) -> Self {
        SlidesError::MalformedResponse {
            detail: detail.into(),
            excerpt: raw.chars().take(200).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_display_includes_status() {
        let e = SlidesError::Provider {
            model: "gpt-4o-mini".into(),
            status: 500,
            body: "upstream exploded".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("500"), "got: {msg}");
        assert!(msg.contains("gpt-4o-mini"));
    }

    #[test]
    fn missing_credential_names_env_var() {
        let e = SlidesError::MissingCredential {
            model: "gpt-4o".into(),
            env_var: "OPENAI_API_KEY".into(),
        };
        assert!(e.to_string().contains("OPENAI_API_KEY"));
        assert_eq!(e.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn client_errors_are_input_and_configuration() {
        assert!(SlidesError::invalid_input("empty").is_client_error());
        assert!(SlidesError::UnknownModel {
            model: "x".into(),
            known: "y".into()
        }
        .is_client_error());
        assert!(SlidesError::InvalidConfig("bad".into()).is_client_error());

        assert!(!SlidesError::Transport {
            endpoint: "http://x".into(),
            detail: "refused".into()
        }
        .is_client_error());
        assert!(!SlidesError::malformed("not json", "oops").is_client_error());
        assert!(!SlidesError::Internal("boom".into()).is_client_error());
    }

    #[test]
    fn timeout_is_a_transport_kind() {
        let e = SlidesError::Timeout {
            endpoint: "http://x".into(),
            secs: 60,
        };
        assert_eq!(e.kind(), ErrorKind::Transport);
        assert!(e.to_string().contains("60s"));
    }

    #[test]
    fn retryable_statuses() {
        let status = |s: u16| SlidesError::Provider {
            model: "m".into(),
            status: s,
            body: String::new(),
        };
        assert!(status(429).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!SlidesError::malformed("bad", "").is_retryable());
    }

    #[test]
    fn malformed_excerpt_is_bounded() {
        let raw = "x".repeat(1000);
        match SlidesError::malformed("bad", &raw) {
            SlidesError::MalformedResponse { excerpt, .. } => assert_eq!(excerpt.len(), 200),
            other => panic!("unexpected {other:?}"),
        }
    }
}
