//! Boundary request and response types.
//!
//! These are the JSON shapes exchanged with an HTTP front end:
//!
//! ```json
//! { "document": "# Title\n\n...", "slideCount": 5, "model": "gpt-4o-mini" }
//! { "slides": ["# Title", "...", "", "", ""] }
//! ```
//!
//! Validation lives here rather than in the front end so every caller gets
//! the same rules, checked before any chunking or network I/O.

use crate::config::{ResolvedModel, SplitConfig};
use crate::error::SlidesError;
use serde::{Deserialize, Serialize};

/// Smallest accepted slide count.
pub const MIN_SLIDES: i64 = 1;

/// Largest accepted slide count.
pub const MAX_SLIDES: i64 = 50;

/// A request to split one markdown document into slides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideRequest {
    /// Markdown source. Must not be blank.
    pub document: String,
    /// Requested number of slides, `1..=50`.
    ///
    /// Signed so that `0` or `-3` reach validation and come back as
    /// [`SlidesError::InvalidInput`] instead of a decoding failure.
    pub slide_count: i64,
    /// Registry id of the model to use. `None` selects the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A [`SlideRequest`] that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest<'a> {
    pub document: &'a str,
    pub slide_count: usize,
    pub model: ResolvedModel,
}

impl SlideRequest {
    pub fn new(document: impl Into<String>, slide_count: i64) -> Self {
        Self {
            document: document.into(),
            slide_count,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Parse a request from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, SlidesError> {
        serde_json::from_str(json)
            .map_err(|e| SlidesError::invalid_input(format!("request is not valid JSON: {e}")))
    }

    /// Check the request and resolve its model.
    ///
    /// Order: document, slide count, then model lookup and credential.
    pub fn validate(&self, config: &SplitConfig) -> Result<ValidatedRequest<'_>, SlidesError> {
        if self.document.trim().is_empty() {
            return Err(SlidesError::invalid_input("document is empty"));
        }
        if !(MIN_SLIDES..=MAX_SLIDES).contains(&self.slide_count) {
            return Err(SlidesError::invalid_input(format!(
                "slideCount must be between {MIN_SLIDES} and {MAX_SLIDES}, got {}",
                self.slide_count
            )));
        }

        let model_id = self
            .model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(config.default_model.as_str());
        let model = config.models.resolve(model_id)?;

        Ok(ValidatedRequest {
            document: &self.document,
            slide_count: self.slide_count as usize,
            model,
        })
    }
}

/// The boundary response: exactly `slideCount` slides, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideResponse {
    pub slides: Vec<String>,
}
