//! Outcome model: what a round produces.

use serde::{Deserialize, Serialize};

/// Page served when the generation service answered with something that is
/// not the expected `{"html": ...}` object.
pub const FALLBACK_PAGE: &str = "<html><body>Error generating content.</body></html>";

/// The single self-contained page produced for a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub html: String,

    /// True when `html` is the fallback page rather than generated content.
    #[serde(default)]
    pub fallback: bool,
}

impl GeneratedDocument {
    pub fn generated(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            fallback: false,
        }
    }

    pub fn fallback() -> Self {
        Self {
            html: FALLBACK_PAGE.to_string(),
            fallback: true,
        }
    }
}

/// Result of a successfully completed round.
///
/// `pages_url` is `None` when hosting could not be enabled or read back;
/// `notified` is false when there was no callback or every attempt failed.
/// Neither makes the round fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundReport {
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: Option<String>,
    pub notified: bool,
    pub fallback_document: bool,
}
