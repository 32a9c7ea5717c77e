//! Interpretation of the `/cmd` response body.

use std::fmt;

use serde_json::Value;

/// Discriminator value the server uses to flag an application error.
pub const ERROR_DISCRIMINATOR: &str = "error";

/// Status shown when a submission is accepted.
pub const SUCCESS_STATUS: &str = "Processed command successfully.";

/// A well-formed reply from the command endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// `msg` is anything other than `"error"`.
    Accepted,
    /// `msg == "error"`; carries the `error` field's text.
    Rejected { error: String },
}

impl SubmissionOutcome {
    #[must_use]
    pub fn status_text(&self) -> String {
        match self {
            Self::Accepted => SUCCESS_STATUS.to_string(),
            Self::Rejected { error } => format!("Encountered error: {error}"),
        }
    }
}

/// A submission that never produced a usable reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionFailure {
    /// The request itself failed (network error, aborted fetch, ...).
    Transport(String),
    /// The body was not JSON.
    MalformedReply(String),
}

impl SubmissionFailure {
    #[must_use]
    pub fn status_text(&self) -> String {
        format!("Encountered error: {self}")
    }
}

impl fmt::Display for SubmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(detail) => f.write_str(detail),
            Self::MalformedReply(detail) => write!(f, "malformed reply: {detail}"),
        }
    }
}

impl std::error::Error for SubmissionFailure {}

/// Parse a response body.
///
/// Any JSON value is a well-formed reply; only an object whose `msg` is
/// `"error"` is a rejection. Non-string `error` payloads are rendered as
/// compact JSON.
pub fn parse_reply(body: &str) -> Result<SubmissionOutcome, SubmissionFailure> {
    let value: Value = serde_json::from_str(body)
        .map_err(|error| SubmissionFailure::MalformedReply(error.to_string()))?;

    let is_error = value.get("msg").and_then(Value::as_str) == Some(ERROR_DISCRIMINATOR);
    if !is_error {
        return Ok(SubmissionOutcome::Accepted);
    }

    let error = match value.get("error") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => "unknown error".to_string(),
        Some(other) => other.to_string(),
    };
    Ok(SubmissionOutcome::Rejected { error })
}
