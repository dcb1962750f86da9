use std::fmt;

use crate::event::Hours;
use crate::model::{OfferId, UserId};

/// Machine-readable error codes for scripted pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InputReadFailed,
    InputParseError,
    UnknownOffer,
    MalformedEvent,
    MissingDuration,
    OutputWriteFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InputReadFailed => "E2001",
            Self::InputParseError => "E2002",
            Self::UnknownOffer => "E3001",
            Self::MalformedEvent => "E3002",
            Self::MissingDuration => "E3003",
            Self::OutputWriteFailed => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InputReadFailed => "Input file could not be read",
            Self::InputParseError => "Input line is not valid JSON",
            Self::UnknownOffer => "Offer missing from catalog",
            Self::MalformedEvent => "Malformed event",
            Self::MissingDuration => "Catalog entry has no usable duration",
            Self::OutputWriteFailed => "Output write failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint surfaced next to the error.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in offertrail.toml and retry."),
            Self::InputReadFailed => Some("Check the path and read permissions."),
            Self::InputParseError => Some("Each input line must be one JSON object."),
            Self::UnknownOffer => {
                Some("The event log and the portfolio disagree; re-export both from the same run.")
            }
            Self::MalformedEvent => {
                Some("Offer events need an offer id; purchase events need an amount.")
            }
            Self::MissingDuration => Some("Every portfolio entry needs a non-negative duration."),
            Self::OutputWriteFailed => Some("Check disk space and write permissions."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Fatal conditions raised by the attribution core.
///
/// Both variants abort the run. The input is static, so a retry on the same
/// data fails identically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributionError {
    /// A receipt references an offer id that is not in the catalog.
    #[error(
        "offer '{offer_id}' received by user '{user_id}' at t={time_received} is not in the catalog"
    )]
    UnknownOffer {
        offer_id: OfferId,
        user_id: UserId,
        time_received: Hours,
    },

    /// An event lacks a field its type requires.
    #[error("malformed event for user '{user_id}'{}: {reason}", line_suffix(*.line))]
    MalformedEvent {
        line: Option<usize>,
        user_id: UserId,
        reason: String,
    },
}

impl AttributionError {
    /// The machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownOffer { .. } => ErrorCode::UnknownOffer,
            Self::MalformedEvent { .. } => ErrorCode::MalformedEvent,
        }
    }
}

/// Errors raised while reading the transcript, portfolio or profile tables.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: invalid JSON: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("line {line}: offer '{offer_id}' has no usable duration")]
    MissingDuration { line: usize, offer_id: OfferId },

    #[error(transparent)]
    Event(#[from] AttributionError),
}

impl IngestError {
    /// The machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::InputReadFailed,
            Self::Json { .. } => ErrorCode::InputParseError,
            Self::Malformed { .. } => ErrorCode::MalformedEvent,
            Self::MissingDuration { .. } => ErrorCode::MissingDuration,
            Self::Event(inner) => inner.code(),
        }
    }
}

fn line_suffix(line: Option<usize>) -> String {
    line.map_or_else(String::new, |n| format!(" (line {n})"))
}
