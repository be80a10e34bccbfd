use std::fmt;

use thiserror::Error;

/// Stable classification of a backend rejection
///
/// Callers branch on this instead of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 402: the user's allotted session time is used up
    QuotaExceeded,
    /// 409: the user already has the maximum number of sessions open
    ConcurrencyLimit,
    /// 403: not entitled
    Forbidden,
    /// Any other non-2xx status
    Unclassified,
}

impl ErrorKind {
    /// Signal string shared with the UI layer
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorKind::ConcurrencyLimit => "CONCURRENCY_LIMIT",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::Unclassified => "UNCLASSIFIED",
        }
    }

    /// Classification used when starting a session
    pub fn for_session_start(status: u16) -> Self {
        match status {
            402 => ErrorKind::QuotaExceeded,
            409 => ErrorKind::ConcurrencyLimit,
            403 => ErrorKind::Forbidden,
            _ => ErrorKind::Unclassified,
        }
    }

    /// Classification used for screenshot analysis (only quota is special)
    pub fn for_screenshot(status: u16) -> Self {
        match status {
            402 => ErrorKind::QuotaExceeded,
            _ => ErrorKind::Unclassified,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum SessionApiError {
    /// Classified non-2xx response. Displays as the signal for classified
    /// kinds and as the backend's message for `Unclassified`.
    #[error("{}", rejection_text(.kind, .message))]
    Rejected {
        kind: ErrorKind,
        status: u16,
        message: String,
    },
    /// Unclassified non-2xx response with the raw body
    #[error("API error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed to parse response: {0}")]
    Decode(String),
    #[error("Invalid token format: {0}")]
    InvalidToken(String),
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

fn rejection_text(kind: &ErrorKind, message: &str) -> String {
    match kind {
        ErrorKind::Unclassified => message.to_string(),
        classified => classified.as_str().to_string(),
    }
}

impl SessionApiError {
    /// Rejection kind, if the backend answered with a classified status
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            SessionApiError::Rejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// HTTP status, if a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            SessionApiError::Rejected { status, .. } | SessionApiError::Http { status, .. } => {
                Some(*status)
            }
            SessionApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
