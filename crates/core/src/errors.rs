use thiserror::Error;

use crate::retry::RetryError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("generation output matched no rows of the expected {expected_columns}-column schema ({lines_seen} candidate lines)")]
    MalformedOutput { expected_columns: usize, lines_seen: usize },
    #[error("email notification requires at least one recipient")]
    InvalidRecipients,
    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),
}

/// Failure reported by an external collaborator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("{service} is temporarily unavailable: {message}")]
    Unavailable { service: String, message: String },
    #[error("{service} rejected the request with status {status}: {body}")]
    Rejected { service: String, status: u16, body: String },
    #[error("{service} transport failure: {message}")]
    Transport { service: String, message: String, timed_out: bool },
    #[error("{service} returned an undecodable response: {message}")]
    Decode { service: String, message: String },
    #[error("{service} action `{action}` failed: {message}")]
    ActionFailed { service: String, action: String, message: String },
}

impl IntegrationError {
    pub fn unavailable(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable { service: service.into(), message: message.into() }
    }

    pub fn rejected(service: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Rejected { service: service.into(), status, body: body.into() }
    }

    pub fn decode(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode { service: service.into(), message: message.into() }
    }

    pub fn transport(service: impl Into<String>, message: impl Into<String>, timed_out: bool) -> Self {
        Self::Transport { service: service.into(), message: message.into(), timed_out }
    }

    /// Maps an HTTP status to the matching error: 429 and 5xx overload
    /// conditions are transient, the rest are rejections.
    pub fn from_status(service: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let service = service.into();
        let body = body.into();
        match status {
            429 | 500 | 502 | 503 | 504 => Self::Unavailable {
                service,
                message: format!("status {status}: {body}"),
            },
            _ => Self::Rejected { service, status, body },
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Transport { timed_out, .. } => *timed_out,
            Self::Rejected { .. } | Self::Decode { .. } | Self::ActionFailed { .. } => false,
        }
    }
}

/// Terminal failure of a workflow run. Everything else is reported in the
/// `RunResult`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("research generation failed: {0}")]
    Generation(#[from] RetryError<IntegrationError>),
    #[error(transparent)]
    Parse(#[from] DomainError),
}

impl WorkflowError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Generation(RetryError::Exhausted { .. }) => "generation_exhausted",
            Self::Generation(RetryError::NonRetryable(_)) => "generation_rejected",
            Self::Parse(_) => "malformed_output",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Generation(RetryError::Exhausted { .. }) => {
                "The research provider stayed unavailable. Please retry shortly."
            }
            Self::Generation(RetryError::NonRetryable(_)) => {
                "The research provider rejected the request. Check credentials and model settings."
            }
            Self::Parse(_) => "The research provider returned output that could not be parsed.",
        }
    }
}
