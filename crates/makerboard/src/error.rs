// crates/makerboard/src/error.rs
use uuid::Uuid;

pub type MarketResult<T> = Result<T, MarketError>;

/// Everything a marketplace operation can fail with.
///
/// None of these mutate state: a rejected operation leaves the job and its
/// offers exactly as they were.
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("not allowed: {0}")]
    Unauthorized(String),

    #[error("{entity} {id} is {status}; cannot {action}")]
    InvalidState {
        entity: &'static str,
        id: Uuid,
        status: &'static str,
        action: &'static str,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("backend error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("malformed row: {0}")]
    MalformedRow(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ValidationError {
    pub fn missing(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    InvalidState,
    NotFound,
    Backend,
}

impl ErrorKind {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "VALIDATION" => Self::Validation,
            "UNAUTHORIZED" => Self::Unauthorized,
            "INVALID_STATE" => Self::InvalidState,
            "NOT_FOUND" => Self::NotFound,
            _ => Self::Backend,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidState => "INVALID_STATE",
            Self::NotFound => "NOT_FOUND",
            Self::Backend => "BACKEND",
        }
    }

    /// Short title shown next to the message in the notice surface.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Validation => "Check your input",
            Self::Unauthorized => "Not allowed",
            Self::InvalidState => "Action unavailable",
            Self::NotFound => "Not found",
            Self::Backend => "Connection error",
        }
    }
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Backend(_) | Self::MalformedRow(_) => ErrorKind::Backend,
        }
    }

    /// Message safe to show a member. Backend details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Unauthorized(reason) => format!("You can't do that: {reason}."),
            Self::InvalidState { entity, status, action, .. } => {
                format!("This {entity} is {status}, so you can't {action} it right now. Refresh and try again.")
            }
            Self::NotFound { entity, .. } => format!("That {entity} no longer exists."),
            Self::Backend(_) | Self::MalformedRow(_) => "Please try again later.".to_string(),
        }
    }

    pub(crate) fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }

    pub(crate) fn job_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "job", id }
    }

    pub(crate) fn offer_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "offer", id }
    }
}
