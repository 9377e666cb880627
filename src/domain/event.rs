use crate::domain::order::OrderId;
use crate::domain::protocol::CompletionData;
use crate::error::EngineError;
use std::fmt;

/// Wire name shared by every internal-error class event.
pub const INTERNAL_ERROR: &str = "error";

/// What happened to an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `start` succeeded; detail carries the autostart token.
    Sent,
    /// The pending hint changed; detail is `"pending"`.
    Hint(String),
    Complete,
    Failed,
    Cancelled,
    /// Transport or protocol failure.
    InternalError,
    /// The service answered with a structured error; the code is passed through.
    Remote(String),
    /// The submission failed validation and was never sent.
    Rejected,
    /// `cancel` named an order that is not (or no longer) registered.
    NotFound,
    /// The pairing code loop died; the order itself carries on.
    PairingFailed,
}

impl EventKind {
    /// Terminal kinds end an order; exactly one is delivered per submission.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete
                | Self::Failed
                | Self::Cancelled
                | Self::InternalError
                | Self::Remote(_)
                | Self::Rejected
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Sent => "sent",
            Self::Hint(code) => code,
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Remote(code) => code,
            Self::PairingFailed => "pairingError",
            Self::InternalError | Self::Rejected | Self::NotFound => INTERNAL_ERROR,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One delivery to the response sink: `(order_id, kind, detail)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub kind: EventKind,
    pub detail: String,
    /// Set on `Complete` only.
    pub completion: Option<CompletionData>,
}

impl OrderEvent {
    pub fn new(order_id: OrderId, kind: EventKind, detail: impl Into<String>) -> Self {
        Self {
            order_id,
            kind,
            detail: detail.into(),
            completion: None,
        }
    }

    pub fn complete(order_id: OrderId, completion: CompletionData) -> Self {
        Self {
            order_id,
            kind: EventKind::Complete,
            detail: completion.user.name.clone(),
            completion: Some(completion),
        }
    }

    /// Maps a failure to the event reported for it.
    pub fn from_error(order_id: OrderId, error: &EngineError) -> Self {
        match error {
            EngineError::RemoteError { code, details } => {
                Self::new(order_id, EventKind::Remote(code.clone()), details.clone())
            }
            EngineError::ValidationError(e) => Self::new(order_id, EventKind::Rejected, e.to_string()),
            EngineError::NotFoundError => Self::new(order_id, EventKind::NotFound, error.to_string()),
            EngineError::TransportError(message) => {
                Self::new(order_id, EventKind::InternalError, message.clone())
            }
            other => Self::new(order_id, EventKind::InternalError, other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}
