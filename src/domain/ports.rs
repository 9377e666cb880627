use super::event::OrderEvent;
use super::order::{OrderId, OrderKind};
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// The remote operations the engine knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Auth,
    Sign,
    Collect,
    Cancel,
}

impl Operation {
    pub fn start(kind: OrderKind) -> Self {
        match kind {
            OrderKind::Authentication => Self::Auth,
            OrderKind::Signature => Self::Sign,
        }
    }

    /// Path segment appended to the service base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Sign => "sign",
            Self::Collect => "collect",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Authenticated request sender shared by every order.
///
/// Implementations must tolerate concurrent calls from many workers. A
/// returned `Err` means the service was not reached; any HTTP answer,
/// successful or not, comes back as a [`TransportResponse`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, operation: Operation, body: Vec<u8>) -> Result<TransportResponse>;
}

pub type TransportHandle = Arc<dyn Transport>;

/// Receives lifecycle events from every worker.
///
/// Called from many tasks at once; events of one order arrive in order.
pub trait ResponseSink: Send + Sync {
    fn deliver(&self, event: OrderEvent);
}

pub type ResponseSinkHandle = Arc<dyn ResponseSink>;

/// One rotating pairing code, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingCode {
    /// Seconds elapsed since the order started, starting at 0.
    pub step: u64,
    /// Text encoded in the QR code.
    pub content: String,
    /// The QR code rendered as an SVG document.
    pub svg: String,
}

/// Receives a fresh pairing code once a second while an order is pending.
pub trait PairingSink: Send + Sync {
    fn show(&self, code: PairingCode, order_id: &OrderId);
}

pub type PairingSinkHandle = Arc<dyn PairingSink>;
