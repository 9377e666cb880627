//! Application layer containing the order lifecycle orchestration.
//!
//! This module defines the `SessionEngine`, the primary entry point for
//! starting and cancelling orders. Each order is driven by its own `tokio`
//! task; the engine and its workers share only the transport and a
//! mutex-guarded registry of cancellation channels.

pub mod engine;
pub mod pairing;
pub(crate) mod registry;
pub(crate) mod worker;
