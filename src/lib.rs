//! Client-side session engine for BankID-style authentication and signing.
//!
//! A [`SessionEngine`] starts orders against the remote service, polls each
//! one from its own task until the end user resolves it, and reports every
//! step through a [`ResponseSink`]. Rotating pairing codes can be requested
//! per order.
//!
//! ```no_run
//! use bankid::{ChannelSink, Config, HttpsTransport, SessionEngine, Submission};
//! use std::sync::Arc;
//!
//! # async fn run() -> bankid::error::Result<()> {
//! let config = Config::load("config.json")?;
//! let transport = Arc::new(HttpsTransport::from_config(&config)?);
//! let (sink, mut events) = ChannelSink::new();
//! let engine = SessionEngine::new(transport, Arc::new(sink), config.engine_settings());
//!
//! let order_id = engine.submit(Submission::new("184.32.45.25")).await;
//! while let Some(event) = events.recv().await {
//!     println!("{}: {} {}", event.order_id, event.kind, event.detail);
//!     if event.order_id == order_id && event.is_terminal() {
//!         break;
//!     }
//! }
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! [`ResponseSink`]: domain::ports::ResponseSink

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod logging;

pub use application::engine::{EngineSettings, PollInterval, SessionEngine, ShutdownPolicy};
pub use config::Config;
pub use domain::event::{EventKind, OrderEvent};
pub use domain::order::{OrderId, Requirements, Submission};
pub use infrastructure::channel::{ChannelPairingSink, ChannelSink};
pub use infrastructure::https::HttpsTransport;
