//! Rotating pairing codes ("animated QR").
//!
//! Every second a new code is derived from the two values returned by `start`:
//! `bankid.<token>.<step>.<hex(HMAC-SHA256(secret, step))>`, rendered as a QR
//! code. The derivation is pure; [`PairingLoop`] drives it on a timer.

use crate::domain::order::OrderId;
use crate::domain::ports::{PairingCode, PairingSinkHandle};
use crate::error::{EngineError, Result};
use hmac::{Hmac, Mac};
use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub const PAIRING_INTERVAL: Duration = Duration::from_secs(1);
const CONTENT_PREFIX: &str = "bankid";
const QR_MIN_DIMENSION: u32 = 200;

type HmacSha256 = Hmac<Sha256>;

/// Derives the pairing code for any step from a fixed token/secret pair.
pub struct PairingCodeGenerator {
    token: String,
    secret: SecretString,
}

impl PairingCodeGenerator {
    pub fn new(token: impl Into<String>, secret: SecretString) -> Self {
        Self {
            token: token.into(),
            secret,
        }
    }

    /// The text encoded into the QR code for `step`.
    pub fn content(&self, step: u64) -> Result<String> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| EngineError::PairingError(e.to_string()))?;
        mac.update(step.to_string().as_bytes());
        let auth_code = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{CONTENT_PREFIX}.{}.{step}.{auth_code}", self.token))
    }

    pub fn code(&self, step: u64) -> Result<PairingCode> {
        let content = self.content(step)?;
        let qr = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::L)
            .map_err(|e| EngineError::PairingError(e.to_string()))?;
        let svg = qr
            .render::<svg::Color>()
            .min_dimensions(QR_MIN_DIMENSION, QR_MIN_DIMENSION)
            .build();
        Ok(PairingCode { step, content, svg })
    }

    /// Lazily yields the codes for steps 0, 1, 2, ...
    pub fn codes(&self) -> impl Iterator<Item = Result<PairingCode>> + '_ {
        (0u64..).map(|step| self.code(step))
    }
}

/// Background task showing one code per second until stopped.
pub(crate) struct PairingLoop {
    quit: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl PairingLoop {
    /// Starts emitting; the first code is shown one interval from now.
    ///
    /// If a code cannot be produced the loop ends and the error is handed to
    /// `failures`; the owning worker decides what to report.
    pub(crate) fn spawn(
        generator: PairingCodeGenerator,
        order_id: OrderId,
        sink: PairingSinkHandle,
        failures: oneshot::Sender<EngineError>,
    ) -> Self {
        let (quit, mut quit_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(Instant::now() + PAIRING_INTERVAL, PAIRING_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut step = 0u64;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut quit_rx => break,
                    _ = ticker.tick() => match generator.code(step) {
                        Ok(code) => {
                            sink.show(code, &order_id);
                            step += 1;
                        }
                        Err(e) => {
                            tracing::error!(order_id = %order_id, step, "failed to generate pairing code: {e}");
                            let _ = failures.send(e);
                            break;
                        }
                    },
                }
            }
            tracing::debug!(order_id = %order_id, emitted = step, "pairing loop stopped");
        });
        Self { quit, task }
    }

    /// Stops the loop and waits until it can no longer emit.
    pub(crate) async fn stop(self) {
        let _ = self.quit.send(());
        if let Err(e) = self.task.await {
            tracing::warn!("pairing loop ended abnormally: {e}");
        }
    }
}
