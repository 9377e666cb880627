//! The per-order state machine.
//!
//! ```text
//! Submitting ──start ok──▶ Pending ──collect──▶ Complete | Failed | InternalError
//!     │                       │
//!     └─start error──▶ InternalError / Remote   └─cancel signal──▶ Cancelled | InternalError
//! ```
//!
//! A worker is the only writer of its order's state and delivers exactly one
//! terminal event, after the pairing loop has stopped and the registry entry
//! is gone.

use crate::application::pairing::{PairingCodeGenerator, PairingLoop};
use crate::application::registry::{Registry, Ticket};
use crate::domain::event::{EventKind, OrderEvent};
use crate::domain::order::{OrderId, OrderKind, OrderRef};
use crate::domain::ports::{
    Operation, PairingSinkHandle, ResponseSinkHandle, TransportHandle, TransportResponse,
};
use crate::domain::protocol::{
    self, CollectResponse, CollectStatus, OrderRefRequest, StartRequest, StartResponse,
};
use crate::error::{EngineError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

const UNKNOWN_STATUS: &str = "unknown status in response from server";
const PENDING: &str = "pending";

/// What ended a wait between two polls.
enum Wake {
    Elapsed,
    Cancel,
    Pairing(Option<EngineError>),
}

async fn next_failure(rx: Option<&mut oneshot::Receiver<EngineError>>) -> Option<EngineError> {
    match rx {
        Some(rx) => rx.await.ok(),
        None => std::future::pending().await,
    }
}

/// Why the polling loop stopped.
enum Outcome {
    Finished(OrderEvent),
    CancelRequested,
}

pub(crate) struct OrderWorker {
    pub(crate) order_id: OrderId,
    pub(crate) ticket: Ticket,
    pub(crate) kind: OrderKind,
    pub(crate) request: StartRequest,
    pub(crate) transport: TransportHandle,
    pub(crate) sink: ResponseSinkHandle,
    pub(crate) registry: Arc<Registry>,
    pub(crate) poll_interval: Duration,
    pub(crate) pairing_sink: Option<PairingSinkHandle>,
}

impl OrderWorker {
    /// Drives the order to its terminal event.
    pub(crate) async fn run(self) {
        let terminal = match self.start().await {
            Ok(started) => self.follow(started).await,
            Err(e) => {
                tracing::error!(order_id = %self.order_id, "start failed: {e}");
                OrderEvent::from_error(self.order_id.clone(), &e)
            }
        };

        self.registry.release(&self.ticket).await;
        tracing::debug!(order_id = %self.order_id, event = %terminal.kind, "order finished");
        self.sink.deliver(terminal);
    }

    async fn start(&self) -> Result<StartResponse> {
        let body = serde_json::to_vec(&self.request)?;
        let response = self.call(Operation::start(self.kind), body).await?;
        protocol::decode(&response.body)
    }

    /// Pending phase: everything after a successful `start`.
    async fn follow(&self, started: StartResponse) -> OrderEvent {
        let StartResponse {
            order_ref,
            auto_start_token,
            qr_start_token,
            qr_start_secret,
        } = started;

        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        if !self
            .registry
            .activate(&self.ticket, order_ref.clone(), cancel_tx)
            .await
        {
            tracing::debug!(order_id = %self.order_id, "engine closed while starting");
        }

        tracing::debug!(order_id = %self.order_id, order_ref = %order_ref, "order sent");
        self.emit(EventKind::Sent, auto_start_token);

        let (failures_tx, failures_rx) = oneshot::channel();
        let pairing = self.pairing_sink.clone().map(|sink| {
            let generator = PairingCodeGenerator::new(qr_start_token, qr_start_secret);
            PairingLoop::spawn(generator, self.order_id.clone(), sink, failures_tx)
        });
        let mut pairing_failures = pairing.as_ref().map(|_| failures_rx);

        let outcome = self
            .poll(&order_ref, &mut cancel_rx, &mut pairing_failures)
            .await;

        if let Some(pairing) = pairing {
            pairing.stop().await;
            // The loop may have failed while the last call was in flight.
            self.forward_pairing_failure(&mut pairing_failures);
        }

        match outcome {
            Outcome::Finished(event) => event,
            Outcome::CancelRequested => self.cancel(&order_ref).await,
        }
    }

    async fn poll(
        &self,
        order_ref: &OrderRef,
        cancel_rx: &mut oneshot::Receiver<()>,
        pairing_failures: &mut Option<oneshot::Receiver<EngineError>>,
    ) -> Outcome {
        let mut last_hint = String::new();
        loop {
            // A dropped sender counts as a request too: the engine is gone.
            if !matches!(cancel_rx.try_recv(), Err(TryRecvError::Empty)) {
                tracing::debug!(order_id = %self.order_id, "received cancel request");
                return Outcome::CancelRequested;
            }
            self.forward_pairing_failure(pairing_failures);

            let response = match self.collect(order_ref).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(order_id = %self.order_id, order_ref = %order_ref, "collect failed: {e}");
                    return Outcome::Finished(OrderEvent::from_error(self.order_id.clone(), &e));
                }
            };

            match response.status {
                CollectStatus::Pending => {
                    if response.hint_code != last_hint {
                        tracing::debug!(order_id = %self.order_id, hint = %response.hint_code, "hint changed");
                        self.emit(EventKind::Hint(response.hint_code.clone()), PENDING);
                        last_hint = response.hint_code;
                    }
                }
                CollectStatus::Failed => {
                    let hint = if response.hint_code.is_empty() {
                        last_hint
                    } else {
                        response.hint_code
                    };
                    tracing::info!(order_id = %self.order_id, hint = %hint, "order failed");
                    return Outcome::Finished(self.event(EventKind::Failed, hint));
                }
                CollectStatus::Complete => {
                    tracing::info!(order_id = %self.order_id, "order complete");
                    let completion = response.completion_data.unwrap_or_default();
                    return Outcome::Finished(OrderEvent::complete(
                        self.order_id.clone(),
                        completion,
                    ));
                }
                CollectStatus::Unknown(status) => {
                    tracing::warn!(order_id = %self.order_id, status = %status, "unknown status from server");
                    return Outcome::Finished(self.event(EventKind::InternalError, UNKNOWN_STATUS));
                }
            }

            if self.wait(cancel_rx, pairing_failures).await {
                tracing::debug!(order_id = %self.order_id, "received cancel request while waiting");
                return Outcome::CancelRequested;
            }
        }
    }

    /// Sleeps one poll interval. Returns `true` if a cancel request cut it short.
    ///
    /// A pairing failure arriving meanwhile is reported right away.
    async fn wait(
        &self,
        cancel_rx: &mut oneshot::Receiver<()>,
        pairing_failures: &mut Option<oneshot::Receiver<EngineError>>,
    ) -> bool {
        let sleep = tokio::time::sleep(self.poll_interval);
        tokio::pin!(sleep);
        loop {
            let wake = tokio::select! {
                _ = &mut sleep => Wake::Elapsed,
                _ = &mut *cancel_rx => Wake::Cancel,
                failure = next_failure(pairing_failures.as_mut()), if pairing_failures.is_some() => {
                    Wake::Pairing(failure)
                }
            };
            match wake {
                Wake::Elapsed => return false,
                Wake::Cancel => return true,
                Wake::Pairing(failure) => {
                    *pairing_failures = None;
                    if let Some(e) = failure {
                        self.emit(EventKind::PairingFailed, e.to_string());
                    }
                }
            }
        }
    }

    async fn collect(&self, order_ref: &OrderRef) -> Result<CollectResponse> {
        let body = serde_json::to_vec(&OrderRefRequest { order_ref })?;
        let response = self.call(Operation::Collect, body).await?;
        protocol::decode(&response.body)
    }

    /// Asks the service to cancel; the answer decides the terminal event.
    async fn cancel(&self, order_ref: &OrderRef) -> OrderEvent {
        match self.request_cancel(order_ref).await {
            Ok(_) => {
                tracing::info!(order_id = %self.order_id, order_ref = %order_ref, "order cancelled");
                self.event(EventKind::Cancelled, "")
            }
            Err(e) => {
                tracing::error!(order_id = %self.order_id, order_ref = %order_ref, "cancel failed: {e}");
                OrderEvent::from_error(self.order_id.clone(), &e)
            }
        }
    }

    async fn request_cancel(&self, order_ref: &OrderRef) -> Result<TransportResponse> {
        let body = serde_json::to_vec(&OrderRefRequest { order_ref })?;
        self.call(Operation::Cancel, body).await
    }

    /// Sends one request; non-2xx answers become [`EngineError::RemoteError`].
    async fn call(&self, operation: Operation, body: Vec<u8>) -> Result<TransportResponse> {
        let response = self.transport.send(operation, body).await?;
        if !response.is_success() {
            let error = protocol::remote_error(&response.body);
            tracing::warn!(
                order_id = %self.order_id,
                %operation,
                status = response.status,
                "received HTTP error: {error}"
            );
            return Err(error);
        }
        Ok(response)
    }

    fn forward_pairing_failure(&self, failures: &mut Option<oneshot::Receiver<EngineError>>) {
        let Some(rx) = failures.as_mut() else {
            return;
        };
        match rx.try_recv() {
            Ok(e) => {
                self.emit(EventKind::PairingFailed, e.to_string());
                *failures = None;
            }
            Err(TryRecvError::Closed) => *failures = None,
            Err(TryRecvError::Empty) => {}
        }
    }

    fn event(&self, kind: EventKind, detail: impl Into<String>) -> OrderEvent {
        OrderEvent::new(self.order_id.clone(), kind, detail)
    }

    fn emit(&self, kind: EventKind, detail: impl Into<String>) {
        self.sink.deliver(self.event(kind, detail));
    }
}
