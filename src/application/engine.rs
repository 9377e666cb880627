use crate::application::registry::Registry;
use crate::application::worker::OrderWorker;
use crate::domain::event::{EventKind, OrderEvent};
use crate::domain::order::{OrderId, OrderRef, Submission};
use crate::domain::ports::{ResponseSinkHandle, TransportHandle};
use crate::domain::protocol::StartRequest;
use crate::domain::validation::validate_submission;
use crate::error::{EngineError, ValidationError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Lowest accepted delay between two `collect` calls for the same order.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Delay between `collect` calls, never below [`MIN_POLL_INTERVAL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollInterval(Duration);

impl PollInterval {
    /// Values under the floor are raised to it.
    pub fn new(interval: Duration) -> Self {
        Self(interval.max(MIN_POLL_INTERVAL))
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    pub fn get(self) -> Duration {
        self.0
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        Self(MIN_POLL_INTERVAL)
    }
}

/// What [`SessionEngine::shutdown`] does about workers still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// Signal cancellation and return at once.
    #[default]
    Detach,
    /// Signal cancellation, then wait up to the given grace period for the
    /// workers to deliver their terminal events.
    Drain(Duration),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSettings {
    pub poll_interval: PollInterval,
    pub shutdown: ShutdownPolicy,
}

/// Entry point for callers: starts, cancels and tears down orders.
///
/// Every order runs in its own tokio task. The engine itself only owns the
/// registry of cancellable orders and the handles of the spawned workers;
/// results travel exclusively through the response sink.
///
/// Orders have no overall deadline: one the user never answers stays pending
/// until the service gives up on it or the caller cancels it.
pub struct SessionEngine {
    transport: TransportHandle,
    sink: ResponseSinkHandle,
    registry: Arc<Registry>,
    settings: EngineSettings,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionEngine {
    /// Creates a new `SessionEngine`.
    ///
    /// # Arguments
    ///
    /// * `transport` - Authenticated sender shared by all orders.
    /// * `sink` - Receives every event of every order.
    /// * `settings` - Poll interval and shutdown behaviour.
    pub fn new(
        transport: TransportHandle,
        sink: ResponseSinkHandle,
        settings: EngineSettings,
    ) -> Self {
        Self {
            transport,
            sink,
            registry: Arc::new(Registry::new()),
            settings,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Starts an order and returns its id without waiting for any outcome.
    ///
    /// Invalid submissions get a single [`EventKind::Rejected`] event and
    /// nothing is spawned. An id supplied by the caller must not belong to an
    /// order that is still running.
    pub async fn submit(&self, submission: Submission) -> OrderId {
        let order_id = submission
            .order_id
            .clone()
            .filter(|id| !id.as_str().is_empty())
            .unwrap_or_else(OrderId::generate);

        if let Err(e) = validate_submission(&submission) {
            tracing::warn!(order_id = %order_id, "rejected submission: {e}");
            self.sink
                .deliver(OrderEvent::from_error(order_id.clone(), &e.into()));
            return order_id;
        }

        let Some(ticket) = self.registry.reserve(&order_id).await else {
            tracing::warn!(order_id = %order_id, "order id already in use");
            let error = EngineError::from(ValidationError::OrderIdInUse(order_id.to_string()));
            self.sink
                .deliver(OrderEvent::from_error(order_id.clone(), &error));
            return order_id;
        };

        let worker = OrderWorker {
            order_id: order_id.clone(),
            ticket,
            kind: submission.kind(),
            request: StartRequest::from_submission(&submission),
            transport: Arc::clone(&self.transport),
            sink: Arc::clone(&self.sink),
            registry: Arc::clone(&self.registry),
            poll_interval: self.settings.poll_interval.get(),
            pairing_sink: submission.pairing_sink,
        };
        tracing::debug!(order_id = %order_id, kind = ?worker.kind, "new request to send");

        let handle = tokio::spawn(worker.run());
        if let Ok(mut workers) = self.workers.lock() {
            workers.retain(|h| !h.is_finished());
            workers.push(handle);
        }
        order_id
    }

    /// Requests cancellation of a pending order.
    ///
    /// Unknown, not yet started and already finished ids produce a
    /// [`EventKind::NotFound`] event and nothing else.
    pub async fn cancel(&self, order_id: &OrderId) {
        match self.registry.take_active(order_id).await {
            Some((order_ref, cancel)) => {
                tracing::debug!(order_id = %order_id, order_ref = %order_ref, "cancelling order");
                // The worker may have finished in between; nothing to signal then.
                let _ = cancel.send(());
            }
            None => {
                tracing::warn!(order_id = %order_id, "could not cancel order: not found");
                self.sink
                    .deliver(OrderEvent::from_error(order_id.clone(), &EngineError::NotFoundError));
            }
        }
    }

    /// The service reference of a pending order, if it has one.
    pub async fn order_ref(&self, order_id: &OrderId) -> Option<OrderRef> {
        self.registry.order_ref(order_id).await
    }

    /// Orders submitted and not yet finished.
    pub async fn active_orders(&self) -> usize {
        self.registry.len().await
    }

    /// Cancels every order still registered and releases the transport.
    ///
    /// Orders whose `start` is still in flight are cancelled as soon as it
    /// returns. With [`ShutdownPolicy::Drain`] the call waits, up to the grace
    /// period, for all workers to deliver their terminal events.
    pub async fn shutdown(self) {
        let pending = self.registry.close().await;
        tracing::info!(orders = pending.len(), "shutting down");
        for (order_id, cancel) in pending {
            tracing::debug!(order_id = %order_id, "cancelling order on shutdown");
            let _ = cancel.send(());
        }

        let workers = match self.workers.into_inner() {
            Ok(workers) => workers,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let ShutdownPolicy::Drain(grace) = self.settings.shutdown {
            let drain = async {
                for worker in workers {
                    if let Err(e) = worker.await {
                        tracing::error!("order worker failed: {e}");
                    }
                }
            };
            if tokio::time::timeout(grace, drain).await.is_err() {
                tracing::warn!(?grace, "workers still running after shutdown grace period");
            }
        }
    }
}
