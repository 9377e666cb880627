use crate::domain::event::OrderEvent;
use crate::domain::order::OrderId;
use crate::domain::ports::{PairingCode, PairingSink, ResponseSink};
use tokio::sync::mpsc;

/// A response sink that queues every event on an unbounded channel.
///
/// All workers push into the same queue, so a single consumer sees the events
/// of each order in the order they happened. Events are dropped once the
/// receiver is gone.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OrderEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OrderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ResponseSink for ChannelSink {
    fn deliver(&self, event: OrderEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!(order_id = %e.0.order_id, "event dropped, receiver closed");
        }
    }
}

/// A pairing sink backed by an unbounded channel.
#[derive(Clone)]
pub struct ChannelPairingSink {
    tx: mpsc::UnboundedSender<(PairingCode, OrderId)>,
}

impl ChannelPairingSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(PairingCode, OrderId)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PairingSink for ChannelPairingSink {
    fn show(&self, code: PairingCode, order_id: &OrderId) {
        if self.tx.send((code, order_id.clone())).is_err() {
            tracing::warn!(order_id = %order_id, "pairing code dropped, receiver closed");
        }
    }
}
