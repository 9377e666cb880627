#![allow(dead_code)]

use async_trait::async_trait;
use bankid::domain::ports::{Operation, Transport, TransportResponse};
use bankid::error::{EngineError, Result};
use bankid::{ChannelSink, EngineSettings, OrderEvent, OrderId, SessionEngine};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;

pub const ORDER_REF: &str = "131daac9-16c6-4618-beb0-365768f37288";
pub const AUTO_START_TOKEN: &str = "7c40b5c9-fa74-49cf-b98c-bfe651f9a7c6";
pub const QR_START_TOKEN: &str = "67df3917-fa0d-44e5-b327-edcc928297f8";
pub const QR_START_SECRET: &str = "d28db9a7-4cde-429e-a983-359be676944c";

/// One scripted answer of the fake service.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, Value),
    Unreachable(String),
}

#[derive(Debug, Clone)]
pub struct Call {
    pub operation: Operation,
    pub body: Value,
    pub at: Instant,
}

/// In-memory stand-in for the remote service.
///
/// Replies are queued per operation; the last one queued keeps being
/// returned once the others are used up.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<Operation, VecDeque<Reply>>>,
    delays: Mutex<HashMap<Operation, Duration>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A service that starts every order and keeps it pending forever.
    pub fn pending_forever() -> Self {
        let transport = Self::new();
        transport.reply(Operation::Auth, start_ok());
        transport.reply(Operation::Sign, start_ok());
        transport.reply(Operation::Collect, pending(""));
        transport.reply(Operation::Cancel, Reply::Json(200, json!({})));
        transport
    }

    pub fn reply(&self, operation: Operation, reply: Reply) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push_back(reply);
        self
    }

    /// Makes every call of `operation` take `delay` before answering.
    pub fn delay(&self, operation: Operation, delay: Duration) -> &Self {
        self.delays.lock().unwrap().insert(operation, delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, operation: Operation) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.operation == operation)
            .collect()
    }

    fn next_reply(&self, operation: Operation) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        let queue = replies.entry(operation).or_default();
        match queue.len() {
            0 => Reply::Unreachable(format!("no reply scripted for {operation}")),
            1 => queue[0].clone(),
            _ => queue.pop_front().unwrap(),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, operation: Operation, body: Vec<u8>) -> Result<TransportResponse> {
        let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
        self.calls.lock().unwrap().push(Call {
            operation,
            body,
            at: Instant::now(),
        });

        let delay = self.delays.lock().unwrap().get(&operation).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_reply(operation) {
            Reply::Json(status, value) => Ok(TransportResponse {
                status,
                body: serde_json::to_vec(&value).unwrap(),
            }),
            Reply::Unreachable(message) => Err(EngineError::TransportError(message)),
        }
    }
}

pub fn start_ok() -> Reply {
    Reply::Json(
        200,
        json!({
            "orderRef": ORDER_REF,
            "autoStartToken": AUTO_START_TOKEN,
            "qrStartToken": QR_START_TOKEN,
            "qrStartSecret": QR_START_SECRET,
        }),
    )
}

pub fn pending(hint: &str) -> Reply {
    Reply::Json(
        200,
        json!({ "orderRef": ORDER_REF, "status": "pending", "hintCode": hint }),
    )
}

pub fn failed(hint: &str) -> Reply {
    Reply::Json(
        200,
        json!({ "orderRef": ORDER_REF, "status": "failed", "hintCode": hint }),
    )
}

pub fn complete(name: &str) -> Reply {
    Reply::Json(
        200,
        json!({
            "orderRef": ORDER_REF,
            "status": "complete",
            "completionData": {
                "user": {
                    "personalNumber": "190000000000",
                    "name": name,
                    "givenName": "Karl",
                    "surname": "Karlsson"
                },
                "device": { "ipAddress": "192.168.0.1" },
                "cert": { "notBefore": "1502983274000", "notAfter": "1563549674000" },
                "signature": "PD94bWwgdmVyc2lvbj0iMS4wIj8+",
                "ocspResponse": "MIIHfgoBAKCCB3cwggdzBgkrBgEFBQcwAQEEggdkMIIHYDCCAT"
            }
        }),
    )
}

pub fn remote_error(status: u16, code: &str, details: &str) -> Reply {
    Reply::Json(status, json!({ "errorCode": code, "details": details }))
}

pub fn engine(
    transport: Arc<ScriptedTransport>,
    settings: EngineSettings,
) -> (SessionEngine, EventStream) {
    let (sink, events) = ChannelSink::new();
    (
        SessionEngine::new(transport, Arc::new(sink), settings),
        EventStream::new(events),
    )
}

/// Event receiver that sets aside events of other orders while waiting for
/// one order, so nothing is lost when orders interleave.
pub struct EventStream {
    rx: UnboundedReceiver<OrderEvent>,
    held: VecDeque<OrderEvent>,
}

impl EventStream {
    pub fn new(rx: UnboundedReceiver<OrderEvent>) -> Self {
        Self {
            rx,
            held: VecDeque::new(),
        }
    }

    pub async fn recv(&mut self) -> Option<OrderEvent> {
        match self.held.pop_front() {
            Some(event) => Some(event),
            None => self.rx.recv().await,
        }
    }

    pub fn try_recv(&mut self) -> std::result::Result<OrderEvent, TryRecvError> {
        match self.held.pop_front() {
            Some(event) => Ok(event),
            None => self.rx.try_recv(),
        }
    }

    /// Waits for the next event of `order_id`.
    pub async fn next_for(&mut self, order_id: &OrderId) -> OrderEvent {
        if let Some(pos) = self.held.iter().position(|e| &e.order_id == order_id) {
            return self.held.remove(pos).unwrap();
        }
        loop {
            let event = tokio::time::timeout(Duration::from_secs(600), self.rx.recv())
                .await
                .expect("timed out waiting for an event")
                .expect("event channel closed");
            if &event.order_id == order_id {
                return event;
            }
            self.held.push_back(event);
        }
    }
}

/// Collects the events of `order_id` up to and including its terminal one.
pub async fn events_until_terminal(events: &mut EventStream, order_id: &OrderId) -> Vec<OrderEvent> {
    let mut seen = Vec::new();
    loop {
        let event = events.next_for(order_id).await;
        let terminal = event.is_terminal();
        seen.push(event);
        if terminal {
            return seen;
        }
    }
}

/// Waits for the next event of `order_id`.
pub async fn next_event(events: &mut EventStream, order_id: &OrderId) -> OrderEvent {
    events.next_for(order_id).await
}
