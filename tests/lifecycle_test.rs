mod common;

use bankid::domain::ports::Operation;
use bankid::{EngineSettings, EventKind, OrderId, Submission};
use common::*;
use serde_json::json;
use std::sync::Arc;

const IP: &str = "184.32.45.25";

#[tokio::test(start_paused = true)]
async fn test_unchanged_hint_is_not_repeated() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .reply(Operation::Auth, start_ok())
        .reply(Operation::Collect, pending(""))
        .reply(Operation::Collect, pending(""))
        .reply(Operation::Collect, pending(""))
        .reply(Operation::Collect, complete("Karl Karlsson"));
    let (engine, mut events) = engine(transport.clone(), EngineSettings::default());

    let order_id = engine
        .submit(Submission::new(IP).with_order_id("order-1"))
        .await;
    assert_eq!(order_id, OrderId::from("order-1"));

    let seen = events_until_terminal(&mut events, &order_id).await;
    let kinds: Vec<&EventKind> = seen.iter().map(|e| &e.kind).collect();
    assert_eq!(kinds, vec![&EventKind::Sent, &EventKind::Complete]);
    assert_eq!(seen[0].detail, AUTO_START_TOKEN);
    assert_eq!(seen[1].detail, "Karl Karlsson");

    let completion = seen[1].completion.as_ref().unwrap();
    assert_eq!(completion.user.personal_number, "190000000000");
    assert_eq!(completion.device.ip_address, "192.168.0.1");

    assert_eq!(transport.calls_to(Operation::Collect).len(), 4);
    assert_eq!(engine.active_orders().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_one_event_per_hint_change() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .reply(Operation::Auth, start_ok())
        .reply(Operation::Collect, pending("outstandingTransaction"))
        .reply(Operation::Collect, pending("outstandingTransaction"))
        .reply(Operation::Collect, pending("userSign"))
        .reply(Operation::Collect, pending("userSign"))
        .reply(Operation::Collect, complete("Karl Karlsson"));
    let (engine, mut events) = engine(transport, EngineSettings::default());

    let order_id = engine.submit(Submission::new(IP)).await;
    let seen = events_until_terminal(&mut events, &order_id).await;

    let wire: Vec<(String, String)> = seen
        .iter()
        .map(|e| (e.kind.to_string(), e.detail.clone()))
        .collect();
    assert_eq!(
        wire,
        vec![
            ("sent".to_string(), AUTO_START_TOKEN.to_string()),
            ("outstandingTransaction".to_string(), "pending".to_string()),
            ("userSign".to_string(), "pending".to_string()),
            ("complete".to_string(), "Karl Karlsson".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_reports_hint() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .reply(Operation::Auth, start_ok())
        .reply(Operation::Collect, pending("outstandingTransaction"))
        .reply(Operation::Collect, failed("userCancel"));
    let (engine, mut events) = engine(transport, EngineSettings::default());

    let order_id = engine.submit(Submission::new(IP)).await;
    let seen = events_until_terminal(&mut events, &order_id).await;
    let last = seen.last().unwrap();
    assert_eq!(last.kind, EventKind::Failed);
    assert_eq!(last.detail, "userCancel");
}

#[tokio::test(start_paused = true)]
async fn test_failed_without_hint_falls_back_to_last_seen() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .reply(Operation::Auth, start_ok())
        .reply(Operation::Collect, pending("userSign"))
        .reply(Operation::Collect, failed(""));
    let (engine, mut events) = engine(transport, EngineSettings::default());

    let order_id = engine.submit(Submission::new(IP)).await;
    let seen = events_until_terminal(&mut events, &order_id).await;
    assert_eq!(seen.last().unwrap().kind, EventKind::Failed);
    assert_eq!(seen.last().unwrap().detail, "userSign");
}

#[tokio::test(start_paused = true)]
async fn test_unknown_status_is_internal_error() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.reply(Operation::Auth, start_ok()).reply(
        Operation::Collect,
        Reply::Json(200, json!({ "orderRef": ORDER_REF, "status": "exploded" })),
    );
    let (engine, mut events) = engine(transport, EngineSettings::default());

    let order_id = engine.submit(Submission::new(IP)).await;
    let seen = events_until_terminal(&mut events, &order_id).await;
    let last = seen.last().unwrap();
    assert_eq!(last.kind, EventKind::InternalError);
    assert_eq!(last.kind.to_string(), "error");
    assert_eq!(last.detail, "unknown status in response from server");
}

#[tokio::test(start_paused = true)]
async fn test_remote_error_on_start_is_passed_through() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.reply(
        Operation::Auth,
        remote_error(400, "alreadyInProgress", "Order already in progress for pno"),
    );
    let (engine, mut events) = engine(transport.clone(), EngineSettings::default());

    let order_id = engine.submit(Submission::new(IP)).await;
    let seen = events_until_terminal(&mut events, &order_id).await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, EventKind::Remote("alreadyInProgress".into()));
    assert_eq!(seen[0].kind.to_string(), "alreadyInProgress");
    assert_eq!(seen[0].detail, "Order already in progress for pno");

    assert!(transport.calls_to(Operation::Collect).is_empty());
    assert_eq!(engine.active_orders().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_service_on_start() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.reply(
        Operation::Auth,
        Reply::Unreachable("connection refused".into()),
    );
    let (engine, mut events) = engine(transport, EngineSettings::default());

    let order_id = engine.submit(Submission::new(IP)).await;
    let seen = events_until_terminal(&mut events, &order_id).await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, EventKind::InternalError);
    assert_eq!(seen[0].detail, "connection refused");
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_start_response() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.reply(Operation::Auth, Reply::Json(200, json!(["not", "an", "object"])));
    let (engine, mut events) = engine(transport, EngineSettings::default());

    let order_id = engine.submit(Submission::new(IP)).await;
    let seen = events_until_terminal(&mut events, &order_id).await;
    assert_eq!(seen[0].kind, EventKind::InternalError);
    assert!(seen[0].detail.starts_with("failed to decode server response"));
}

#[tokio::test(start_paused = true)]
async fn test_remote_error_while_pending() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .reply(Operation::Auth, start_ok())
        .reply(Operation::Collect, pending("outstandingTransaction"))
        .reply(
            Operation::Collect,
            remote_error(503, "maintenance", "Service unavailable"),
        );
    let (engine, mut events) = engine(transport, EngineSettings::default());

    let order_id = engine.submit(Submission::new(IP)).await;
    let seen = events_until_terminal(&mut events, &order_id).await;
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[2].kind, EventKind::Remote("maintenance".into()));
    assert_eq!(seen[2].detail, "Service unavailable");
}

#[tokio::test(start_paused = true)]
async fn test_signature_orders_use_sign() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .reply(Operation::Sign, start_ok())
        .reply(Operation::Collect, complete("Karl Karlsson"));
    let (engine, mut events) = engine(transport.clone(), EngineSettings::default());

    let order_id = engine
        .submit(Submission::new(IP).with_visible_data("VGV4dCB0byBzaWdu"))
        .await;
    events_until_terminal(&mut events, &order_id).await;

    let calls = transport.calls();
    assert_eq!(calls[0].operation, Operation::Sign);
    assert_eq!(
        calls[0].body,
        json!({ "endUserIp": IP, "userVisibleData": "VGV4dCB0byBzaWdu" })
    );
    assert_eq!(calls[1].operation, Operation::Collect);
    assert_eq!(calls[1].body, json!({ "orderRef": ORDER_REF }));
}

#[tokio::test(start_paused = true)]
async fn test_generated_order_id() {
    let transport = Arc::new(ScriptedTransport::pending_forever());
    transport.reply(Operation::Collect, complete("Karl Karlsson"));
    let (engine, mut events) = engine(transport, EngineSettings::default());

    let first = engine.submit(Submission::new(IP)).await;
    let second = engine.submit(Submission::new(IP).with_order_id("")).await;
    assert_ne!(first, second);
    assert!(!first.as_str().is_empty());
    assert!(!second.as_str().is_empty());

    assert!(events_until_terminal(&mut events, &first).await.last().unwrap().is_terminal());
}

#[tokio::test(start_paused = true)]
async fn test_order_ref_is_known_while_pending() {
    let transport = Arc::new(ScriptedTransport::pending_forever());
    let (engine, mut events) = engine(transport, EngineSettings::default());

    let order_id = engine.submit(Submission::new(IP)).await;
    let sent = next_event(&mut events, &order_id).await;
    assert_eq!(sent.kind, EventKind::Sent);
    assert_eq!(
        engine.order_ref(&order_id).await.unwrap().as_str(),
        ORDER_REF
    );
    assert_eq!(engine.active_orders().await, 1);
}
