//! Scripted broker for integration tests.
//!
//! [`spawn_server`] plays the server side of a memory transport: every
//! `sub` frame is answered by the test's responder, keyed by request type
//! and parameters.

#![allow(dead_code)]

use serde_json::{json, Value};
use tokio::task::JoinHandle;

use portfolio_downloader::transport::memory::MemoryPeer;
use portfolio_downloader::ws::MessageOut;

pub enum Reply {
    Answer(Value),
    Error(&'static str),
    /// Never answer.
    Silent,
    /// Drop the connection.
    Close,
}

pub fn spawn_server<F>(mut peer: MemoryPeer, respond: F) -> JoinHandle<MemoryPeer>
where
    F: Fn(&str, &Value) -> Reply + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(frame) = peer.recv().await {
            let Ok(MessageOut::Subscribe { id, body }) = MessageOut::decode(&frame) else {
                continue;
            };
            let request_type = body["type"].as_str().unwrap_or_default().to_string();
            match respond(&request_type, &body) {
                Reply::Answer(v) => {
                    peer.send(format!("{} A {}", id, v));
                }
                Reply::Error(message) => {
                    peer.send(format!(
                        "{} E {}",
                        id,
                        json!({"errors": [{"errorMessage": message}]})
                    ));
                }
                Reply::Silent => {}
                Reply::Close => {
                    peer.close();
                }
            }
        }
        peer
    })
}

pub fn page(items: Vec<Value>, after: Option<&str>) -> Value {
    json!({"items": items, "cursors": {"before": null, "after": after}})
}

/// A transaction list item linking to its detail.
pub fn tx_item(id: &str, event_type: &str, amount: f64, icon: &str) -> Value {
    json!({
        "id": id,
        "timestamp": "2024-03-01T09:30:00.000+0000",
        "title": format!("Title {}", id),
        "subtitle": null,
        "amount": {"currency": "EUR", "value": amount, "fractionDigits": 2},
        "status": "EXECUTED",
        "eventType": event_type,
        "icon": icon,
        "action": {"type": "timelineDetail", "payload": id}
    })
}

/// A detail record with a trade table and one document.
pub fn trade_detail(id: &str, shares: &str, price: &str) -> Value {
    json!({
        "id": id,
        "sections": [
            {"type": "header", "title": "Kauf", "data": {}},
            {"type": "table", "title": "Transaktion", "data": [
                {"title": "Anteile", "detail": {"text": shares, "type": "text"}},
                {"title": "Aktienkurs", "detail": {"text": price, "type": "text"}},
                {"title": "Gebühr", "detail": {"text": "1,00 €", "type": "text"}}
            ]},
            {"type": "documents", "title": "Dokumente", "data": [
                {"id": format!("doc-{}", id), "title": "Abrechnung", "detail": "01.03.2024",
                 "action": {"type": "browserModal", "payload": format!("https://example.invalid/{}", id)}}
            ]}
        ]
    })
}

/// A detail record with documents only.
pub fn cash_detail(id: &str) -> Value {
    json!({"id": id, "sections": [{"type": "header", "title": "Einzahlung", "data": {}}]})
}

pub fn param<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key).and_then(Value::as_str)
}
