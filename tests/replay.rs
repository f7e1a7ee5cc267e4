//! Record/replay round trips and timeout behaviour.

mod common;

use std::time::Duration;

use serde_json::json;

use common::{cash_detail, page, param, spawn_server, trade_detail, tx_item, Reply};
use portfolio_downloader::prelude::*;
use portfolio_downloader::transport::memory;
use portfolio_downloader::ws::MessageOut;

fn scripted(request_type: &str, body: &serde_json::Value) -> Reply {
    match request_type {
        "timelineTransactions" => match param(body, "after") {
            None => Reply::Answer(page(
                vec![
                    tx_item("r1", "ORDER_EXECUTED", -80.25, "logos/IE00B4L5Y983/v2"),
                    tx_item("r2", "PAYMENT_INBOUND", 1000.0, "logos/bank_transfer/v2"),
                ],
                Some("next"),
            )),
            Some(_) => Reply::Answer(page(
                vec![tx_item("r3", "SOMETHING_NEW", 4.0, "logos/x/v2")],
                None,
            )),
        },
        "timelineDetailV2" => match param(body, "id") {
            Some("r1") => Reply::Answer(trade_detail("r1", "1,5", "53,50 €")),
            Some(id) => Reply::Answer(cash_detail(id)),
            None => Reply::Error("missing id"),
        },
        _ => Reply::Error("unexpected request"),
    }
}

/// Run the transactions stream over `transport`; returns CSV and JSON-lines output.
async fn export(transport: impl Transport) -> (String, String) {
    let client = PortfolioClient::builder()
        .locale("de")
        .session_token(SessionToken::new("session-abc"))
        .build_with_transport(transport)
        .await
        .unwrap();

    let csv = BufferWriter::new();
    let jsonl = BufferWriter::new();
    let outputs = TransactionOutputs::in_memory()
        .with_sink(CsvSink::new(csv.clone()))
        .with_sink(JsonLinesSink::new(jsonl.clone()));
    let mut handler = TransactionHandler::new(&client, outputs, HandlerConfig::default()).unwrap();
    let summary = handler.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.stats.delivered, 3);

    (csv.contents_string(), jsonl.contents_string())
}

#[tokio::test]
async fn replaying_a_recording_is_byte_identical() {
    let (transport, peer) = memory::pair();
    let _server = spawn_server(peer, scripted);

    let recording = BufferWriter::new();
    let live = export(Recorder::new(transport, recording.clone())).await;

    let capture = recording.contents_string();
    assert!(!capture.contains("session-abc"), "token must not be recorded");

    let first = export(ReplayTransport::parse(&capture).unwrap()).await;
    let second = export(ReplayTransport::parse(&capture).unwrap()).await;

    assert_eq!(first, second);
    assert_eq!(first, live);
    assert_eq!(first.0.lines().count(), 4);
}

#[tokio::test]
async fn replay_answers_unrecorded_requests_with_an_error() {
    let replay = ReplayTransport::parse("").unwrap();
    let ws = WsClient::start(replay, WsConfig::default());

    let err = ws
        .call("timelineDetailV2", json!({"id": "never-recorded"}))
        .await
        .unwrap_err();
    assert!(matches!(err, WsError::Server { .. }));
}

#[tokio::test]
async fn late_frame_after_timeout_is_dropped() {
    let (transport, mut peer) = memory::pair();
    let ws = WsClient::start(
        transport,
        WsConfig {
            request_timeout: Duration::from_millis(50),
            ..WsConfig::default()
        },
    );

    let late = ws.request("timelineDetailV2", json!({"id": "slow"})).unwrap();
    let err = ws.await_response(late).await.unwrap_err();
    assert!(matches!(err, WsError::Timeout { id, .. } if id == late));
    assert_eq!(ws.pending_count(), 0);

    // The abandoned call is unsubscribed.
    let unsub = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            let frame = peer.recv().await.unwrap();
            if let Ok(MessageOut::Unsubscribe { id }) = MessageOut::decode(&frame) {
                return id;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(unsub, late);

    // A late answer for the old id reaches nobody; a fresh call still works.
    peer.send(format!("{} A {}", late, json!({"stale": true})));
    let fresh = ws.request("timelineDetailV2", json!({"id": "fast"})).unwrap();
    assert!(fresh.get() > late.get());
    peer.send(format!("{} A {}", fresh, json!({"fresh": true})));

    let frame = ws.await_response(fresh).await.unwrap();
    assert_eq!(frame.body, json!({"fresh": true}));
    assert!(matches!(
        ws.await_response(late).await,
        Err(WsError::UnknownRequest(_))
    ));
}
