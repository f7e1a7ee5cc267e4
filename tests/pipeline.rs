//! End-to-end handler runs against a scripted in-memory broker.

mod common;

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use common::{cash_detail, page, param, spawn_server, trade_detail, tx_item, Reply};
use portfolio_downloader::error::{HttpError, PortfolioError};
use portfolio_downloader::prelude::*;
use portfolio_downloader::transport::memory;
use portfolio_downloader::ws::MessageOut;

const APPLE: &str = "logos/US0378331005/v2";

async fn client(transport: memory::MemoryTransport) -> PortfolioClient {
    PortfolioClient::builder()
        .locale("de")
        .request_timeout(Duration::from_secs(5))
        .detail_retry(RetryConfig::disabled())
        .build_with_transport(transport)
        .await
        .expect("client should start")
}

fn no_retry() -> HandlerConfig {
    HandlerConfig {
        list: ListConfig {
            retry: RetryConfig::disabled(),
            ..ListConfig::default()
        },
        ..HandlerConfig::default()
    }
}

#[tokio::test]
async fn concurrent_calls_are_never_cross_delivered() {
    const CALLS: usize = 24;
    let (transport, mut peer) = memory::pair();
    let ws = Arc::new(WsClient::start(transport, WsConfig::default()));

    let mut waiters = Vec::new();
    for n in 0..CALLS {
        let expected = format!("e{}", n);
        let id = ws.request("timelineDetailV2", json!({ "id": &expected })).unwrap();
        let ws = Arc::clone(&ws);
        waiters.push(tokio::spawn(async move {
            let frame = ws.await_response(id).await.unwrap();
            assert_eq!(frame.body["echo"], expected, "request {} got another call's answer", id);
        }));
    }

    let mut subs = Vec::new();
    while subs.len() < CALLS {
        let frame = peer.recv().await.unwrap();
        if let Ok(MessageOut::Subscribe { id, body }) = MessageOut::decode(&frame) {
            subs.push((id, body));
        }
    }

    // Shuffled answers, with frames for ids nobody asked for in between.
    subs.shuffle(&mut StdRng::seed_from_u64(7));
    for (n, (id, body)) in subs.iter().enumerate() {
        peer.send(format!("{} A {}", 90_000 + n, json!({ "echo": "stray" })));
        peer.send(format!("{} A {}", id, json!({ "echo": body["id"] })));
    }

    for waiter in waiters {
        waiter.await.unwrap();
    }
    assert_eq!(ws.pending_count(), 0);
}

#[tokio::test]
async fn transactions_follow_cursors_and_build_bundles() {
    let (transport, peer) = memory::pair();
    let _server = spawn_server(peer, |request_type, body| match request_type {
        "timelineTransactions" => match param(body, "after") {
            None => Reply::Answer(page(
                vec![
                    tx_item("t1", "ORDER_EXECUTED", -101.0, APPLE),
                    tx_item("t2", "PAYMENT_INBOUND", 500.0, "logos/bank_transfer/v2"),
                ],
                Some("c1"),
            )),
            Some("c1") => Reply::Answer(page(vec![tx_item("t3", "CREDIT", 1.5, APPLE)], Some("c2"))),
            Some("c2") => Reply::Answer(page(vec![tx_item("t4", "ORDER_EXECUTED", 150.0, APPLE)], None)),
            Some(_) => Reply::Error("unknown cursor"),
        },
        "timelineDetailV2" => match param(body, "id") {
            Some(id @ ("t1" | "t4")) => Reply::Answer(trade_detail(id, "2", "50,00 €")),
            Some(id) => Reply::Answer(cash_detail(id)),
            None => Reply::Error("missing id"),
        },
        _ => Reply::Error("unexpected request"),
    });

    let client = client(transport).await;
    let csv = BufferWriter::new();
    let outputs = TransactionOutputs::in_memory().with_sink(CsvSink::new(csv.clone()));
    let mut handler = TransactionHandler::new(&client, outputs, no_retry()).unwrap();

    let summary = handler.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.requests, 3, "one request per page");
    assert_eq!(summary.last_cursor.as_deref(), Some("c2"));
    assert_eq!(summary.stats.received, 4);
    assert_eq!(summary.stats.delivered, 4);
    assert_eq!(summary.stats.unclassified, 0);

    let text = csv.contents_string();
    let order: Vec<_> = text
        .lines()
        .skip(1)
        .map(|l| l.split(',').nth(2).unwrap().to_string())
        .collect();
    assert_eq!(order, vec!["t1", "t2", "t3", "t4"]);

    let outputs = handler.outputs();
    let t1 = outputs.transactions.find("t1").await.unwrap().unwrap();
    assert_eq!(t1.kind, TransactionKind::Purchase);
    assert_eq!(t1.shares, Some(Decimal::new(2, 0)));
    assert_eq!(t1.rate, Some(Decimal::new(50, 0)));
    assert_eq!(t1.fee, Some(Decimal::new(100, 2)));
    assert_eq!(t1.document_ids, vec!["doc-t1"]);

    let t4 = outputs.transactions.find("t4").await.unwrap().unwrap();
    assert_eq!(t4.kind, TransactionKind::Sale);
    let t3 = outputs.transactions.find("t3").await.unwrap().unwrap();
    assert_eq!(t3.kind, TransactionKind::Dividend);

    assert_eq!(outputs.instruments.list().await.unwrap().len(), 1);
    let docs = outputs.documents.list().await.unwrap();
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|d| d.id == format!("doc-{}", d.owner_id)));
}

#[tokio::test]
async fn unknown_event_type_falls_back_to_unclassified() {
    let (transport, peer) = memory::pair();
    let _server = spawn_server(peer, |request_type, body| match request_type {
        "timelineTransactions" => Reply::Answer(page(
            vec![tx_item("n1", "BRAND_NEW_EVENT", 3.0, "logos/new/v2")],
            None,
        )),
        _ => Reply::Answer(cash_detail(param(body, "id").unwrap_or_default())),
    });

    let client = client(transport).await;
    let mut handler =
        TransactionHandler::new(&client, TransactionOutputs::in_memory(), no_retry()).unwrap();
    let summary = handler.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.stats.unclassified, 1);
    assert_eq!(summary.stats.delivered, 1);
    assert!(!summary.reports[0].classified);
    assert_eq!(summary.reports[0].strategy, "unclassified");

    let stored = handler.outputs().transactions.find("n1").await.unwrap().unwrap();
    assert_eq!(stored.kind, TransactionKind::Unclassified);
    assert_eq!(stored.raw.as_ref().unwrap()["eventType"], "BRAND_NEW_EVENT");
}

#[tokio::test]
async fn one_malformed_event_does_not_stop_the_stream() {
    let mut items: Vec<Value> = (0..5)
        .map(|n| tx_item(&format!("m{}", n), "PAYMENT_INBOUND", 10.0, "logos/x/v2"))
        .collect();
    items[2].as_object_mut().unwrap().remove("timestamp");

    let (transport, peer) = memory::pair();
    let _server = spawn_server(peer, move |request_type, body| match request_type {
        "timelineTransactions" => Reply::Answer(page(items.clone(), None)),
        _ => Reply::Answer(cash_detail(param(body, "id").unwrap_or_default())),
    });

    let client = client(transport).await;
    let mut handler =
        TransactionHandler::new(&client, TransactionOutputs::in_memory(), no_retry()).unwrap();
    let summary = handler.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.stats.received, 5);
    assert_eq!(summary.stats.delivered, 4);
    assert_eq!(summary.stats.failed, 1);

    let failed: Vec<_> = summary.problems().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].sequence, 2);
    assert_eq!(failed[0].state, EventState::Failed);
    assert!(failed[0].failure.as_deref().unwrap().contains("timestamp"));
}

#[tokio::test]
async fn refused_detail_fails_only_its_event() {
    let (transport, peer) = memory::pair();
    let _server = spawn_server(peer, |request_type, body| match request_type {
        "timelineTransactions" => Reply::Answer(page(
            vec![
                tx_item("d1", "PAYMENT_INBOUND", 1.0, "logos/x/v2"),
                tx_item("d2", "PAYMENT_INBOUND", 2.0, "logos/x/v2"),
            ],
            None,
        )),
        _ => match param(body, "id") {
            Some("d1") => Reply::Error("detail not available"),
            Some(id) => Reply::Answer(cash_detail(id)),
            None => Reply::Error("missing id"),
        },
    });

    let client = client(transport).await;
    let mut handler =
        TransactionHandler::new(&client, TransactionOutputs::in_memory(), no_retry()).unwrap();
    let summary = handler.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.stats.failed, 1);
    assert_eq!(summary.stats.delivered, 1);
    assert!(summary.reports[0]
        .failure
        .as_deref()
        .unwrap()
        .contains("detail not available"));
}

#[tokio::test]
async fn dropped_connection_reports_last_cursor() {
    let (transport, peer) = memory::pair();
    let _server = spawn_server(peer, |request_type, body| match request_type {
        "timelineTransactions" => match param(body, "after") {
            None => Reply::Answer(page(
                vec![tx_item("p1", "PAYMENT_INBOUND", 1.0, "logos/x/v2")],
                Some("c1"),
            )),
            _ => Reply::Close,
        },
        _ => Reply::Answer(cash_detail(param(body, "id").unwrap_or_default())),
    });

    let client = client(transport).await;
    let mut handler =
        TransactionHandler::new(&client, TransactionOutputs::in_memory(), no_retry()).unwrap();
    let failure = handler.run(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(failure.stream, "transactions");
    assert_eq!(failure.last_cursor.as_deref(), Some("c1"));
    assert!(matches!(*failure.cause, PortfolioError::Ws(_)));
    // The event from the first page was delivered before the failure.
    assert!(handler.outputs().transactions.find("p1").await.unwrap().is_some());
}

#[tokio::test]
async fn repeated_failures_of_one_type_end_the_stream() {
    let items: Vec<Value> = (0..6)
        .map(|n| json!({"id": format!("s{}", n), "eventType": "PAYMENT_INBOUND"}))
        .collect();
    let (transport, peer) = memory::pair();
    let _server = spawn_server(peer, move |_, _| Reply::Answer(page(items.clone(), None)));

    let client = client(transport).await;
    let config = HandlerConfig {
        failure_policy: FailurePolicy {
            max_consecutive_per_tag: 3,
            ..FailurePolicy::default()
        },
        ..no_retry()
    };
    let mut handler = TransactionHandler::new(&client, TransactionOutputs::in_memory(), config).unwrap();
    let failure = handler.run(&CancellationToken::new()).await.unwrap_err();

    match *failure.cause {
        PortfolioError::Systemic(ref message) => assert!(message.contains("PAYMENT_INBOUND")),
        ref other => panic!("expected systemic failure, got {:?}", other),
    }
}

#[tokio::test]
async fn cancellation_stops_the_stream() {
    let (transport, peer) = memory::pair();
    let _server = spawn_server(peer, |_, _| Reply::Silent);

    let client = client(transport).await;
    let mut handler =
        TransactionHandler::new(&client, TransactionOutputs::in_memory(), no_retry()).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let failure = handler.run(&cancel).await.unwrap_err();
    assert!(matches!(
        *failure.cause,
        PortfolioError::Ws(WsError::Cancelled(_))
    ));
    assert_eq!(failure.last_cursor, None);
    assert_eq!(client.ws().pending_count(), 0);
}

#[tokio::test]
async fn activity_log_links_documents_to_activities() {
    let (transport, peer) = memory::pair();
    let _server = spawn_server(peer, |request_type, body| match request_type {
        "timelineActivityLog" => Reply::Answer(page(
            vec![
                json!({"id": "a1", "timestamp": "2024-04-01T08:00:00.000+0000", "title": "Quartalsbericht",
                       "eventType": "QUARTERLY_REPORT", "action": {"type": "timelineDetail", "payload": "a1"}}),
                json!({"id": "a2", "timestamp": "2024-04-02T08:00:00.000+0000", "title": "Gerät zurückgesetzt",
                       "eventType": "DEVICE_RESET"}),
            ],
            None,
        )),
        "timelineDetailV2" if param(body, "id") == Some("a1") => Reply::Answer(json!({
            "id": "a1",
            "sections": [{"type": "documents", "data": [{"id": "q1", "title": "Bericht", "detail": "31.03.2024"}]}]
        })),
        _ => Reply::Error("unexpected request"),
    });

    let client = client(transport).await;
    let csv = BufferWriter::new();
    let outputs = ActivityOutputs::in_memory().with_sink(CsvSink::new(csv.clone()));
    let mut handler = ActivityHandler::new(&client, outputs, no_retry()).unwrap();
    let summary = handler.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.stats.delivered, 2);
    let a1 = handler.outputs().activities.find("a1").await.unwrap().unwrap();
    assert_eq!(a1.kind, ActivityKind::Document);
    assert_eq!(a1.document_ids, vec!["q1"]);
    let doc = handler.outputs().documents.find("q1").await.unwrap().unwrap();
    assert_eq!(doc.owner_id.as_str(), "a1");
    assert_eq!(csv.contents_string().lines().count(), 3);
}

/// Hands out fixed bytes, refusing urls that end in `missing`.
#[derive(Default)]
struct StubFetcher {
    fetched: std::sync::Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl DocumentFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        self.fetched.lock().unwrap().push(url.to_string());
        if url.ends_with("missing") {
            return Err(HttpError::NotFound(url.to_string()));
        }
        Ok(b"%PDF-1.4".to_vec())
    }
}

#[tokio::test]
async fn transaction_documents_are_downloaded_once() {
    let (transport, peer) = memory::pair();
    let _server = spawn_server(peer, |request_type, body| match request_type {
        "timelineTransactions" => Reply::Answer(page(vec![tx_item("t1", "ORDER_EXECUTED", -101.0, APPLE)], None)),
        "timelineDetailV2" => Reply::Answer(trade_detail(param(body, "id").unwrap_or("?"), "2", "50,00 €")),
        _ => Reply::Error("unexpected request"),
    });

    let client = client(transport).await;
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(StubFetcher::default());
    let downloader = Arc::new(Downloader::new(fetcher.clone(), dir.path()));

    for _ in 0..2 {
        let outputs = TransactionOutputs::in_memory().with_downloader(Arc::clone(&downloader));
        let mut handler = TransactionHandler::new(&client, outputs, no_retry()).unwrap();
        let summary = handler.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.stats.delivered, 1);
    }

    let saved = dir.path().join("2024").join("03").join("2024-03-01_Abrechnung_doc-t1.pdf");
    assert_eq!(std::fs::read(saved).unwrap(), b"%PDF-1.4");
    assert_eq!(*fetcher.fetched.lock().unwrap(), vec!["https://example.invalid/t1"]);
}

#[tokio::test]
async fn failed_download_keeps_the_event_built() {
    let (transport, peer) = memory::pair();
    let _server = spawn_server(peer, |request_type, _| match request_type {
        "timelineTransactions" => Reply::Answer(page(vec![tx_item("missing", "ORDER_EXECUTED", -101.0, APPLE)], None)),
        "timelineDetailV2" => Reply::Answer(trade_detail("missing", "2", "50,00 €")),
        _ => Reply::Error("unexpected request"),
    });

    let client = client(transport).await;
    let dir = tempfile::tempdir().unwrap();
    let downloader = Arc::new(Downloader::new(Arc::new(StubFetcher::default()), dir.path()));
    let outputs = TransactionOutputs::in_memory().with_downloader(downloader);
    let mut handler = TransactionHandler::new(&client, outputs, no_retry()).unwrap();
    let summary = handler.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.stats.delivery_errors, 1);
    assert_eq!(summary.problems().next().unwrap().state, EventState::Built);
    assert!(handler.outputs().transactions.find("missing").await.unwrap().is_some());
}
