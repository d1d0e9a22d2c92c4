use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use vibecraft_bridge::{ClientBridge, MockConnector, MockEvent, MockReply};
use vibecraft_core::config::{BridgeConfig, WorldEditConfig, WorldEditMode};
use vibecraft_core::Error;

fn ok_reply(request: &Value, result: Value) -> MockReply {
    MockReply::json(json!({"id": request["id"], "ok": true, "result": result}))
}

fn bridge(mock: &Arc<MockConnector>, config: BridgeConfig) -> ClientBridge {
    ClientBridge::new(mock.clone(), &config, WorldEditConfig::default())
}

#[tokio::test]
async fn test_out_of_order_responses_reach_their_callers() {
    let mock = Arc::new(MockConnector::new(|request: &Value| {
        let delay = if request["type"] == "region.scan" { 80 } else { 0 };
        vec![ok_reply(request, json!({"answer_to": request["type"]}))
            .after(Duration::from_millis(delay))]
    }));
    let bridge = bridge(&mock, BridgeConfig::default());

    let (slow, fast) = tokio::join!(
        bridge.request("region.scan", json!({})),
        bridge.request("server.info", json!({})),
    );
    assert_eq!(slow.unwrap().result.unwrap()["answer_to"], "region.scan");
    assert_eq!(fast.unwrap().result.unwrap()["answer_to"], "server.info");

    // the fast answer went out first
    let delivered: Vec<MockEvent> = mock
        .events()
        .into_iter()
        .filter(|e| matches!(e, MockEvent::Delivered { .. }))
        .collect();
    let sent = mock.sent();
    let fast_id = sent
        .iter()
        .find(|r| r["type"] == "server.info")
        .and_then(|r| r["id"].as_str())
        .unwrap()
        .to_owned();
    assert_eq!(delivered[0], MockEvent::Delivered { id: fast_id });
    assert_eq!(mock.connect_count(), 1);
    assert_eq!(bridge.pending_requests().await, 0);
}

#[tokio::test]
async fn test_unsolicited_message_lands_in_inbox() {
    let mock = Arc::new(MockConnector::new(|request: &Value| {
        vec![ok_reply(request, json!("done"))]
    }));
    let bridge = bridge(&mock, BridgeConfig::default());

    assert_eq!(bridge.execute_command("list").await.unwrap(), "done");
    assert!(mock.push(json!({"type": "chat", "payload": {"message": "hi"}})));
    assert_eq!(bridge.execute_command("//set stone").await.unwrap(), "done");

    let inbox = bridge.drain_inbox();
    assert_eq!(inbox, vec![json!({"type": "chat", "payload": {"message": "hi"}})]);
    assert!(bridge.drain_inbox().is_empty());

    let commands: Vec<Value> = mock
        .sent()
        .iter()
        .map(|r| r["payload"]["command"].clone())
        .collect();
    assert_eq!(commands, vec![json!("/list"), json!("//set stone")]);
}

#[tokio::test]
async fn test_inbox_keeps_newest_messages() {
    let mock = Arc::new(MockConnector::echo());
    let config = BridgeConfig {
        inbox_capacity: 3,
        ..BridgeConfig::default()
    };
    let bridge = bridge(&mock, config);

    bridge.request("hello", json!({})).await.unwrap();
    for n in 0..5 {
        mock.push(json!({ "n": n }));
    }
    // replies are ordered after the pushes on the same connection
    bridge.request("hello", json!({})).await.unwrap();

    assert_eq!(
        bridge.drain_inbox(),
        vec![json!({"n": 2}), json!({"n": 3}), json!({"n": 4})]
    );
}

#[tokio::test]
async fn test_commands_never_overlap() {
    let mock = Arc::new(MockConnector::new(|request: &Value| {
        vec![ok_reply(request, json!("")).after(Duration::from_millis(30))]
    }));
    let bridge = bridge(&mock, BridgeConfig::default());

    let (a, b, c) = tokio::join!(
        bridge.execute_command("/say one"),
        bridge.execute_command("/say two"),
        bridge.execute_command("/say three"),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    let events = mock.events();
    assert_eq!(events.len(), 6);
    for pair in events.chunks(2) {
        match (&pair[0], &pair[1]) {
            (MockEvent::Sent { id: sent, .. }, MockEvent::Delivered { id: delivered }) => {
                assert_eq!(sent, delivered)
            }
            other => panic!("commands interleaved: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_connect_failure_opens_backoff_window() {
    let mock = Arc::new(MockConnector::echo());
    mock.fail_next(1);
    let bridge = bridge(&mock, BridgeConfig::default());

    let err = bridge.request("hello", json!({})).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Connection error: Failed to connect to client bridge at mock://client: connection refused"
    );

    let err = bridge.request("hello", json!({})).await.unwrap_err();
    match err {
        Error::BackoffActive { failures, remaining_secs } => {
            assert_eq!(failures, 1);
            assert!(remaining_secs > 0.0 && remaining_secs <= 1.25);
        }
        other => panic!("expected backoff, got {:?}", other),
    }
    assert_eq!(mock.connect_count(), 0);

    let status = bridge.backoff_status().await;
    assert!(status.in_backoff);
    assert_eq!(status.consecutive_failures, 1);

    bridge.reset_backoff().await;
    assert!(bridge.request("hello", json!({})).await.unwrap().ok);
    assert_eq!(mock.connect_count(), 1);
    assert!(!bridge.backoff_status().await.in_backoff);
}

#[tokio::test]
async fn test_worldedit_policy_rejects_before_transport() {
    let mock = Arc::new(MockConnector::echo());
    let worldedit = WorldEditConfig {
        mode: WorldEditMode::Off,
        ..WorldEditConfig::default()
    };
    let bridge = ClientBridge::new(mock.clone(), &BridgeConfig::default(), worldedit);

    let err = bridge.execute_command("//set stone").await.unwrap_err();
    assert_eq!(err.to_string(), "Protocol error: WorldEdit is disabled by configuration.");
    let err = bridge.execute_command("/pos1").await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert_eq!(mock.connect_count(), 0);
    assert!(mock.sent().is_empty());

    assert!(bridge.execute_command("/time set day").await.is_ok());
    assert_eq!(mock.connect_count(), 1);
}

#[tokio::test]
async fn test_timeout_drops_connection() {
    let mock = Arc::new(MockConnector::new(|request: &Value| {
        if request["type"] == "region.scan" {
            Vec::new()
        } else {
            vec![ok_reply(request, json!({}))]
        }
    }));
    let config = BridgeConfig {
        timeout_secs: 0.2,
        ..BridgeConfig::default()
    };
    let bridge = bridge(&mock, config);

    let err = bridge.request("region.scan", json!({})).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
    assert_eq!(
        err.to_string(),
        "Timeout: Client bridge timed out waiting for response to region.scan"
    );
    assert!(!bridge.is_connected().await);

    assert!(bridge.request("hello", json!({})).await.unwrap().ok);
    assert_eq!(mock.connect_count(), 2);
}

#[tokio::test]
async fn test_stuck_write_is_bounded_by_deadline() {
    let mock = Arc::new(MockConnector::echo());
    let config = BridgeConfig {
        timeout_secs: 0.2,
        ..BridgeConfig::default()
    };
    let bridge = bridge(&mock, config);
    mock.stall_sends(true);

    let started = std::time::Instant::now();
    let err = tokio::time::timeout(Duration::from_secs(5), bridge.request("hello", json!({})))
        .await
        .expect("request outlived its deadline")
        .unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(err.to_string(), "Timeout: Client bridge timed out sending hello");
    assert!(!bridge.is_connected().await);
    assert!(mock.sent().is_empty());

    mock.stall_sends(false);
    assert!(bridge.request("hello", json!({})).await.unwrap().ok);
    assert_eq!(mock.connect_count(), 2);
}

#[tokio::test]
async fn test_invalid_json_is_protocol_error_and_reconnects() {
    let mock = Arc::new(MockConnector::new(|request: &Value| {
        if request["type"] == "region.scan" {
            vec![MockReply::raw("this is not json")]
        } else {
            vec![ok_reply(request, json!({}))]
        }
    }));
    let bridge = bridge(&mock, BridgeConfig::default());

    let err = bridge.request("region.scan", json!({})).await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert!(err.to_string().contains("Invalid JSON response"));

    assert!(bridge.request("hello", json!({})).await.is_ok());
    assert_eq!(mock.connect_count(), 2);
}

#[tokio::test]
async fn test_peer_close_fails_in_flight_request() {
    let mock = Arc::new(MockConnector::silent());
    let bridge = Arc::new(bridge(&mock, BridgeConfig::default()));

    let in_flight = {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.request("region.scan", json!({})).await })
    };
    while mock.sent().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    mock.sever();

    let err = in_flight.await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "Connection error: Client bridge connection closed");
}

#[tokio::test]
async fn test_idle_connection_is_replaced() {
    let mock = Arc::new(MockConnector::echo());
    let config = BridgeConfig {
        max_idle_secs: 0.05,
        ..BridgeConfig::default()
    };
    let bridge = bridge(&mock, config);

    bridge.request("hello", json!({})).await.unwrap();
    bridge.request("hello", json!({})).await.unwrap();
    assert_eq!(mock.connect_count(), 1);

    tokio::time::sleep(Duration::from_millis(120)).await;
    bridge.request("hello", json!({})).await.unwrap();
    assert_eq!(mock.connect_count(), 2);
}

#[tokio::test]
async fn test_close_then_reconnect() {
    let mock = Arc::new(MockConnector::echo());
    let bridge = bridge(&mock, BridgeConfig::default());

    bridge.request("hello", json!({})).await.unwrap();
    assert!(bridge.is_connected().await);
    bridge.close().await;
    assert!(!bridge.is_connected().await);

    bridge.request("hello", json!({})).await.unwrap();
    assert_eq!(mock.connect_count(), 2);
}
