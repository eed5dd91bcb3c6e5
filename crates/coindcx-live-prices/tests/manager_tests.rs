/*
[INPUT]:  Connection manager scenarios driven through the mock transport
[OUTPUT]: Status, join and resource-release verification
[POS]:    Integration test layer - connection lifecycle
[UPDATE]: When changing activation or event handling
*/

use std::sync::Arc;

use coindcx_feed_adapter::MockTransport;
use coindcx_live_prices::{
    Activation, ConnectionManager, ConnectionState, ConnectionStatus, FeedConfig,
};
use serde_json::json;

fn setup() -> (ConnectionManager, MockTransport) {
    let transport = MockTransport::new();
    let manager = ConnectionManager::new(FeedConfig::default(), Arc::new(transport.clone()));
    (manager, transport)
}

/// Test: connect sets status and joins the configured channel once
#[test]
fn test_connect_joins_price_channel() {
    let (manager, transport) = setup();
    manager.activate();
    let conn = transport.last_connection().unwrap();

    conn.fire_open("sock-1");

    assert_eq!(manager.status().to_string(), "Connected");
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(
        conn.emitted(),
        vec![(
            "join".to_string(),
            json!({ "channelName": "B-BTC_USDT@prices" })
        )]
    );

    let details = manager.details();
    assert_eq!(details.socket_id.as_deref(), Some("sock-1"));
    assert!(details.connected);
    assert_eq!(details.endpoint, "wss://stream.coindcx.com");
    assert_eq!(details.transport, "mock");
}

/// Test: connect-error reason is shown verbatim
#[test]
fn test_connect_error_sets_error_status() {
    let (manager, transport) = setup();
    manager.activate();

    transport.last_connection().unwrap().fire_error("timeout");

    assert_eq!(manager.status().to_string(), "Error: timeout");
    assert_eq!(manager.state(), ConnectionState::Failed);
}

/// Test: disconnect after connect shows the reason
#[test]
fn test_disconnect_sets_reason() {
    let (manager, transport) = setup();
    manager.activate();
    let conn = transport.last_connection().unwrap();

    conn.fire_open("sock-1");
    conn.fire_close("transport close");

    assert_eq!(manager.status().to_string(), "Disconnected: transport close");
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(manager.details().socket_id, None);
}

/// Test: status always tracks the most recent event
#[test]
fn test_status_follows_latest_event() {
    let (manager, transport) = setup();
    manager.activate();
    let conn = transport.last_connection().unwrap();

    let steps: Vec<(&str, &str)> = vec![
        ("open", "Connected"),
        ("message", "Connected"),
        ("close", "Disconnected: ping timeout"),
        ("error", "Error: websocket error"),
        ("open", "Connected"),
        ("close", "Disconnected: io server disconnect"),
    ];

    for (event, expected) in steps {
        match (event, expected) {
            ("open", _) => conn.fire_open("sock-1"),
            ("message", _) => conn.fire_message("price-change", json!({ "p": "1" })),
            ("close", expected) => {
                conn.fire_close(expected.trim_start_matches("Disconnected: "))
            }
            ("error", expected) => conn.fire_error(expected.trim_start_matches("Error: ")),
            _ => unreachable!(),
        }
        assert_eq!(manager.status().to_string(), expected, "after {event}");
    }
}

/// Test: deactivate releases the handle in every state
#[test]
fn test_deactivate_leaves_no_open_handles() {
    type Drive = fn(&coindcx_feed_adapter::MockConnection);
    let drives: [(&str, Drive); 4] = [
        ("connecting", |_| {}),
        ("connected", |conn| conn.fire_open("sock-1")),
        ("failed", |conn| conn.fire_error("timeout")),
        ("disconnected", |conn| {
            conn.fire_open("sock-1");
            conn.fire_close("transport close");
        }),
    ];

    for (label, drive) in drives {
        let (manager, transport) = setup();
        manager.activate();
        drive(&transport.last_connection().unwrap());

        manager.deactivate();

        assert_eq!(transport.open_handles(), 0, "state {label}");
        assert_eq!(manager.state(), ConnectionState::Idle, "state {label}");
        assert!(manager.handle().is_none(), "state {label}");
    }
}

/// Test: deactivate is safe without activate and when repeated
#[test]
fn test_deactivate_is_idempotent() {
    let (manager, transport) = setup();
    manager.deactivate();
    manager.activate();
    manager.deactivate();
    manager.deactivate();

    assert_eq!(transport.opened_count(), 1);
    assert_eq!(transport.open_handles(), 0);
    assert_eq!(manager.state(), ConnectionState::Idle);
}

/// Test: activating twice never opens a second live connection
#[test]
fn test_double_activate_reuses_connection() {
    let (manager, transport) = setup();
    assert_eq!(manager.activate(), Activation::Opened);
    assert_eq!(manager.activate(), Activation::AlreadyActive);
    assert_eq!(transport.opened_count(), 1);

    transport.last_connection().unwrap().fire_open("sock-1");
    assert_eq!(manager.activate(), Activation::AlreadyActive);
    assert_eq!(transport.opened_count(), 1);
    assert_eq!(transport.open_handles(), 1);
}

/// Test: a failed handle is replaced, not leaked
#[test]
fn test_reactivate_after_failure_replaces_handle() {
    let (manager, transport) = setup();
    manager.activate();
    let first = transport.last_connection().unwrap();
    first.fire_error("timeout");

    assert_eq!(manager.activate(), Activation::Opened);
    assert!(first.is_closed());
    assert_eq!(transport.opened_count(), 2);
    assert_eq!(transport.open_handles(), 1);
    assert_eq!(manager.state(), ConnectionState::Connecting);

    // late events from the replaced handle are ignored
    first.fire_close("transport close");
    assert_eq!(manager.status().to_string(), "Error: timeout");

    transport.last_connection().unwrap().fire_open("sock-2");
    assert_eq!(manager.status(), ConnectionStatus::Connected);
}

/// Test: connect arriving after deactivate is not observed
#[test]
fn test_connect_after_deactivate_is_ignored() {
    let (manager, transport) = setup();
    manager.activate();
    let conn = transport.last_connection().unwrap();
    let before = manager.status();

    manager.deactivate();
    conn.fire_open("late-sock");

    assert_eq!(manager.status(), before);
    assert_eq!(manager.state(), ConnectionState::Idle);
    assert!(conn.emitted().is_empty());
}

/// Test: stale error and disconnect after deactivate are ignored too
#[test]
fn test_late_events_after_deactivate_are_ignored() {
    let (manager, transport) = setup();
    manager.activate();
    let conn = transport.last_connection().unwrap();
    conn.fire_open("sock-1");

    manager.deactivate();
    conn.fire_close("io client disconnect");
    conn.fire_error("timeout");

    assert_eq!(manager.status(), ConnectionStatus::Connected);
    assert_eq!(manager.state(), ConnectionState::Idle);
}

/// Test: custom channel from configuration is used for the join
#[test]
fn test_join_uses_configured_channel() {
    let transport = MockTransport::new();
    let config = FeedConfig {
        channel: "B-ETH_USDT@prices".parse().unwrap(),
        ..FeedConfig::default()
    };
    let manager = ConnectionManager::new(config, Arc::new(transport.clone()));
    manager.activate();

    let conn = transport.last_connection().unwrap();
    conn.fire_open("sock-1");

    assert_eq!(
        conn.emitted()[0].1,
        json!({ "channelName": "B-ETH_USDT@prices" })
    );
    assert_eq!(transport.options()[0].endpoint, "wss://stream.coindcx.com");
}

/// Test: status watchers see every transition
#[tokio::test]
async fn test_status_subscription_receives_updates() {
    let (manager, transport) = setup();
    let mut rx = manager.subscribe_status();
    assert_eq!(*rx.borrow(), ConnectionStatus::Disconnected);

    manager.activate();
    transport.last_connection().unwrap().fire_open("sock-1");

    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), ConnectionStatus::Connected);
}
