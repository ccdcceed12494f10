//! Integration tests for `Client` against a mock netcore peer on a real
//! local socket.
//!
//! Validates:
//! - end-to-end echo: `request("echo", "Hello!")` resolves to `"Hello!"`
//! - end-to-end pid: `request("pid", "")` resolves to `4242`
//! - round-trip of arbitrary payloads through a mirroring peer
//! - `error` envelopes surface as `AppError::Remote`
//! - request deadline surfaces as `AppError::Timeout`
//! - peer hanging up without a reply surfaces as `AppError::NotConnected`
//! - shared connection mode reuses one socket

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use netcore_client::config::{ClientConfig, ConnectionMode};
use netcore_client::wire::envelope::Envelope;
use netcore_client::{AppError, Client};

use super::test_helpers::{mirror_peer, spawn_peer, MockPeer, PeerMode};

const WAIT: Duration = Duration::from_secs(5);

/// Peer that answers like a netcore server: `echo` mirrors, `pid` reports
/// 4242, anything else gets an `error` envelope.
fn netcore_peer() -> MockPeer {
    spawn_peer(
        PeerMode::OneShot,
        Arc::new(|request: &Envelope| match request.event.as_str() {
            "echo" => vec![request.clone()],
            "pid" => vec![Envelope::new("pid", json!(4242))],
            other => vec![Envelope::new(
                "error",
                json!(format!("Unknown event type: {other}")),
            )],
        }),
    )
}

fn client_for(peer: &MockPeer) -> Client {
    Client::new(ClientConfig::new(peer.path.clone()))
}

#[tokio::test]
async fn echo_request_resolves_to_same_message() {
    let peer = netcore_peer();
    let client = client_for(&peer);

    let reply = tokio::time::timeout(WAIT, client.request("echo", "Hello!"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(reply, json!("Hello!"));
}

#[tokio::test]
async fn pid_request_resolves_to_reported_pid() {
    let peer = netcore_peer();
    let client = client_for(&peer);

    let reply = tokio::time::timeout(WAIT, client.request("pid", ""))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(reply, json!(4242));
}

#[tokio::test]
async fn named_operations_return_typed_results() {
    let peer = netcore_peer();
    let client = client_for(&peer);

    let (echo, pid) = tokio::join!(client.echo("Hello!"), client.pid());

    assert_eq!(echo.unwrap(), "Hello!");
    assert_eq!(pid.unwrap(), 4242);
}

#[tokio::test]
async fn mirrored_payloads_round_trip_unchanged() {
    let peer = mirror_peer(PeerMode::OneShot);
    let client = client_for(&peer);

    for payload in [
        json!("text"),
        json!(0),
        json!(null),
        json!({"a": [1, 2, {"b": false}]}),
    ] {
        let reply = tokio::time::timeout(WAIT, client.request("echo", &payload))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, payload);
    }
}

#[tokio::test]
async fn unknown_event_surfaces_remote_error() {
    let peer = netcore_peer();
    let client = client_for(&peer);

    let result = tokio::time::timeout(WAIT, client.request("reboot", ""))
        .await
        .unwrap();

    match result {
        Err(AppError::Remote(msg)) => assert_eq!(msg, "Unknown event type: reboot"),
        other => panic!("expected AppError::Remote, got: {other:?}"),
    }
}

#[tokio::test]
async fn typed_call_with_wrong_shape_is_protocol_error() {
    let peer = netcore_peer();
    let client = client_for(&peer);

    // `pid` replies with a number, which is not a string.
    let result: Result<String, AppError> = client.call("pid", "").await;

    assert!(
        matches!(result, Err(AppError::Protocol(_))),
        "expected AppError::Protocol, got: {result:?}"
    );
}

#[tokio::test]
async fn silent_peer_hits_request_deadline() {
    let peer = spawn_peer(PeerMode::Persistent, Arc::new(|_: &Envelope| Vec::new()));
    let mut config = ClientConfig::new(peer.path.clone());
    config.timeouts.request_ms = 100;
    let client = Client::new(config);

    let result = tokio::time::timeout(WAIT, client.request("echo", "anyone?"))
        .await
        .unwrap();

    assert!(
        matches!(result, Err(AppError::Timeout(_))),
        "expected AppError::Timeout, got: {result:?}"
    );
}

#[tokio::test]
async fn peer_hanging_up_without_reply_is_not_connected() {
    let peer = spawn_peer(PeerMode::OneShot, Arc::new(|_: &Envelope| Vec::new()));
    let client = client_for(&peer);

    let result = tokio::time::timeout(WAIT, client.request("echo", "hello?"))
        .await
        .unwrap();

    assert!(
        matches!(result, Err(AppError::NotConnected(_))),
        "expected AppError::NotConnected, got: {result:?}"
    );
}

#[tokio::test]
async fn reply_for_other_tag_is_ignored_until_match_arrives() {
    let peer = spawn_peer(
        PeerMode::OneShot,
        Arc::new(|request: &Envelope| {
            vec![
                Envelope::new("unrelated", json!("noise")),
                request.clone(),
            ]
        }),
    );
    let client = client_for(&peer);

    let reply = tokio::time::timeout(WAIT, client.request("echo", "signal"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(reply, json!("signal"));
}

#[tokio::test]
async fn missing_socket_is_connect_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let client = Client::new(ClientConfig::new(dir.path().join("absent.sock")));

    let result = client.request("echo", "Hello!").await;

    assert!(
        matches!(result, Err(AppError::Connect(_))),
        "expected AppError::Connect, got: {result:?}"
    );
}

#[tokio::test]
async fn per_request_mode_opens_a_connection_per_call() {
    let peer = netcore_peer();
    let client = client_for(&peer);

    for message in ["one", "two"] {
        let reply = tokio::time::timeout(WAIT, client.echo(message))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, message);
    }

    assert_eq!(peer.connections(), 2);
}

#[tokio::test]
async fn shared_mode_reuses_one_connection() {
    let peer = mirror_peer(PeerMode::Persistent);
    let mut config = ClientConfig::new(peer.path.clone());
    config.mode = ConnectionMode::Shared;
    let client = Client::new(config);

    for message in ["one", "two", "three"] {
        let reply = tokio::time::timeout(WAIT, client.echo(message))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, message);
    }

    assert_eq!(peer.connections(), 1);
}

#[tokio::test]
async fn shared_mode_opens_a_new_connection_after_close() {
    let peer = mirror_peer(PeerMode::OneShot);
    let mut config = ClientConfig::new(peer.path.clone());
    config.mode = ConnectionMode::Shared;
    let client = Client::new(config);

    let first = tokio::time::timeout(WAIT, client.echo("first"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, "first");

    // The one-shot peer hangs up after replying; wait until the client sees it.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = tokio::time::timeout(WAIT, client.echo("second"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, "second");
    assert_eq!(peer.connections(), 2);
}
