//! Session engine against a live mock gateway: zombie connections,
//! reconnect requests, invalidated sessions and fatal close codes
//!
//! Run with: cargo test -p integration-tests --test session_tests

use cord_client::ClientError;
use cord_core::{Event, EventKind};
use cord_gateway::protocol::GatewayMessage;
use cord_gateway::{GatewayError, SessionState};
use integration_tests::{event_stream, fixtures::*, op, MockPlatform, MockResponse};
use serde_json::json;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_zombie_connection_resumes() {
    let platform = MockPlatform::start().await.unwrap();
    let (listener, mut events) = event_stream();
    let (resumed_listener, mut resumed) = event_stream();
    let login = tokio::spawn(
        platform
            .builder()
            .on(EventKind::Reconnect, listener)
            .on(EventKind::Resumed, resumed_listener)
            .login(),
    );

    let mut first = platform.next_connection().await.unwrap();
    first.hello(300).unwrap();
    first.recv_op(op::IDENTIFY).await.unwrap();
    first.dispatch("READY", 1, ready(&[], &platform.gateway_url())).unwrap();
    let client = login.await.unwrap().unwrap();

    // Heartbeats are never acknowledged
    first.recv_op(op::HEARTBEAT).await.unwrap();
    assert_eq!(first.closed().await.unwrap(), Some(4000));

    let event = events.next_matching(|_| true).await.unwrap();
    assert!(matches!(event, Event::Reconnect { shard: 0, .. }));

    let mut second = platform.next_connection().await.unwrap();
    second.hello(45_000).unwrap();
    let resume = second.recv_op(op::RESUME).await.unwrap();
    assert_eq!(resume["d"]["session_id"], "session-1");
    assert_eq!(resume["d"]["seq"], 1);
    assert_eq!(resume["d"]["token"], integration_tests::TOKEN);
    second.dispatch("RESUMED", 2, serde_json::Value::Null).unwrap();

    let event = resumed.next_matching(|_| true).await.unwrap();
    assert_eq!(event, Event::Resumed { shard: 0 });
    let mut status = client.shards()[0].subscribe();
    status.wait_for(|s| s.state == SessionState::Connected).await.unwrap();
    client.disconnect().await;
}

#[tokio::test]
async fn test_reconnect_request_resumes_with_last_sequence() {
    let platform = MockPlatform::start().await.unwrap();
    let login = tokio::spawn(platform.builder().login());
    let (mut first, seq) = platform.accept_and_ready(&[]).await.unwrap();
    let client = login.await.unwrap().unwrap();

    first.dispatch("MESSAGE_CREATE", seq, message(900, GENERAL, "x")).unwrap();
    first.send(&GatewayMessage::reconnect()).unwrap();
    assert_eq!(first.closed().await.unwrap(), Some(4000));

    let mut second = platform.next_connection().await.unwrap();
    second.hello(45_000).unwrap();
    let resume = second.recv_op(op::RESUME).await.unwrap();
    assert_eq!(resume["d"]["seq"], seq);
    second.dispatch("RESUMED", seq + 1, serde_json::Value::Null).unwrap();
    client.disconnect().await;
}

#[tokio::test]
async fn test_invalid_session_identifies_again() {
    let platform = MockPlatform::start().await.unwrap();
    let (listener, mut events) = event_stream();
    let login = tokio::spawn(platform.builder().on(EventKind::Ready, listener).login());
    let (first, _) = platform.accept_and_ready(&[]).await.unwrap();
    let client = login.await.unwrap().unwrap();
    events.next_matching(|_| true).await.unwrap();

    first.close(4000).unwrap();

    // The platform no longer knows the session: the resume is rejected
    let mut second = platform.next_connection().await.unwrap();
    second.hello(45_000).unwrap();
    second.recv_op(op::RESUME).await.unwrap();
    second.send(&GatewayMessage::invalid_session(false)).unwrap();
    second.closed().await.unwrap();

    let mut third = platform.next_connection().await.unwrap();
    third.hello(45_000).unwrap();
    third.recv_op(op::IDENTIFY).await.unwrap();
    third.dispatch("READY", 1, ready(&[], &platform.gateway_url())).unwrap();

    let event = events.next_matching(|_| true).await.unwrap();
    assert!(matches!(event, Event::Ready { shard: 0, .. }));
    client.disconnect().await;
}

#[tokio::test]
async fn test_authentication_failure_is_fatal() {
    let platform = MockPlatform::start().await.unwrap();
    let login = tokio::spawn(platform.builder().login());

    let mut conn = platform.next_connection().await.unwrap();
    conn.hello(45_000).unwrap();
    conn.recv_op(op::IDENTIFY).await.unwrap();
    conn.close(4004).unwrap();

    let error = login.await.unwrap().unwrap_err();
    assert!(matches!(error, ClientError::Gateway(GatewayError::AuthenticationFailed)));
    assert!(error.is_fatal());

    // No reconnect follows a fatal close
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert!(platform.next_connection_now().is_none());
}

#[tokio::test]
async fn test_presence_update_reaches_gateway() {
    let platform = MockPlatform::start().await.unwrap();
    let login = tokio::spawn(platform.builder().login());
    let (mut conn, _) = platform.accept_and_ready(&[]).await.unwrap();
    let client = login.await.unwrap().unwrap();

    client
        .update_presence(cord_core::UserStatus::Idle, None)
        .await
        .unwrap();
    let frame = conn.recv_op(op::PRESENCE_UPDATE).await.unwrap();
    assert_eq!(frame["d"]["status"], "idle");
    client.disconnect().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_heartbeats_flow_during_member_backfill() {
    let platform = MockPlatform::start().await.unwrap();
    let path = format!("/guilds/{SERVER}/members/77");
    platform.respond(
        axum::http::Method::GET,
        &path,
        MockResponse::json(429, json!({"retry_after": 1500.0, "global": false})),
    );
    platform.respond(
        axum::http::Method::GET,
        &path,
        MockResponse::json(200, json!({"user": user(77, "carol"), "nick": "old", "roles": []})),
    );

    let (listener, mut events) = event_stream();
    let (reconnects, mut reconnect_events) = event_stream();
    let login = tokio::spawn(
        platform
            .builder()
            .on(EventKind::UserChangeNickname, listener)
            .on(EventKind::Reconnect, reconnects)
            .login(),
    );

    let mut conn = platform.next_connection().await.unwrap();
    conn.hello(300).unwrap();
    conn.recv_op(op::IDENTIFY).await.unwrap();
    conn.dispatch("READY", 1, ready(&[SERVER], &platform.gateway_url())).unwrap();
    conn.dispatch("GUILD_CREATE", 2, server()).unwrap();
    conn.dispatch(
        "GUILD_MEMBER_UPDATE",
        3,
        json!({"guild_id": SERVER.to_string(), "user": user(77, "carol"), "nick": "new", "roles": []}),
    )
    .unwrap();

    // The backfill waits out the rate limit while heartbeats keep going
    let until = Instant::now() + Duration::from_secs(3);
    let mut acked = 0;
    while Instant::now() < until {
        let frame = conn.recv().await.unwrap().expect("client disconnected");
        assert!(frame.get("close").is_none(), "client closed: {frame}");
        if frame["op"] == op::HEARTBEAT {
            conn.send(&GatewayMessage::heartbeat_ack()).unwrap();
            acked += 1;
        }
    }
    assert!(acked >= 5, "only {acked} heartbeats");

    let event = events.next_matching(|_| true).await.unwrap();
    assert_eq!(
        event,
        Event::UserChangeNickname {
            server_id: cord_core::Snowflake::new(SERVER),
            user_id: cord_core::Snowflake::new(77),
            old: Some("old".into()),
            new: Some("new".into()),
        }
    );
    assert!(reconnect_events.drain().is_empty());
    assert_eq!(platform.requests_to(&axum::http::Method::GET, &path).len(), 2);

    let client = login.await.unwrap().unwrap();
    client.disconnect().await;
}

#[tokio::test]
async fn test_rejected_identify_fails_login() {
    let platform = MockPlatform::start().await.unwrap();
    let login = tokio::spawn(platform.builder().login());

    let mut conn = platform.next_connection().await.unwrap();
    conn.hello(45_000).unwrap();
    conn.recv_op(op::IDENTIFY).await.unwrap();
    conn.send(&GatewayMessage::invalid_session(false)).unwrap();

    let error = login.await.unwrap().unwrap_err();
    assert!(matches!(error, ClientError::Gateway(GatewayError::HandshakeRejected)));
    assert!(error.is_fatal());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(platform.next_connection_now().is_none());
}

#[tokio::test]
async fn test_failing_resumes_fall_back_to_identify() {
    let platform = MockPlatform::start().await.unwrap();
    let login = tokio::spawn(platform.builder().reconnect_policy(2, 10).login());
    let (first, _) = platform.accept_and_ready(&[]).await.unwrap();
    let client = login.await.unwrap().unwrap();
    first.close(4000).unwrap();

    // Both resumes are cut off before RESUMED
    for _ in 0..2 {
        let mut conn = platform.next_connection().await.unwrap();
        conn.hello(45_000).unwrap();
        let resume = conn.recv_op(op::RESUME).await.unwrap();
        assert_eq!(resume["d"]["session_id"], "session-1");
        conn.close(4000).unwrap();
    }

    let mut conn = platform.next_connection().await.unwrap();
    conn.hello(45_000).unwrap();
    let identify = conn.recv_op(op::IDENTIFY).await.unwrap();
    assert_eq!(identify["d"]["token"], integration_tests::TOKEN);
    conn.dispatch("READY", 1, ready(&[], &platform.gateway_url())).unwrap();

    let mut status = client.shards()[0].subscribe();
    status.wait_for(|s| s.state == SessionState::Connected).await.unwrap();
    client.disconnect().await;
}

#[tokio::test]
async fn test_reconnects_give_up_after_the_limit() {
    let platform = MockPlatform::start().await.unwrap();
    let login = tokio::spawn(platform.builder().reconnect_policy(5, 2).login());
    let (first, _) = platform.accept_and_ready(&[]).await.unwrap();
    let mut client = login.await.unwrap().unwrap();
    first.close(4000).unwrap();

    // Every new connection drops before Hello
    for _ in 0..3 {
        let conn = platform.next_connection().await.unwrap();
        conn.close(4000).unwrap();
    }

    let error = tokio::time::timeout(Duration::from_secs(10), client.closed())
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(error, ClientError::Gateway(GatewayError::ReconnectsExhausted(3))));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(platform.next_connection_now().is_none());
}
