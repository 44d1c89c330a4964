//! Login and initial server availability
//!
//! Run with: cargo test -p integration-tests --test login_tests

use cord_core::{Event, EventKind, Snowflake};
use cord_gateway::SessionState;
use integration_tests::{event_stream, fixtures::*, op, MockPlatform, TOKEN};
use std::time::Duration;

fn id(value: u64) -> Snowflake {
    Snowflake::new(value)
}

#[tokio::test]
async fn test_login_identifies_and_reaches_ready() {
    let platform = MockPlatform::start().await.unwrap();
    let (listener, mut events) = event_stream();
    let login = tokio::spawn(platform.builder().on(EventKind::Ready, listener).login());

    let mut conn = platform.next_connection().await.unwrap();
    conn.hello(45_000).unwrap();
    let identify = conn.recv_op(op::IDENTIFY).await.unwrap();
    assert_eq!(identify["d"]["token"], TOKEN);
    assert_eq!(identify["d"]["shard"], serde_json::json!([0, 1]));
    assert_eq!(identify["d"]["large_threshold"], 250);
    conn.dispatch("READY", 1, ready(&[], &platform.gateway_url())).unwrap();

    let client = login.await.unwrap().unwrap();
    assert_eq!(client.shards()[0].state(), SessionState::Connected);
    assert_eq!(client.yourself().map(|u| u.id), Some(id(SELF_ID)));

    let ready = events.next_matching(|e| matches!(e, Event::Ready { .. })).await.unwrap();
    assert_eq!(
        ready,
        Event::Ready {
            shard: 0,
            session_id: "session-1".into()
        }
    );

    // The gateway url came from the REST lookup, with the bot authorization
    let lookups = platform.requests_to(&axum::http::Method::GET, "/gateway");
    assert_eq!(lookups.len(), 1);
    assert_eq!(lookups[0].authorization.as_deref(), Some("Bot test-token"));
    client.disconnect().await;
}

#[tokio::test]
async fn test_login_waits_for_listed_servers() {
    let platform = MockPlatform::start().await.unwrap();
    let login = tokio::spawn(platform.builder().login());

    let (conn, seq) = platform.accept_and_ready(&[SERVER]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!login.is_finished(), "login returned before the server arrived");

    conn.dispatch("GUILD_CREATE", seq, server()).unwrap();
    let client = login.await.unwrap().unwrap();

    let cache = client.cache();
    let server = cache.server(id(SERVER)).unwrap();
    assert_eq!(server.name, "Test Server");
    assert!(!cache.is_unavailable(id(SERVER)));
    assert_eq!(cache.channels_of(id(SERVER)).len(), 4);
    assert_eq!(cache.member(id(SERVER), id(OTHER_USER)).unwrap().nickname.as_deref(), Some("bobby"));
    client.disconnect().await;
}

#[tokio::test]
async fn test_login_without_waiting_sees_server_become_available() {
    let platform = MockPlatform::start().await.unwrap();
    let (listener, mut events) = event_stream();
    let login = tokio::spawn(
        platform
            .builder()
            .wait_for_servers_on_startup(false)
            .on(EventKind::ServerBecomesAvailable, listener)
            .login(),
    );

    let (conn, seq) = platform.accept_and_ready(&[SERVER]).await.unwrap();
    let client = login.await.unwrap().unwrap();
    assert_eq!(client.shards()[0].state(), SessionState::Ready);
    assert!(client.cache().is_unavailable(id(SERVER)));

    conn.dispatch("GUILD_CREATE", seq, server()).unwrap();
    let event = events
        .next_matching(|e| matches!(e, Event::ServerBecomesAvailable { .. }))
        .await
        .unwrap();
    assert_eq!(event, Event::ServerBecomesAvailable { server_id: id(SERVER) });

    let mut shard = client.shards()[0].subscribe();
    shard
        .wait_for(|s| s.state == SessionState::Connected)
        .await
        .unwrap();
    client.disconnect().await;
}

#[tokio::test]
async fn test_server_outage_and_recovery() {
    let platform = MockPlatform::start().await.unwrap();
    let (listener, mut events) = event_stream();
    let (join_listener, mut joins) = event_stream();
    let login = tokio::spawn(
        platform
            .builder()
            .on(EventKind::ServerBecomesUnavailable, listener)
            .on(EventKind::ServerJoin, join_listener)
            .login(),
    );

    let (conn, seq) = platform.accept_and_ready(&[SERVER]).await.unwrap();
    conn.dispatch("GUILD_CREATE", seq, server()).unwrap();
    let client = login.await.unwrap().unwrap();

    conn.dispatch("GUILD_DELETE", seq + 1, unavailable_server(SERVER)).unwrap();
    let event = events.next_matching(|_| true).await.unwrap();
    assert_eq!(event, Event::ServerBecomesUnavailable { server_id: id(SERVER) });
    assert!(client.cache().is_unavailable(id(SERVER)));

    // A server not listed before is a join
    conn.dispatch("GUILD_CREATE", seq + 2, bare_server(11)).unwrap();
    let event = joins.next_matching(|_| true).await.unwrap();
    assert_eq!(event, Event::ServerJoin { server_id: id(11) });
    client.disconnect().await;
}
