//! REST calls through the client services: rate limits and cache write-back
//!
//! Run with: cargo test -p integration-tests --test rest_tests

use std::time::Duration;

use axum::http::Method;
use cord_client::Client;
use cord_core::{ReactionEmoji, Snowflake};
use cord_rest::HistoryQuery;
use integration_tests::{fixtures::*, MockConnection, MockPlatform, MockResponse};
use serde_json::json;

fn id(value: u64) -> Snowflake {
    Snowflake::new(value)
}

async fn logged_in(platform: &MockPlatform) -> (Client, MockConnection) {
    let login = tokio::spawn(platform.builder().login());
    let (conn, seq) = platform.accept_and_ready(&[SERVER]).await.unwrap();
    conn.dispatch("GUILD_CREATE", seq, server()).unwrap();
    (login.await.unwrap().unwrap(), conn)
}

#[tokio::test]
async fn test_rate_limited_request_waits_and_retries() {
    let platform = MockPlatform::start().await.unwrap();
    let (client, _conn) = logged_in(&platform).await;
    let path = format!("/channels/{GENERAL}/messages");
    platform.respond(
        Method::POST,
        &path,
        MockResponse::json(429, json!({"message": "You are being rate limited.", "retry_after": 300.0, "global": false})),
    );
    platform.respond(Method::POST, &path, MockResponse::json(200, message(950, GENERAL, "hello")));

    let sent = client.messages().send(id(GENERAL), "hello").await.unwrap();
    assert_eq!(sent.id, id(950));

    let calls = platform.requests_to(&Method::POST, &path);
    assert_eq!(calls.len(), 2);
    assert!(calls[1].at.duration_since(calls[0].at) >= Duration::from_millis(290));
    assert_eq!(calls[1].body.as_ref().unwrap()["content"], "hello");

    // The gateway echo caches sent messages, not the REST response
    assert!(client.cache().messages().get(id(950)).is_none());
    client.disconnect().await;
}

#[tokio::test]
async fn test_second_429_is_returned() {
    let platform = MockPlatform::start().await.unwrap();
    let (client, _conn) = logged_in(&platform).await;
    let path = format!("/channels/{GENERAL}/messages/951");
    for _ in 0..2 {
        platform.respond(
            Method::DELETE,
            &path,
            MockResponse::json(429, json!({"retry_after": 50.0, "global": false})),
        );
    }

    let error = client.messages().delete(id(GENERAL), id(951)).await.unwrap_err();
    assert!(matches!(
        error,
        cord_client::ClientError::Rest(cord_rest::RestError::RateLimited { .. })
    ));
    client.disconnect().await;
}

#[tokio::test]
async fn test_exhausted_bucket_delays_next_call() {
    let platform = MockPlatform::start().await.unwrap();
    let (client, _conn) = logged_in(&platform).await;
    let path = format!("/channels/{GENERAL}/typing");
    platform.respond(
        Method::POST,
        &path,
        MockResponse::empty()
            .header("x-ratelimit-bucket", "typing")
            .header("x-ratelimit-remaining", "0")
            .header("x-ratelimit-reset-after", "0.3"),
    );
    platform.respond(Method::POST, &path, MockResponse::empty());

    client.channels().trigger_typing(id(GENERAL)).await.unwrap();
    client.channels().trigger_typing(id(GENERAL)).await.unwrap();

    let calls = platform.requests_to(&Method::POST, &path);
    assert_eq!(calls.len(), 2);
    assert!(calls[1].at.duration_since(calls[0].at) >= Duration::from_millis(250));
    client.disconnect().await;
}

#[tokio::test]
async fn test_fetched_message_is_cached() {
    let platform = MockPlatform::start().await.unwrap();
    let (client, _conn) = logged_in(&platform).await;
    platform.respond(
        Method::GET,
        &format!("/channels/{GENERAL}/messages/960"),
        MockResponse::json(200, message(960, GENERAL, "fetched")),
    );

    let message = client.messages().get(id(GENERAL), id(960)).await.unwrap();
    assert_eq!(message.content, "fetched");
    assert!(client.cache().messages().get(id(960)).is_some());

    // Served from the cache the second time
    client.messages().get(id(GENERAL), id(960)).await.unwrap();
    assert_eq!(
        platform
            .requests_to(&Method::GET, &format!("/channels/{GENERAL}/messages/960"))
            .len(),
        1
    );
    client.disconnect().await;
}

#[tokio::test]
async fn test_history_view_follows_deletes() {
    let platform = MockPlatform::start().await.unwrap();
    let (client, conn) = logged_in(&platform).await;
    let path = format!("/channels/{GENERAL}/messages");
    platform.respond(
        Method::GET,
        &path,
        MockResponse::json(200, json!([message(971, GENERAL, "b"), message(970, GENERAL, "a")])),
    );

    let query = HistoryQuery {
        limit: Some(2),
        ..HistoryQuery::default()
    };
    let history = client.messages().history(id(GENERAL), query).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history.oldest().map(|m| m.id), Some(id(970)));
    let calls = platform.requests_to(&Method::GET, &path);
    assert_eq!(calls[0].query.as_deref(), Some("limit=2"));

    conn.dispatch(
        "MESSAGE_DELETE",
        10,
        json!({"id": "970", "channel_id": GENERAL.to_string(), "guild_id": SERVER.to_string()}),
    )
    .unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while history.len() != 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert!(history.get(id(970)).is_none());
    client.disconnect().await;
}

#[tokio::test]
async fn test_member_fetch_writes_back() {
    let platform = MockPlatform::start().await.unwrap();
    let (client, _conn) = logged_in(&platform).await;
    platform.respond(
        Method::GET,
        &format!("/guilds/{SERVER}/members/3"),
        MockResponse::json(200, json!({"user": user(3, "carol"), "nick": "c", "roles": ["30"]})),
    );

    let member = client.members().get(id(SERVER), id(3)).await.unwrap();
    assert_eq!(member.nickname.as_deref(), Some("c"));
    let cache = client.cache();
    assert!(cache.is_member(id(SERVER), id(3)));
    assert_eq!(cache.user(id(3)).unwrap().name, "carol");

    let missing = client.members().get(id(99), id(3)).await.unwrap_err();
    assert!(missing.is_not_found());
    client.disconnect().await;
}

#[tokio::test]
async fn test_ban_and_reaction_routes() {
    let platform = MockPlatform::start().await.unwrap();
    let (client, _conn) = logged_in(&platform).await;
    let ban = format!("/guilds/{SERVER}/bans/{OTHER_USER}");
    platform.respond(Method::PUT, &ban, MockResponse::empty());

    client.members().ban(id(SERVER), id(OTHER_USER), 9).await.unwrap();
    let calls = platform.requests_to(&Method::PUT, &ban);
    assert_eq!(calls[0].body.as_ref().unwrap()["delete_message_days"], 7);

    let emoji = ReactionEmoji::Custom {
        id: id(70),
        name: "blob".into(),
        animated: false,
    };
    let reaction = format!("/channels/{GENERAL}/messages/980/reactions/blob:70/@me");
    platform.respond(Method::PUT, &reaction, MockResponse::empty());
    client.messages().add_reaction(id(GENERAL), id(980), &emoji).await.unwrap();
    assert_eq!(platform.requests_to(&Method::PUT, &reaction).len(), 1);

    let unknown = client.messages().pin(id(GENERAL), id(981)).await.unwrap_err();
    assert!(unknown.is_not_found());
    client.disconnect().await;
}
