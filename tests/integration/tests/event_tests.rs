//! Gateway events applied to the cache and delivered to listeners
//!
//! Run with: cargo test -p integration-tests --test event_tests

use cord_client::{Client, ClientBuilder};
use cord_core::{Event, EventKind, ReactionEmoji, Scope, Snowflake};
use integration_tests::{event_stream, fixtures::*, MockConnection, MockPlatform, MockResponse};
use serde_json::json;

fn id(value: u64) -> Snowflake {
    Snowflake::new(value)
}

/// Scoped listeners are dropped right after the listeners of the event ran
async fn settle_listeners(client: &Client, expected: usize) -> usize {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    let mut count = client.dispatcher().listener_count();
    while count != expected && std::time::Instant::now() < deadline {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        count = client.dispatcher().listener_count();
    }
    count
}

/// Log in with server 10 cached; returns the connection and next sequence
async fn logged_in(platform: &MockPlatform, builder: ClientBuilder) -> (Client, MockConnection, u64) {
    let login = tokio::spawn(builder.login());
    let (conn, seq) = platform.accept_and_ready(&[SERVER]).await.unwrap();
    conn.dispatch("GUILD_CREATE", seq, server()).unwrap();
    let client = login.await.unwrap().unwrap();
    (client, conn, seq + 1)
}

#[tokio::test]
async fn test_channel_delete_reaches_category_listener() {
    let platform = MockPlatform::start().await.unwrap();
    let (listener, mut events) = event_stream();
    let builder = platform
        .builder()
        .listener(EventKind::ChannelDelete, Scope::Channel(id(CATEGORY)), listener);
    let (client, conn, seq) = logged_in(&platform, builder).await;

    client.add_listener(EventKind::MessageCreate, Scope::Channel(id(GENERAL)), |_, _| {});
    let before = client.dispatcher().listener_count();

    conn.dispatch("CHANNEL_DELETE", seq, channel_delete(GENERAL, Some(CATEGORY))).unwrap();
    let event = events.next_matching(|_| true).await.unwrap();
    match event {
        Event::ChannelDelete { channel } => {
            assert_eq!(channel.id(), id(GENERAL));
            assert_eq!(channel.category_id(), Some(id(CATEGORY)));
        }
        other => panic!("unexpected event {other:?}"),
    }

    let cache = client.cache();
    assert!(cache.channel(id(GENERAL)).is_none());
    assert!(cache.channels_of(id(SERVER)).iter().all(|c| c.id() != id(GENERAL)));
    // Listeners scoped to the deleted channel are gone
    assert_eq!(settle_listeners(&client, before - 1).await, before - 1);
    client.disconnect().await;
}

#[tokio::test]
async fn test_reaction_on_uncached_message_is_skipped() {
    let platform = MockPlatform::start().await.unwrap();
    let (listener, mut events) = event_stream();
    let builder = platform.builder().on(EventKind::ReactionAdd, listener);
    let (client, conn, seq) = logged_in(&platform, builder).await;

    conn.dispatch("MESSAGE_REACTION_ADD", seq, reaction_add(900, GENERAL, OTHER_USER, "👍"))
        .unwrap();
    conn.dispatch("MESSAGE_CREATE", seq + 1, message(901, GENERAL, "hi")).unwrap();
    conn.dispatch("MESSAGE_REACTION_ADD", seq + 2, reaction_add(901, GENERAL, OTHER_USER, "👍"))
        .unwrap();

    let event = events.next_matching(|_| true).await.unwrap();
    assert_eq!(
        event,
        Event::ReactionAdd {
            message_id: id(901),
            channel_id: id(GENERAL),
            server_id: Some(id(SERVER)),
            user_id: id(OTHER_USER),
            emoji: ReactionEmoji::unicode("👍"),
        }
    );
    assert!(client.cache().messages().get(id(900)).is_none());
    let cached = client.cache().messages().get(id(901)).unwrap();
    assert_eq!(cached.reactions.len(), 1);
    assert_eq!(cached.reactions[0].count, 1);
    client.disconnect().await;
}

#[tokio::test]
async fn test_member_removal_keeps_user() {
    let platform = MockPlatform::start().await.unwrap();
    let (listener, mut events) = event_stream();
    let builder = platform.builder().on(EventKind::MemberLeave, listener);
    let (client, conn, seq) = logged_in(&platform, builder).await;
    assert!(client.cache().is_member(id(SERVER), id(OTHER_USER)));

    conn.dispatch("GUILD_MEMBER_REMOVE", seq, member_remove(OTHER_USER)).unwrap();
    let event = events.next_matching(|_| true).await.unwrap();
    assert_eq!(
        event,
        Event::MemberLeave {
            server_id: id(SERVER),
            user_id: id(OTHER_USER)
        }
    );

    let cache = client.cache();
    assert!(!cache.is_member(id(SERVER), id(OTHER_USER)));
    assert!(cache.user(id(OTHER_USER)).is_some());
    client.disconnect().await;
}

#[tokio::test]
async fn test_message_edit_reports_old_content() {
    let platform = MockPlatform::start().await.unwrap();
    let (listener, mut events) = event_stream();
    let builder = platform.builder().on(EventKind::MessageEdit, listener);
    let (client, conn, seq) = logged_in(&platform, builder).await;

    conn.dispatch("MESSAGE_CREATE", seq, message(902, GENERAL, "first")).unwrap();
    conn.dispatch(
        "MESSAGE_UPDATE",
        seq + 1,
        serde_json::json!({
            "id": "902",
            "channel_id": GENERAL.to_string(),
            "guild_id": SERVER.to_string(),
            "content": "second",
            "edited_timestamp": "2017-07-11T17:30:00.000000+00:00"
        }),
    )
    .unwrap();

    let event = events.next_matching(|_| true).await.unwrap();
    assert!(matches!(
        event,
        Event::MessageEdit { message_id, old_content: Some(ref old), .. } if message_id == id(902) && old == "first"
    ));
    assert_eq!(client.cache().messages().get(id(902)).unwrap().content, "second");
    client.disconnect().await;
}

fn direct_message(id: u64, channel: u64) -> serde_json::Value {
    let mut message = message(id, channel, "psst");
    message.as_object_mut().unwrap().remove("guild_id");
    message
}

#[tokio::test]
async fn test_direct_and_group_channels_come_from_rest() {
    let platform = MockPlatform::start().await.unwrap();
    platform.respond(
        axum::http::Method::GET,
        "/channels/90",
        MockResponse::json(200, json!({"id": "90", "type": 1, "recipients": [user(OTHER_USER, "bob")]})),
    );
    platform.respond(
        axum::http::Method::GET,
        "/channels/95",
        MockResponse::json(
            200,
            json!({"id": "95", "type": 3, "name": "trio", "recipients": [user(OTHER_USER, "bob"), user(3, "carol")]}),
        ),
    );
    let (listener, mut events) = event_stream();
    let builder = platform.builder().on(EventKind::MessageCreate, listener);
    let (client, conn, seq) = logged_in(&platform, builder).await;

    conn.dispatch("MESSAGE_CREATE", seq, direct_message(901, 95)).unwrap();
    conn.dispatch("MESSAGE_CREATE", seq + 1, direct_message(902, 90)).unwrap();
    for expected in [(901, 95), (902, 90)] {
        let event = events.next_matching(|_| true).await.unwrap();
        assert_eq!(
            event,
            Event::MessageCreate {
                message_id: id(expected.0),
                channel_id: id(expected.1),
                server_id: None,
            }
        );
    }

    let cache = client.cache();
    // The group is not mistaken for a DM with its author
    let group = cache.channel(id(95)).unwrap();
    assert!(matches!(group, cord_core::Channel::Group(_)));
    assert_eq!(cache.private_channel_with(id(OTHER_USER)).unwrap().id(), id(90));
    assert!(cache.user(id(3)).is_some());
    client.disconnect().await;
}

#[tokio::test]
async fn test_leaving_a_server_drops_its_channel_listeners() {
    let platform = MockPlatform::start().await.unwrap();
    let (listener, mut events) = event_stream();
    let builder = platform.builder().on(EventKind::ServerLeave, listener);
    let (client, conn, seq) = logged_in(&platform, builder).await;

    client.add_listener(EventKind::MessageCreate, Scope::Channel(id(GENERAL)), |_, _| {});
    client.add_listener(EventKind::ChannelUpdate, Scope::Channel(id(CATEGORY)), |_, _| {});
    client.add_listener(EventKind::ServerUpdate, Scope::Server(id(SERVER)), |_, _| {});
    client.add_listener(EventKind::UserChangeName, Scope::User(id(OTHER_USER)), |_, _| {});
    let before = client.dispatcher().listener_count();

    conn.dispatch("GUILD_DELETE", seq, json!({"id": SERVER.to_string()})).unwrap();
    let event = events.next_matching(|_| true).await.unwrap();
    assert!(matches!(event, Event::ServerLeave { ref server } if server.id == id(SERVER)));

    // Only the user listener survives
    assert_eq!(settle_listeners(&client, before - 3).await, before - 3);
    assert!(client.cache().channel(id(GENERAL)).is_none());
    client.disconnect().await;
}
