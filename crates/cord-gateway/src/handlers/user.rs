//! PRESENCE_UPDATE, TYPING_START and USER_UPDATE

use async_trait::async_trait;
use cord_cache::EntityCache;
use cord_core::payloads::{PresencePayload, TypingStartPayload, UserPayload};
use cord_core::{Activity, Event, Presence, User};
use serde_json::Value;

use super::{parse, HandlerContext, HandlerResult, PacketHandler};

fn presence_of(payload: &PresencePayload) -> Presence {
    Presence {
        status: payload.status,
        activity: payload.activity().map(Activity::from),
    }
}

/// Change events between two versions of the same user
pub(super) fn user_changes(before: &User, after: &User) -> Vec<Event> {
    let user_id = after.id;
    let mut events = Vec::new();
    if before.name != after.name {
        events.push(Event::UserChangeName {
            user_id,
            old: before.name.clone(),
            new: after.name.clone(),
        });
    }
    if before.avatar != after.avatar {
        events.push(Event::UserChangeAvatar {
            user_id,
            old: before.avatar.clone(),
            new: after.avatar.clone(),
        });
    }
    if before.presence.status != after.presence.status {
        events.push(Event::UserChangeStatus {
            user_id,
            old: before.presence.status,
            new: after.presence.status,
        });
    }
    if before.presence.activity != after.presence.activity {
        events.push(Event::UserChangeActivity {
            user_id,
            old: before.presence.activity.clone(),
            new: after.presence.activity.clone(),
        });
    }
    events
}

/// Apply a presence to the cached user
///
/// A user seen for the first time is created only if the presence carries
/// a full user object, and fires nothing.
pub(super) fn apply_presence(cache: &EntityCache, payload: &PresencePayload) -> Vec<Event> {
    let user_id = payload.user.id;
    let presence = presence_of(payload);

    let Some(before) = cache.user(user_id) else {
        match payload.user.to_full() {
            Some(full) => {
                cache.upsert_user(&full);
                cache.update_user(user_id, |user| user.presence = presence);
            }
            None => tracing::debug!(user_id = %user_id, "Presence for unknown user"),
        }
        return Vec::new();
    };

    let after = cache.update_user(user_id, |user| {
        user.apply_partial(&payload.user);
        user.presence = presence;
        user.clone()
    });
    after.map(|after| user_changes(&before, &after)).unwrap_or_default()
}

pub struct PresenceUpdateHandler;

#[async_trait]
impl PacketHandler for PresenceUpdateHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let presence: PresencePayload = parse(payload)?;
        Ok(apply_presence(ctx.cache(), &presence))
    }
}

pub struct TypingStartHandler;

#[async_trait]
impl PacketHandler for TypingStartHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let typing: TypingStartPayload = parse(payload)?;
        if typing.guild_id.is_some() && !ctx.cache().contains_channel(typing.channel_id) {
            tracing::debug!(channel_id = %typing.channel_id, "Typing in uncached channel");
            return Ok(Vec::new());
        }
        Ok(vec![Event::UserStartTyping {
            user_id: typing.user_id,
            channel_id: typing.channel_id,
            server_id: typing.guild_id,
        }])
    }
}

/// The connected account's own profile changed
pub struct UserUpdateHandler;

#[async_trait]
impl PacketHandler for UserUpdateHandler {
    async fn handle(&self, payload: Value, ctx: &HandlerContext) -> HandlerResult<Vec<Event>> {
        let user: UserPayload = parse(payload)?;
        let cache = ctx.cache();
        let previous = cache.upsert_user(&user);
        let Some(current) = cache.user(user.id) else {
            return Ok(Vec::new());
        };

        let mut events = match &previous {
            Some(before) if *before == current => return Ok(Vec::new()),
            Some(before) => user_changes(before, &current),
            None => Vec::new(),
        };
        events.push(Event::UserUpdate { user_id: user.id });
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::*;
    use crate::handlers::ServerCreateHandler;
    use cord_core::{ActivityType, Snowflake, UserStatus};
    use serde_json::json;

    fn id(raw: u64) -> Snowflake {
        Snowflake::new(raw)
    }

    #[tokio::test]
    async fn test_presence_change_events() {
        let (ctx, _rx) = context();
        ServerCreateHandler.handle(server_json(), &ctx).await.unwrap();

        let update = json!({
            "user": {"id": "2", "username": "robert"},
            "guild_id": "10",
            "status": "idle",
            "activities": [{"name": "go", "type": 0}]
        });
        let events = PresenceUpdateHandler.handle(update, &ctx).await.unwrap();
        assert_eq!(
            events,
            vec![
                Event::UserChangeName {
                    user_id: id(2),
                    old: "bob".into(),
                    new: "robert".into()
                },
                Event::UserChangeStatus {
                    user_id: id(2),
                    old: UserStatus::Online,
                    new: UserStatus::Idle
                },
                Event::UserChangeActivity {
                    user_id: id(2),
                    old: Some(Activity::new(ActivityType::Playing, "chess")),
                    new: Some(Activity::new(ActivityType::Playing, "go")),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_same_presence_is_silent() {
        let (ctx, _rx) = context();
        ServerCreateHandler.handle(server_json(), &ctx).await.unwrap();
        let update = json!({
            "user": {"id": "2"},
            "status": "online",
            "activities": [{"name": "chess", "type": 0}]
        });
        assert!(PresenceUpdateHandler.handle(update, &ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_presence_for_unknown_user() {
        let (ctx, _rx) = context();
        let partial = json!({"user": {"id": "8"}, "status": "online"});
        assert!(PresenceUpdateHandler.handle(partial, &ctx).await.unwrap().is_empty());
        assert!(!ctx.cache().contains_user(id(8)));

        let full = json!({"user": {"id": "8", "username": "eve"}, "status": "dnd"});
        assert!(PresenceUpdateHandler.handle(full, &ctx).await.unwrap().is_empty());
        let eve = ctx.cache().user(id(8)).unwrap();
        assert_eq!(eve.presence.status, UserStatus::DoNotDisturb);
    }

    #[tokio::test]
    async fn test_typing_needs_cached_server_channel() {
        let (ctx, _rx) = context();
        let typing = json!({"channel_id": "20", "user_id": "2", "guild_id": "10"});
        assert!(TypingStartHandler.handle(typing.clone(), &ctx).await.unwrap().is_empty());

        ServerCreateHandler.handle(server_json(), &ctx).await.unwrap();
        let events = TypingStartHandler.handle(typing, &ctx).await.unwrap();
        assert_eq!(
            events,
            vec![Event::UserStartTyping {
                user_id: id(2),
                channel_id: id(20),
                server_id: Some(id(10))
            }]
        );

        let direct = json!({"channel_id": "99", "user_id": "2"});
        assert_eq!(TypingStartHandler.handle(direct, &ctx).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_user_update() {
        let (ctx, _rx) = context();
        ctx.cache().set_yourself(&serde_json::from_value(json!({"id": "1", "username": "cord"})).unwrap());

        let same = json!({"id": "1", "username": "cord"});
        assert!(UserUpdateHandler.handle(same, &ctx).await.unwrap().is_empty());

        let renamed = json!({"id": "1", "username": "cord2", "avatar": "abc"});
        let events = UserUpdateHandler.handle(renamed, &ctx).await.unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Event::UserChangeName { .. }));
        assert!(matches!(events[1], Event::UserChangeAvatar { .. }));
        assert_eq!(events[2], Event::UserUpdate { user_id: id(1) });
    }
}
