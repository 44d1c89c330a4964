//! Payload builders for handler tests

use std::time::Duration;

use cord_cache::{EntityCache, MessageCache};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::{HandlerContext, ShardInfo};
use crate::protocol::GatewayMessage;

pub(crate) fn context() -> (HandlerContext, mpsc::Receiver<GatewayMessage>) {
    let cache = EntityCache::new_shared(MessageCache::new(50, Duration::from_secs(3600)));
    let (tx, rx) = mpsc::channel(16);
    (HandlerContext::new(cache, ShardInfo::new(0, 1)).with_gateway(tx), rx)
}

pub(crate) fn ready_json(servers: &[u64]) -> Value {
    let guilds: Vec<Value> = servers
        .iter()
        .map(|id| json!({"id": id.to_string(), "unavailable": true}))
        .collect();
    json!({
        "v": 10,
        "user": {"id": "1", "username": "cord", "discriminator": "0001", "bot": true},
        "guilds": guilds,
        "session_id": "session-1",
        "private_channels": []
    })
}

/// Server 10: category 40 holding text channels 20 and 21, voice channel
/// 50 at the top level, roles 30 and 31, members 1 (owner) and 2
pub(crate) fn server_json() -> Value {
    json!({
        "id": "10",
        "name": "Test Server",
        "owner_id": "1",
        "large": false,
        "member_count": 2,
        "roles": [
            {"id": "10", "name": "@everyone", "permissions": "3072", "position": 0},
            {"id": "30", "name": "mods", "permissions": "8192", "position": 1},
            {"id": "31", "name": "admins", "permissions": "8", "position": 2}
        ],
        "channels": [
            {"id": "21", "type": 0, "name": "second", "position": 1, "parent_id": "40"},
            {"id": "20", "type": 0, "name": "general", "position": 0, "parent_id": "40"},
            {"id": "40", "type": 4, "name": "Text", "position": 0},
            {"id": "50", "type": 2, "name": "Voice", "position": 1, "bitrate": 64000}
        ],
        "members": [
            {"user": {"id": "1", "username": "cord", "bot": true}, "roles": ["30"]},
            {"user": {"id": "2", "username": "bob"}, "nick": "bobby", "roles": ["30", "31"]}
        ],
        "emojis": [
            {"id": "70", "name": "blob", "animated": false}
        ],
        "presences": [
            {"user": {"id": "2"}, "status": "online", "activities": [{"name": "chess", "type": 0}]}
        ]
    })
}

pub(crate) fn bare_guild_json(id: u64) -> Value {
    json!({
        "id": id.to_string(),
        "name": format!("Server {id}"),
        "owner_id": "1",
        "member_count": 1,
        "roles": [{"id": id.to_string(), "name": "@everyone", "permissions": "0", "position": 0}],
        "members": [{"user": {"id": "1", "username": "cord"}, "roles": []}]
    })
}

pub(crate) fn message_json(id: u64, channel: u64) -> Value {
    json!({
        "id": id.to_string(),
        "channel_id": channel.to_string(),
        "guild_id": "10",
        "author": {"id": "2", "username": "bob"},
        "content": "hello",
        "timestamp": "2017-07-11T17:27:07.299000+00:00",
        "tts": false,
        "embeds": [],
        "attachments": []
    })
}
