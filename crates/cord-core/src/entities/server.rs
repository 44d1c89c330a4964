//! Server entity - metadata plus id sets of the entities it owns
//!
//! Channels, roles and emojis live in the cache's by-id maps; the server
//! only records which ids belong to it. Per-server member data (nickname,
//! roles) is an overlay keyed by user id, never stored on the user.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use super::{Overwrites, Role};
use crate::payloads::{GuildPayload, MemberPayload};
use crate::value_objects::{OverwriteSubject, Permissions, Snowflake};

/// A user's membership in a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: Snowflake,
    pub nickname: Option<String>,
    pub role_ids: BTreeSet<Snowflake>,
    pub joined_at: Option<DateTime<Utc>>,
}

impl Member {
    pub fn new(user_id: Snowflake) -> Self {
        Self {
            user_id,
            nickname: None,
            role_ids: BTreeSet::new(),
            joined_at: None,
        }
    }

    /// Build the overlay; role ids are not validated here
    pub fn from_payload(payload: &MemberPayload) -> Self {
        Self {
            user_id: payload.user.id,
            nickname: payload.nick.clone(),
            role_ids: payload.roles.iter().copied().collect(),
            joined_at: payload
                .joined_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc)),
        }
    }
}

/// Server entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub id: Snowflake,
    pub name: String,
    pub region: Option<String>,
    pub owner_id: Snowflake,
    pub icon: Option<String>,
    pub large: bool,
    /// Member count declared by the remote side; may exceed `members.len()`
    pub member_count: u64,
    pub channel_ids: BTreeSet<Snowflake>,
    pub role_ids: BTreeSet<Snowflake>,
    pub emoji_ids: BTreeSet<Snowflake>,
    pub members: HashMap<Snowflake, Member>,
}

impl Server {
    /// Metadata from a payload; owned collections start empty
    pub fn from_payload(payload: &GuildPayload) -> Self {
        Self {
            id: payload.id,
            name: payload.name.clone(),
            region: payload.region.clone(),
            owner_id: payload.owner_id,
            icon: payload.icon.clone(),
            large: payload.large,
            member_count: payload.member_count.unwrap_or(0),
            channel_ids: BTreeSet::new(),
            role_ids: BTreeSet::new(),
            emoji_ids: BTreeSet::new(),
            members: HashMap::new(),
        }
    }

    /// Update metadata from GUILD_UPDATE; owned collections are kept
    ///
    /// Returns `true` if anything changed.
    pub fn apply(&mut self, payload: &GuildPayload) -> bool {
        let before = (
            self.name.clone(),
            self.region.clone(),
            self.owner_id,
            self.icon.clone(),
        );
        self.name.clone_from(&payload.name);
        self.region.clone_from(&payload.region);
        self.owner_id = payload.owner_id;
        self.icon.clone_from(&payload.icon);
        if let Some(count) = payload.member_count {
            self.member_count = count;
        }
        before != (self.name.clone(), self.region.clone(), self.owner_id, self.icon.clone())
    }

    /// The @everyone role shares the server's id
    #[inline]
    pub fn everyone_role_id(&self) -> Snowflake {
        self.id
    }

    pub fn is_member(&self, user_id: Snowflake) -> bool {
        self.members.contains_key(&user_id)
    }

    pub fn nickname(&self, user_id: Snowflake) -> Option<&str> {
        self.members.get(&user_id)?.nickname.as_deref()
    }

    /// Whether the cached member list is known to be incomplete
    pub fn needs_member_chunk(&self) -> bool {
        self.large && self.member_count > self.members.len() as u64
    }

    /// Effective permissions of a user, optionally inside a channel
    ///
    /// `roles` are this server's roles in any order. The owner holds every
    /// permission. Otherwise the @everyone and member role permissions are
    /// combined; `ADMINISTRATOR` grants everything. Channel overwrites then
    /// apply in order: @everyone, member roles by ascending position, user.
    pub fn permissions_of(
        &self,
        user_id: Snowflake,
        roles: &[Role],
        overwrites: Option<&Overwrites>,
    ) -> Permissions {
        if user_id == self.owner_id {
            return Permissions::ALL;
        }

        let member_roles: Vec<&Role> = match self.members.get(&user_id) {
            Some(member) => roles
                .iter()
                .filter(|r| member.role_ids.contains(&r.id))
                .collect(),
            None => Vec::new(),
        };
        let everyone = roles
            .iter()
            .find(|r| r.id == self.everyone_role_id())
            .map(|r| r.permissions)
            .unwrap_or_default();
        let base = Permissions::combine(
            std::iter::once(everyone).chain(member_roles.iter().map(|r| r.permissions)),
        );
        if base.contains(Permissions::ADMINISTRATOR) {
            return Permissions::ALL;
        }

        let Some(overwrites) = overwrites else {
            return base;
        };

        let mut permissions = base;
        if let Some(o) = overwrites.get(&OverwriteSubject::Role(self.everyone_role_id())) {
            permissions = o.apply(permissions);
        }

        let mut ordered = member_roles;
        ordered.sort_by_key(|r| (r.position, std::cmp::Reverse(r.id)));
        for role in ordered {
            if let Some(o) = overwrites.get(&OverwriteSubject::Role(role.id)) {
                permissions = o.apply(permissions);
            }
        }

        if let Some(o) = overwrites.get(&OverwriteSubject::User(user_id)) {
            permissions = o.apply(permissions);
        }
        permissions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::RolePayload;
    use crate::value_objects::PermissionOverwrite;

    const SERVER: Snowflake = Snowflake::new(10);
    const OWNER: Snowflake = Snowflake::new(1);
    const ALICE: Snowflake = Snowflake::new(2);

    fn role(id: u64, position: i32, permissions: Permissions) -> Role {
        Role::from_payload(
            SERVER,
            &RolePayload {
                id: Snowflake::new(id),
                name: format!("role-{id}"),
                color: 0,
                hoist: false,
                position,
                permissions,
                managed: false,
                mentionable: false,
            },
        )
    }

    fn server() -> Server {
        let payload: GuildPayload = serde_json::from_value(serde_json::json!({
            "id": "10",
            "name": "Test",
            "owner_id": "1",
            "large": true,
            "member_count": 3
        }))
        .unwrap();
        let mut server = Server::from_payload(&payload);
        let mut alice = Member::new(ALICE);
        alice.role_ids.insert(Snowflake::new(20));
        alice.role_ids.insert(Snowflake::new(21));
        server.members.insert(ALICE, alice);
        server
    }

    fn roles() -> Vec<Role> {
        vec![
            role(10, 0, Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES),
            role(20, 1, Permissions::ADD_REACTIONS),
            role(21, 2, Permissions::MANAGE_MESSAGES),
        ]
    }

    fn overwrite(subject: OverwriteSubject, allow: Permissions, deny: Permissions) -> (OverwriteSubject, PermissionOverwrite) {
        (subject, PermissionOverwrite::new(subject, allow, deny))
    }

    #[test]
    fn test_owner_has_everything() {
        assert_eq!(server().permissions_of(OWNER, &roles(), None), Permissions::ALL);
    }

    #[test]
    fn test_base_permissions() {
        let perms = server().permissions_of(ALICE, &roles(), None);
        assert!(perms.contains(Permissions::SEND_MESSAGES));
        assert!(perms.contains(Permissions::ADD_REACTIONS));
        assert!(perms.contains(Permissions::MANAGE_MESSAGES));
        assert!(!perms.contains(Permissions::KICK_MEMBERS));

        let stranger = server().permissions_of(Snowflake::new(99), &roles(), None);
        assert_eq!(stranger, Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES);
    }

    #[test]
    fn test_administrator_ignores_overwrites() {
        let mut roles = roles();
        roles[1].permissions |= Permissions::ADMINISTRATOR;
        let overwrites: Overwrites = [overwrite(
            OverwriteSubject::User(ALICE),
            Permissions::empty(),
            Permissions::VIEW_CHANNEL,
        )]
        .into_iter()
        .collect();
        assert_eq!(
            server().permissions_of(ALICE, &roles, Some(&overwrites)),
            Permissions::ALL
        );
    }

    #[test]
    fn test_overwrite_precedence() {
        let overwrites: Overwrites = [
            // @everyone loses send
            overwrite(
                OverwriteSubject::Role(SERVER),
                Permissions::empty(),
                Permissions::SEND_MESSAGES,
            ),
            // lower role denies reactions, higher role allows them back
            overwrite(
                OverwriteSubject::Role(Snowflake::new(20)),
                Permissions::empty(),
                Permissions::ADD_REACTIONS,
            ),
            overwrite(
                OverwriteSubject::Role(Snowflake::new(21)),
                Permissions::ADD_REACTIONS,
                Permissions::empty(),
            ),
            // user overwrite wins last
            overwrite(
                OverwriteSubject::User(ALICE),
                Permissions::SEND_MESSAGES,
                Permissions::MANAGE_MESSAGES,
            ),
        ]
        .into_iter()
        .collect();

        let perms = server().permissions_of(ALICE, &roles(), Some(&overwrites));
        assert!(perms.contains(Permissions::SEND_MESSAGES));
        assert!(perms.contains(Permissions::ADD_REACTIONS));
        assert!(!perms.contains(Permissions::MANAGE_MESSAGES));
        assert!(perms.contains(Permissions::VIEW_CHANNEL));
    }

    #[test]
    fn test_needs_member_chunk() {
        let mut server = server();
        assert!(server.needs_member_chunk());
        server.members.insert(OWNER, Member::new(OWNER));
        server.members.insert(Snowflake::new(3), Member::new(Snowflake::new(3)));
        assert!(!server.needs_member_chunk());
    }

    #[test]
    fn test_apply_keeps_collections() {
        let mut server = server();
        let update: GuildPayload = serde_json::from_value(serde_json::json!({
            "id": "10", "name": "Renamed", "owner_id": "1"
        }))
        .unwrap();
        assert!(server.apply(&update));
        assert_eq!(server.name, "Renamed");
        assert!(server.is_member(ALICE));
        assert_eq!(server.member_count, 3);
        assert!(!server.apply(&update));
    }
}
