//! Entity cache
//!
//! One `DashMap` per entity kind, so unrelated updates never contend on a
//! single lock. Guards of two maps are never held at the same time.
//!
//! Publication order keeps readers consistent: an entity is inserted into
//! its by-id map before any server or category lists it, and it is unlinked
//! from servers and categories before it is removed by id.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use cord_core::payloads::UserPayload;
use cord_core::{
    Channel, CustomEmoji, Member, Permissions, Role, Server, Snowflake, User,
};
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;

use crate::message_cache::MessageCache;

/// A complete server, built off-cache and published in one step
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    server: Server,
    channels: Vec<Channel>,
    roles: Vec<Role>,
    emojis: Vec<CustomEmoji>,
}

impl ServerSnapshot {
    /// Assemble a server with its owned entities
    ///
    /// Links channels into their categories in position order, fills the
    /// server's id sets, drops member role ids that name no role, and
    /// builds each role's member index.
    pub fn new(
        mut server: Server,
        mut channels: Vec<Channel>,
        mut roles: Vec<Role>,
        emojis: Vec<CustomEmoji>,
    ) -> Self {
        channels.retain(|c| c.server_id() == Some(server.id));
        channels.sort_by_key(|c| (c.position().unwrap_or(0), c.id()));

        let children: Vec<(Snowflake, Snowflake)> = channels
            .iter()
            .filter_map(|c| c.category_id().map(|parent| (parent, c.id())))
            .collect();
        for channel in &mut channels {
            let id = channel.id();
            if let Some(category) = channel.as_category_mut() {
                category.children = children
                    .iter()
                    .filter(|(parent, _)| *parent == id)
                    .map(|(_, child)| *child)
                    .collect();
            }
        }

        server.channel_ids = channels.iter().map(Channel::id).collect();
        server.role_ids = roles.iter().map(|r| r.id).collect();
        server.emoji_ids = emojis.iter().map(|e| e.id).collect();

        for member in server.members.values_mut() {
            member.role_ids.retain(|id| server.role_ids.contains(id));
        }
        for role in &mut roles {
            role.member_ids = server
                .members
                .values()
                .filter(|m| m.role_ids.contains(&role.id))
                .map(|m| m.user_id)
                .collect();
        }

        Self {
            server,
            channels,
            roles,
            emojis,
        }
    }

    pub fn id(&self) -> Snowflake {
        self.server.id
    }

    pub fn server(&self) -> &Server {
        &self.server
    }
}

/// Outcome of publishing a server snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerInsert {
    /// First time this server is seen
    Joined,
    /// Was in the unavailable set
    BecameAvailable,
    /// Was already cached and available
    Replaced,
}

/// Changes made by a member update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberDiff {
    /// `Some(old)` if the nickname changed
    pub nickname: Option<Option<String>>,
    pub roles_added: Vec<Snowflake>,
    pub roles_removed: Vec<Snowflake>,
}

/// Changes made by replacing a server's emoji list
#[derive(Debug, Clone, Default)]
pub struct EmojiDiff {
    pub created: Vec<Snowflake>,
    pub updated: Vec<Snowflake>,
    pub deleted: Vec<CustomEmoji>,
}

/// Comparable copy of the whole cache, for consistency checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub servers: BTreeMap<Snowflake, Server>,
    pub unavailable: BTreeSet<Snowflake>,
    pub channels: BTreeMap<Snowflake, Channel>,
    pub users: BTreeMap<Snowflake, User>,
    pub roles: BTreeMap<Snowflake, Role>,
    pub emojis: BTreeMap<Snowflake, CustomEmoji>,
    pub messages: BTreeSet<Snowflake>,
    pub yourself: Option<Snowflake>,
}

/// Shared cache of every entity received from the gateway or REST
pub struct EntityCache {
    servers: DashMap<Snowflake, Server>,
    unavailable: DashSet<Snowflake>,
    channels: DashMap<Snowflake, Channel>,
    /// Recipient user id to private channel id
    private_channels: DashMap<Snowflake, Snowflake>,
    users: DashMap<Snowflake, User>,
    roles: DashMap<Snowflake, Role>,
    emojis: DashMap<Snowflake, CustomEmoji>,
    yourself: RwLock<Option<Snowflake>>,
    messages: Arc<MessageCache>,
}

impl EntityCache {
    pub fn new(messages: MessageCache) -> Self {
        Self {
            servers: DashMap::new(),
            unavailable: DashSet::new(),
            channels: DashMap::new(),
            private_channels: DashMap::new(),
            users: DashMap::new(),
            roles: DashMap::new(),
            emojis: DashMap::new(),
            yourself: RwLock::new(None),
            messages: Arc::new(messages),
        }
    }

    /// Create a new cache wrapped in Arc
    pub fn new_shared(messages: MessageCache) -> Arc<Self> {
        Arc::new(Self::new(messages))
    }

    pub fn messages(&self) -> &Arc<MessageCache> {
        &self.messages
    }

    // =========================================================================
    // Yourself
    // =========================================================================

    /// The connected account
    pub fn yourself(&self) -> Option<User> {
        let id = (*self.yourself.read())?;
        self.user(id)
    }

    pub fn yourself_id(&self) -> Option<Snowflake> {
        *self.yourself.read()
    }

    /// Record the connected account from READY
    ///
    /// Returns `false` if a different account was already recorded; the
    /// new one replaces it.
    pub fn set_yourself(&self, payload: &UserPayload) -> bool {
        self.upsert_user(payload);
        let mut yourself = self.yourself.write();
        let consistent = yourself.map_or(true, |id| id == payload.id);
        if !consistent {
            tracing::warn!(
                previous = ?*yourself,
                current = %payload.id,
                "Connected account changed between sessions"
            );
        }
        *yourself = Some(payload.id);
        consistent
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub fn user(&self, id: Snowflake) -> Option<User> {
        self.users.get(&id).map(|u| u.clone())
    }

    pub fn contains_user(&self, id: Snowflake) -> bool {
        self.users.contains_key(&id)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Insert a user or refresh its identity fields
    ///
    /// Returns the previous version if the user was cached.
    pub fn upsert_user(&self, payload: &UserPayload) -> Option<User> {
        match self.users.get_mut(&payload.id) {
            Some(mut user) => {
                let previous = user.clone();
                user.apply(payload);
                Some(previous)
            }
            None => {
                self.users.insert(payload.id, User::from(payload));
                None
            }
        }
    }

    pub fn update_user<R>(&self, id: Snowflake, f: impl FnOnce(&mut User) -> R) -> Option<R> {
        self.users.get_mut(&id).map(|mut u| f(&mut u))
    }

    // =========================================================================
    // Servers
    // =========================================================================

    pub fn server(&self, id: Snowflake) -> Option<Server> {
        self.servers.get(&id).map(|s| s.clone())
    }

    pub fn contains_server(&self, id: Snowflake) -> bool {
        self.servers.contains_key(&id)
    }

    pub fn server_ids(&self) -> Vec<Snowflake> {
        self.servers.iter().map(|s| *s.key()).collect()
    }

    pub fn servers(&self) -> Vec<Server> {
        self.servers.iter().map(|s| s.value().clone()).collect()
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub fn update_server<R>(&self, id: Snowflake, f: impl FnOnce(&mut Server) -> R) -> Option<R> {
        self.servers.get_mut(&id).map(|mut s| f(&mut s))
    }

    /// Mark a server as unavailable without caching it
    pub fn add_unavailable(&self, id: Snowflake) {
        self.unavailable.insert(id);
    }

    pub fn is_unavailable(&self, id: Snowflake) -> bool {
        self.unavailable.contains(&id)
    }

    pub fn unavailable_servers(&self) -> Vec<Snowflake> {
        self.unavailable.iter().map(|id| *id).collect()
    }

    /// Publish a complete server
    ///
    /// Owned entities go in by id first, the server last. Entities the
    /// previous version owned but the snapshot lacks are removed after.
    pub fn insert_server(&self, snapshot: ServerSnapshot) -> ServerInsert {
        let ServerSnapshot {
            server,
            channels,
            roles,
            emojis,
        } = snapshot;
        let id = server.id;

        let stale = self.servers.get(&id).map(|old| {
            (
                old.channel_ids.clone(),
                old.role_ids.clone(),
                old.emoji_ids.clone(),
            )
        });

        for channel in channels {
            self.channels.insert(channel.id(), channel);
        }
        for role in roles {
            self.roles.insert(role.id, role);
        }
        for emoji in emojis {
            self.emojis.insert(emoji.id, emoji);
        }

        let (channel_ids, role_ids, emoji_ids) = (
            server.channel_ids.clone(),
            server.role_ids.clone(),
            server.emoji_ids.clone(),
        );
        self.servers.insert(id, server);
        let was_unavailable = self.unavailable.remove(&id).is_some();

        if let Some((old_channels, old_roles, old_emojis)) = &stale {
            for gone in old_channels.difference(&channel_ids) {
                self.channels.remove(gone);
                self.messages.remove_channel(*gone);
            }
            for gone in old_roles.difference(&role_ids) {
                self.roles.remove(gone);
            }
            for gone in old_emojis.difference(&emoji_ids) {
                self.emojis.remove(gone);
            }
        }

        match (was_unavailable, stale.is_some()) {
            (true, _) => ServerInsert::BecameAvailable,
            (false, true) => ServerInsert::Replaced,
            (false, false) => ServerInsert::Joined,
        }
    }

    /// Drop a server and everything it owns
    ///
    /// Users stay cached; they may be shared with other servers.
    pub fn remove_server(&self, id: Snowflake) -> Option<Server> {
        let (_, server) = self.servers.remove(&id)?;
        for channel_id in &server.channel_ids {
            self.channels.remove(channel_id);
            self.messages.remove_channel(*channel_id);
        }
        for role_id in &server.role_ids {
            self.roles.remove(role_id);
        }
        for emoji_id in &server.emoji_ids {
            self.emojis.remove(emoji_id);
        }
        Some(server)
    }

    /// Evict a server and remember it as unavailable
    pub fn mark_unavailable(&self, id: Snowflake) -> Option<Server> {
        let removed = self.remove_server(id);
        self.unavailable.insert(id);
        removed
    }

    /// Stop tracking an unavailable server the account is no longer in
    pub fn forget_unavailable(&self, id: Snowflake) -> bool {
        self.unavailable.remove(&id).is_some()
    }

    // =========================================================================
    // Channels
    // =========================================================================

    pub fn channel(&self, id: Snowflake) -> Option<Channel> {
        self.channels.get(&id).map(|c| c.clone())
    }

    pub fn contains_channel(&self, id: Snowflake) -> bool {
        self.channels.contains_key(&id)
    }

    /// Channels of a server ordered by position
    pub fn channels_of(&self, server_id: Snowflake) -> Vec<Channel> {
        let ids = self
            .servers
            .get(&server_id)
            .map(|s| s.channel_ids.clone())
            .unwrap_or_default();
        let mut channels: Vec<Channel> = ids.into_iter().filter_map(|id| self.channel(id)).collect();
        channels.sort_by_key(|c| (c.position().unwrap_or(0), c.id()));
        channels
    }

    /// Private channel with a user, if one is cached
    pub fn private_channel_with(&self, user_id: Snowflake) -> Option<Channel> {
        let channel_id = *self.private_channels.get(&user_id)?;
        self.channel(channel_id)
    }

    /// Insert or update a channel and link it to its server and category
    ///
    /// Returns the previous version. Fails if a server channel names a
    /// server that is not cached.
    pub fn insert_channel(&self, channel: Channel) -> Result<Option<Channel>, cord_core::DomainError> {
        let id = channel.id();
        if let Some(server_id) = channel.server_id() {
            if !self.servers.contains_key(&server_id) {
                return Err(cord_core::DomainError::UnknownServer(server_id));
            }
        }

        let previous = match self.channels.get_mut(&id) {
            Some(mut existing) => {
                let previous = existing.clone();
                existing.apply(channel.clone());
                Some(previous)
            }
            None => {
                self.channels.insert(id, channel.clone());
                None
            }
        };

        let recipient = channel.as_private_channel().map(|p| p.recipient_id);
        if let Some(old) = previous.as_ref().and_then(Channel::as_private_channel) {
            if recipient != Some(old.recipient_id) {
                self.private_channels
                    .remove_if(&old.recipient_id, |_, channel_id| *channel_id == id);
            }
        }
        if let Some(recipient) = recipient {
            self.private_channels.insert(recipient, id);
        }
        if let Some(server_id) = channel.server_id() {
            self.update_server(server_id, |s| s.channel_ids.insert(id));
        }

        let old_category = previous.as_ref().and_then(Channel::category_id);
        let new_category = channel.category_id();
        if old_category != new_category {
            if let Some(old) = old_category {
                self.unlink_child(old, id);
            }
        }
        if let Some(parent) = new_category {
            self.link_child(parent, id);
        }
        Ok(previous)
    }

    /// Remove a channel, unlinking it from its server and category first
    pub fn remove_channel(&self, id: Snowflake) -> Option<Channel> {
        let channel = self.channel(id)?;
        if let Some(parent) = channel.category_id() {
            self.unlink_child(parent, id);
        }
        if let Some(server_id) = channel.server_id() {
            self.update_server(server_id, |s| s.channel_ids.remove(&id));
        }
        if let Some(private) = channel.as_private_channel() {
            self.private_channels
                .remove_if(&private.recipient_id, |_, channel_id| *channel_id == id);
        }
        let (_, removed) = self.channels.remove(&id)?;
        self.messages.remove_channel(id);
        Some(removed)
    }

    fn link_child(&self, category_id: Snowflake, child_id: Snowflake) {
        let position = |id: Snowflake| {
            self.channels
                .get(&id)
                .and_then(|c| c.position())
                .unwrap_or(0)
        };
        let Some(mut children) = self
            .channels
            .get(&category_id)
            .and_then(|c| c.as_category().map(|cat| cat.children.clone()))
        else {
            return;
        };
        if !children.contains(&child_id) {
            children.push(child_id);
        }
        let mut keyed: Vec<(i32, Snowflake)> = children.iter().map(|id| (position(*id), *id)).collect();
        keyed.sort_unstable();
        let ordered: Vec<Snowflake> = keyed.into_iter().map(|(_, id)| id).collect();

        if let Some(mut category) = self.channels.get_mut(&category_id) {
            if let Some(cat) = category.as_category_mut() {
                cat.children = ordered;
            }
        }
    }

    fn unlink_child(&self, category_id: Snowflake, child_id: Snowflake) {
        if let Some(mut category) = self.channels.get_mut(&category_id) {
            if let Some(cat) = category.as_category_mut() {
                cat.children.retain(|id| *id != child_id);
            }
        }
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub fn role(&self, id: Snowflake) -> Option<Role> {
        self.roles.get(&id).map(|r| r.clone())
    }

    /// Roles of a server ordered by position, lowest first
    pub fn roles_of(&self, server_id: Snowflake) -> Vec<Role> {
        let ids = self
            .servers
            .get(&server_id)
            .map(|s| s.role_ids.clone())
            .unwrap_or_default();
        let mut roles: Vec<Role> = ids.into_iter().filter_map(|id| self.role(id)).collect();
        roles.sort_by_key(|r| (r.position, std::cmp::Reverse(r.id)));
        roles
    }

    /// Insert a new role or update an existing one
    ///
    /// An existing role keeps its member index. Returns the previous version.
    pub fn insert_role(&self, role: Role) -> Result<Option<Role>, cord_core::DomainError> {
        if !self.servers.contains_key(&role.server_id) {
            return Err(cord_core::DomainError::UnknownServer(role.server_id));
        }
        let id = role.id;
        let server_id = role.server_id;
        let previous = match self.roles.get_mut(&id) {
            Some(mut existing) => {
                let previous = existing.clone();
                let members = std::mem::take(&mut existing.member_ids);
                *existing = role;
                existing.member_ids = members;
                Some(previous)
            }
            None => {
                self.roles.insert(id, role);
                None
            }
        };
        self.update_server(server_id, |s| s.role_ids.insert(id));
        Ok(previous)
    }

    /// Remove a role from its server, its members and the cache
    pub fn remove_role(&self, id: Snowflake) -> Option<Role> {
        let server_id = self.roles.get(&id)?.server_id;
        self.update_server(server_id, |s| {
            s.role_ids.remove(&id);
            for member in s.members.values_mut() {
                member.role_ids.remove(&id);
            }
        });
        self.roles.remove(&id).map(|(_, role)| role)
    }

    // =========================================================================
    // Members
    // =========================================================================

    pub fn member(&self, server_id: Snowflake, user_id: Snowflake) -> Option<Member> {
        self.servers.get(&server_id)?.members.get(&user_id).cloned()
    }

    pub fn is_member(&self, server_id: Snowflake, user_id: Snowflake) -> bool {
        self.servers
            .get(&server_id)
            .is_some_and(|s| s.members.contains_key(&user_id))
    }

    /// Add or replace a membership and index its roles
    ///
    /// Role ids that name no role of the server are dropped. Returns
    /// `false` if the user was already a member.
    pub fn add_member(&self, server_id: Snowflake, mut member: Member) -> Result<bool, cord_core::DomainError> {
        let user_id = member.user_id;
        let (is_new, old_roles) = {
            let mut server = self
                .servers
                .get_mut(&server_id)
                .ok_or(cord_core::DomainError::UnknownServer(server_id))?;
            member.role_ids.retain(|id| server.role_ids.contains(id));
            let previous = server.members.insert(user_id, member.clone());
            let is_new = previous.is_none();
            if is_new && server.members.len() as u64 > server.member_count {
                server.member_count = server.members.len() as u64;
            }
            (is_new, previous.map(|m| m.role_ids).unwrap_or_default())
        };

        for role_id in old_roles.difference(&member.role_ids) {
            self.update_role_members(*role_id, |ids| ids.remove(&user_id));
        }
        for role_id in &member.role_ids {
            self.update_role_members(*role_id, |ids| ids.insert(user_id));
        }
        Ok(is_new)
    }

    /// A user joined: add the membership and bump the declared count
    pub fn member_joined(&self, server_id: Snowflake, member: Member) -> Result<bool, cord_core::DomainError> {
        let declared = self
            .servers
            .get(&server_id)
            .map(|s| s.member_count)
            .ok_or(cord_core::DomainError::UnknownServer(server_id))?;
        let is_new = self.add_member(server_id, member)?;
        if is_new {
            self.update_server(server_id, |s| {
                s.member_count = declared.saturating_add(1).max(s.members.len() as u64);
            });
        }
        Ok(is_new)
    }

    /// Remove a membership from the server, its nickname overlay and every
    /// role's member index
    pub fn remove_member(&self, server_id: Snowflake, user_id: Snowflake) -> Option<Member> {
        let member = self.update_server(server_id, |s| {
            let removed = s.members.remove(&user_id);
            if removed.is_some() {
                s.member_count = s.member_count.saturating_sub(1);
            }
            removed
        })??;
        for role_id in &member.role_ids {
            self.update_role_members(*role_id, |ids| ids.remove(&user_id));
        }
        Some(member)
    }

    /// Apply a nickname and role list, reporting what changed
    ///
    /// `None` if the user is not a cached member.
    pub fn update_member(
        &self,
        server_id: Snowflake,
        user_id: Snowflake,
        nickname: Option<String>,
        roles: BTreeSet<Snowflake>,
    ) -> Option<MemberDiff> {
        let diff = self.update_server(server_id, |s| {
            let known_roles = s.role_ids.clone();
            let member = s.members.get_mut(&user_id)?;
            let roles: BTreeSet<Snowflake> = roles
                .into_iter()
                .filter(|id| known_roles.contains(id))
                .collect();

            let mut diff = MemberDiff::default();
            if member.nickname != nickname {
                diff.nickname = Some(std::mem::replace(&mut member.nickname, nickname));
            }
            diff.roles_added = roles.difference(&member.role_ids).copied().collect();
            diff.roles_removed = member.role_ids.difference(&roles).copied().collect();
            member.role_ids = roles;
            Some(diff)
        })??;

        for role_id in &diff.roles_added {
            self.update_role_members(*role_id, |ids| ids.insert(user_id));
        }
        for role_id in &diff.roles_removed {
            self.update_role_members(*role_id, |ids| ids.remove(&user_id));
        }
        Some(diff)
    }

    fn update_role_members<R>(&self, role_id: Snowflake, f: impl FnOnce(&mut HashSet<Snowflake>) -> R) {
        if let Some(mut role) = self.roles.get_mut(&role_id) {
            f(&mut role.member_ids);
        }
    }

    // =========================================================================
    // Emojis
    // =========================================================================

    pub fn emoji(&self, id: Snowflake) -> Option<CustomEmoji> {
        self.emojis.get(&id).map(|e| e.clone())
    }

    pub fn emojis_of(&self, server_id: Snowflake) -> Vec<CustomEmoji> {
        let ids = self
            .servers
            .get(&server_id)
            .map(|s| s.emoji_ids.clone())
            .unwrap_or_default();
        ids.into_iter().filter_map(|id| self.emoji(id)).collect()
    }

    /// Replace a server's full emoji list
    pub fn replace_emojis(&self, server_id: Snowflake, emojis: Vec<CustomEmoji>) -> Option<EmojiDiff> {
        let old_ids = self.servers.get(&server_id)?.emoji_ids.clone();
        let new_ids: BTreeSet<Snowflake> = emojis.iter().map(|e| e.id).collect();
        let mut diff = EmojiDiff::default();

        for emoji in emojis {
            let id = emoji.id;
            match self.emojis.insert(id, emoji.clone()) {
                None => diff.created.push(id),
                Some(previous) if previous != emoji => diff.updated.push(id),
                Some(_) => {}
            }
        }
        self.update_server(server_id, |s| s.emoji_ids = new_ids.clone());
        for gone in old_ids.difference(&new_ids) {
            if let Some((_, emoji)) = self.emojis.remove(gone) {
                diff.deleted.push(emoji);
            }
        }
        Some(diff)
    }

    // =========================================================================
    // Permissions
    // =========================================================================

    /// Server-wide permissions of a user
    pub fn server_permissions(&self, server_id: Snowflake, user_id: Snowflake) -> Option<Permissions> {
        let server = self.server(server_id)?;
        let roles = self.roles_of(server_id);
        Some(server.permissions_of(user_id, &roles, None))
    }

    /// Permissions of a user in a channel, overwrites applied
    ///
    /// Private and group channels grant everything.
    pub fn channel_permissions(&self, channel_id: Snowflake, user_id: Snowflake) -> Option<Permissions> {
        let channel = self.channel(channel_id)?;
        let Some(server_id) = channel.server_id() else {
            return Some(Permissions::ALL);
        };
        let server = self.server(server_id)?;
        let roles = self.roles_of(server_id);
        Some(server.permissions_of(user_id, &roles, channel.overwrites()))
    }

    // =========================================================================
    // Whole-cache views
    // =========================================================================

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            servers: self.servers.iter().map(|e| (*e.key(), e.value().clone())).collect(),
            unavailable: self.unavailable.iter().map(|id| *id).collect(),
            channels: self.channels.iter().map(|e| (*e.key(), e.value().clone())).collect(),
            users: self.users.iter().map(|e| (*e.key(), e.value().clone())).collect(),
            roles: self.roles.iter().map(|e| (*e.key(), e.value().clone())).collect(),
            emojis: self.emojis.iter().map(|e| (*e.key(), e.value().clone())).collect(),
            messages: self.messages.ids(),
            yourself: self.yourself_id(),
        }
    }
}

impl std::fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCache")
            .field("servers", &self.servers.len())
            .field("unavailable", &self.unavailable.len())
            .field("channels", &self.channels.len())
            .field("users", &self.users.len())
            .field("roles", &self.roles.len())
            .field("emojis", &self.emojis.len())
            .field("messages", &self.messages.len())
            .finish()
    }
}
