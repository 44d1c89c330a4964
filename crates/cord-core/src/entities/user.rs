//! User entity - an account known to the cache

use chrono::{DateTime, Utc};

use super::Presence;
use crate::payloads::{PartialUserPayload, UserPayload};
use crate::value_objects::Snowflake;

const CDN_URL: &str = "https://cdn.discordapp.com";

/// User entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Snowflake,
    pub name: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub bot: bool,
    pub presence: Presence,
}

impl User {
    pub fn new(id: Snowflake, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            discriminator: "0".to_string(),
            avatar: None,
            bot: false,
            presence: Presence::default(),
        }
    }

    /// Get the full tag: name#discriminator
    pub fn tag(&self) -> String {
        format!("{}#{}", self.name, self.discriminator)
    }

    /// Mention string, `<@id>`
    pub fn mention_tag(&self) -> String {
        format!("<@{}>", self.id)
    }

    /// Avatar url, or the default avatar for this discriminator
    pub fn avatar_url(&self) -> String {
        match &self.avatar {
            Some(hash) => format!("{CDN_URL}/avatars/{}/{hash}.png", self.id),
            None => format!("{CDN_URL}/embed/avatars/{}.png", self.default_avatar_index()),
        }
    }

    fn default_avatar_index(&self) -> u16 {
        self.discriminator.parse::<u16>().unwrap_or(0) % 5
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.id.created_at()
    }

    /// Overwrite identity fields from a full user object
    ///
    /// Returns `true` if anything changed. Presence is kept.
    pub fn apply(&mut self, payload: &UserPayload) -> bool {
        let changed = self.name != payload.username
            || self.discriminator != payload.discriminator
            || self.avatar != payload.avatar
            || self.bot != payload.bot;
        self.name.clone_from(&payload.username);
        self.discriminator.clone_from(&payload.discriminator);
        self.avatar.clone_from(&payload.avatar);
        self.bot = payload.bot;
        changed
    }

    /// Apply only the fields present in a partial user object
    pub fn apply_partial(&mut self, payload: &PartialUserPayload) -> bool {
        let mut changed = false;
        if let Some(name) = &payload.username {
            changed |= &self.name != name;
            self.name.clone_from(name);
        }
        if let Some(discriminator) = &payload.discriminator {
            changed |= &self.discriminator != discriminator;
            self.discriminator.clone_from(discriminator);
        }
        if payload.avatar.is_some() {
            changed |= self.avatar != payload.avatar;
            self.avatar.clone_from(&payload.avatar);
        }
        changed
    }
}

impl From<&UserPayload> for User {
    fn from(payload: &UserPayload) -> Self {
        Self {
            id: payload.id,
            name: payload.username.clone(),
            discriminator: payload.discriminator.clone(),
            avatar: payload.avatar.clone(),
            bot: payload.bot,
            presence: Presence::default(),
        }
    }
}
