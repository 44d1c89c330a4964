//! Message entity - a chat message with its reactions

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::{Attachment, Embed, ReactionEmoji};
use crate::payloads::{MessagePayload, MessageUpdatePayload};
use crate::value_objects::Snowflake;

/// Who wrote a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageAuthor {
    /// A user resolvable through the cache
    User(Snowflake),
    /// Webhooks are not users; the author is kept inline
    Webhook(WebhookAuthor),
}

impl MessageAuthor {
    pub fn id(&self) -> Snowflake {
        match self {
            Self::User(id) => *id,
            Self::Webhook(author) => author.id,
        }
    }

    pub fn is_webhook(&self) -> bool {
        matches!(self, Self::Webhook(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookAuthor {
    pub id: Snowflake,
    pub name: String,
    pub avatar: Option<String>,
}

/// One emoji's reactions on a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub emoji: ReactionEmoji,
    pub count: u32,
    /// Whether the connected account reacted
    pub me: bool,
    /// Reacting users seen since the message was cached; may be a sample
    pub users: BTreeSet<Snowflake>,
}

impl Reaction {
    fn new(emoji: ReactionEmoji) -> Self {
        Self {
            emoji,
            count: 0,
            me: false,
            users: BTreeSet::new(),
        }
    }

    /// Whether users reacted that were never observed individually
    fn has_unseen_users(&self) -> bool {
        self.count as usize > self.users.len()
    }
}

/// Message entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub server_id: Option<Snowflake>,
    pub author: MessageAuthor,
    pub content: String,
    pub embeds: Vec<Embed>,
    pub attachments: Vec<Attachment>,
    pub reactions: Vec<Reaction>,
    pub pinned: bool,
    pub tts: bool,
    pub mention_everyone: bool,
    pub edited_at: Option<DateTime<Utc>>,
    /// Nonce echoed from the send request
    pub nonce: Option<String>,
    /// Exempt from capacity and age eviction
    pub cached_forever: bool,
}

impl Message {
    pub fn created_at(&self) -> DateTime<Utc> {
        self.id.created_at()
    }

    /// Check if message has been edited
    #[inline]
    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    pub fn reaction(&self, emoji: &ReactionEmoji) -> Option<&Reaction> {
        self.reactions.iter().find(|r| r.emoji.matches(emoji))
    }

    /// Record a user's reaction
    ///
    /// Creates the reaction entry for the first use of an emoji. Returns
    /// `false` if the user was already recorded for that emoji.
    pub fn add_reaction(&mut self, emoji: &ReactionEmoji, user_id: Snowflake, is_self: bool) -> bool {
        let index = match self.reactions.iter().position(|r| r.emoji.matches(emoji)) {
            Some(index) => index,
            None => {
                self.reactions.push(Reaction::new(emoji.clone()));
                self.reactions.len() - 1
            }
        };
        let reaction = &mut self.reactions[index];
        if is_self {
            reaction.me = true;
        }
        if reaction.users.insert(user_id) {
            reaction.count += 1;
            true
        } else {
            false
        }
    }

    /// Remove a user's reaction; drops the entry once its count hits zero
    ///
    /// Returns `false` if there was nothing to remove.
    pub fn remove_reaction(&mut self, emoji: &ReactionEmoji, user_id: Snowflake, is_self: bool) -> bool {
        let Some(index) = self.reactions.iter().position(|r| r.emoji.matches(emoji)) else {
            return false;
        };
        let reaction = &mut self.reactions[index];
        let removed = reaction.users.remove(&user_id) || reaction.has_unseen_users();
        if !removed {
            return false;
        }
        reaction.count = reaction.count.saturating_sub(1);
        if is_self {
            reaction.me = false;
        }
        if reaction.count == 0 {
            self.reactions.remove(index);
        }
        true
    }

    pub fn remove_all_reactions(&mut self) {
        self.reactions.clear();
    }

    /// Apply a partial edit
    ///
    /// Returns the previous content if the content changed.
    pub fn apply_update(&mut self, payload: &MessageUpdatePayload) -> Option<String> {
        if payload.edited_timestamp.is_some() {
            self.edited_at = payload.edited_timestamp;
        }
        if let Some(embeds) = &payload.embeds {
            self.embeds.clone_from(embeds);
        }
        if let Some(pinned) = payload.pinned {
            self.pinned = pinned;
        }
        match &payload.content {
            Some(content) if *content != self.content => {
                Some(std::mem::replace(&mut self.content, content.clone()))
            }
            _ => None,
        }
    }
}

impl From<&MessagePayload> for Message {
    fn from(payload: &MessagePayload) -> Self {
        let author = match payload.webhook_id {
            Some(id) => MessageAuthor::Webhook(WebhookAuthor {
                id,
                name: payload.author.username.clone(),
                avatar: payload.author.avatar.clone(),
            }),
            None => MessageAuthor::User(payload.author.id),
        };
        let reactions = payload
            .reactions
            .iter()
            .map(|r| Reaction {
                emoji: ReactionEmoji::from(&r.emoji),
                count: r.count,
                me: r.me,
                users: BTreeSet::new(),
            })
            .collect();
        let nonce = payload.nonce.as_ref().map(|n| match n {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });

        Self {
            id: payload.id,
            channel_id: payload.channel_id,
            server_id: payload.guild_id,
            author,
            content: payload.content.clone(),
            embeds: payload.embeds.clone(),
            attachments: payload.attachments.clone(),
            reactions,
            pinned: payload.pinned,
            tts: payload.tts,
            mention_everyone: payload.mention_everyone,
            edited_at: payload.edited_timestamp,
            nonce,
            cached_forever: false,
        }
    }
}
