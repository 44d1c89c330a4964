//! Message service
//!
//! Sending, editing and deleting messages, history, pins and reactions.

use cord_cache::MessageHistory;
use cord_core::{Message, ReactionEmoji, Snowflake};
use cord_rest::{CreateMessage, EditMessage, HistoryQuery};
use tracing::{debug, info, instrument};

use crate::client::Client;
use crate::error::ClientResult;

/// Message service
pub struct MessageService<'a> {
    client: &'a Client,
}

impl<'a> MessageService<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Send a plain text message
    pub async fn send(&self, channel_id: Snowflake, content: impl Into<String>) -> ClientResult<Message> {
        self.send_message(channel_id, &CreateMessage::text(content)).await
    }

    #[instrument(skip(self, message))]
    pub async fn send_message(&self, channel_id: Snowflake, message: &CreateMessage) -> ClientResult<Message> {
        let payload = self.client.rest().create_message(channel_id, message).await?;
        info!(message_id = %payload.id, channel_id = %channel_id, "Message sent");
        Ok(Message::from(&payload))
    }

    /// Cached message, fetched and cached on a miss
    #[instrument(skip(self))]
    pub async fn get(&self, channel_id: Snowflake, message_id: Snowflake) -> ClientResult<Message> {
        if let Some(message) = self.client.cache().messages().get(message_id) {
            return Ok(message);
        }
        let payload = self.client.rest().get_message(channel_id, message_id).await?;
        let message = Message::from(&payload);
        self.client.cache().messages().insert(message.clone());
        Ok(message)
    }

    /// Fetch a window of a channel's history
    ///
    /// The fetched messages are cached; the returned view drops messages
    /// as the cache deletes them.
    #[instrument(skip(self))]
    pub async fn history(&self, channel_id: Snowflake, query: HistoryQuery) -> ClientResult<MessageHistory> {
        let payloads = self.client.rest().get_messages(channel_id, query).await?;
        let cache = self.client.cache().messages();
        let messages: Vec<Message> = payloads.iter().map(Message::from).collect();
        for message in &messages {
            cache.insert(message.clone());
        }
        debug!(channel_id = %channel_id, count = messages.len(), "History fetched");
        Ok(MessageHistory::new(cache.clone(), channel_id, messages))
    }

    /// Replace a message's content
    pub async fn edit(&self, channel_id: Snowflake, message_id: Snowflake, content: impl Into<String>) -> ClientResult<Message> {
        let edit = EditMessage {
            content: Some(content.into()),
            embeds: None,
        };
        self.edit_message(channel_id, message_id, &edit).await
    }

    #[instrument(skip(self, edit))]
    pub async fn edit_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        edit: &EditMessage,
    ) -> ClientResult<Message> {
        let payload = self.client.rest().edit_message(channel_id, message_id, edit).await?;
        info!(message_id = %message_id, "Message edited");
        Ok(Message::from(&payload))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, channel_id: Snowflake, message_id: Snowflake) -> ClientResult<()> {
        self.client.rest().delete_message(channel_id, message_id).await?;
        info!(message_id = %message_id, "Message deleted");
        Ok(())
    }

    /// Delete 2-100 messages in one call
    #[instrument(skip(self, message_ids), fields(count = message_ids.len()))]
    pub async fn bulk_delete(&self, channel_id: Snowflake, message_ids: &[Snowflake]) -> ClientResult<()> {
        match message_ids {
            [] => Ok(()),
            [single] => self.delete(channel_id, *single).await,
            _ => {
                self.client.rest().bulk_delete_messages(channel_id, message_ids).await?;
                info!(channel_id = %channel_id, "Messages bulk deleted");
                Ok(())
            }
        }
    }

    pub async fn pin(&self, channel_id: Snowflake, message_id: Snowflake) -> ClientResult<()> {
        Ok(self.client.rest().pin_message(channel_id, message_id).await?)
    }

    pub async fn unpin(&self, channel_id: Snowflake, message_id: Snowflake) -> ClientResult<()> {
        Ok(self.client.rest().unpin_message(channel_id, message_id).await?)
    }

    #[instrument(skip(self))]
    pub async fn add_reaction(&self, channel_id: Snowflake, message_id: Snowflake, emoji: &ReactionEmoji) -> ClientResult<()> {
        self.client
            .rest()
            .add_reaction(channel_id, message_id, &emoji.as_route_segment())
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_own_reaction(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        emoji: &ReactionEmoji,
    ) -> ClientResult<()> {
        self.client
            .rest()
            .remove_own_reaction(channel_id, message_id, &emoji.as_route_segment())
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_user_reaction(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        emoji: &ReactionEmoji,
        user_id: Snowflake,
    ) -> ClientResult<()> {
        self.client
            .rest()
            .remove_user_reaction(channel_id, message_id, &emoji.as_route_segment(), user_id)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_all_reactions(&self, channel_id: Snowflake, message_id: Snowflake) -> ClientResult<()> {
        self.client.rest().remove_all_reactions(channel_id, message_id).await?;
        Ok(())
    }

    /// Keep a message cached regardless of capacity and age
    pub fn cache_forever(&self, message_id: Snowflake, forever: bool) -> bool {
        self.client.cache().messages().set_cached_forever(message_id, forever)
    }
}
