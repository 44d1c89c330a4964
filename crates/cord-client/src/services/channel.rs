//! Channel service

use cord_core::{Channel, DomainError, Snowflake};
use tracing::{debug, info, instrument};

use crate::client::Client;
use crate::error::ClientResult;

/// Channel service
pub struct ChannelService<'a> {
    client: &'a Client,
}

impl<'a> ChannelService<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Cached channel, fetched on a miss
    ///
    /// A fetched server channel is cached only if its server is.
    #[instrument(skip(self))]
    pub async fn get(&self, channel_id: Snowflake) -> ClientResult<Channel> {
        let cache = self.client.cache();
        if let Some(channel) = cache.channel(channel_id) {
            return Ok(channel);
        }

        let payload = self.client.rest().get_channel(channel_id).await?;
        let channel = Channel::from_payload(&payload, None)?;
        match cache.insert_channel(channel.clone()) {
            Ok(_) => {}
            Err(DomainError::UnknownServer(server_id)) => {
                debug!(channel_id = %channel_id, server_id = %server_id, "Fetched channel of an uncached server");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(channel)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, channel_id: Snowflake) -> ClientResult<()> {
        self.client.rest().delete_channel(channel_id).await?;
        info!(channel_id = %channel_id, "Channel deleted");
        Ok(())
    }

    /// Show the typing indicator for a few seconds
    pub async fn trigger_typing(&self, channel_id: Snowflake) -> ClientResult<()> {
        Ok(self.client.rest().trigger_typing(channel_id).await?)
    }
}
