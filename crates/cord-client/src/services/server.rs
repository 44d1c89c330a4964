//! Server service

use cord_core::{Channel, Role, Server, Snowflake};
use tracing::{info, instrument};

use crate::client::Client;
use crate::error::{ClientError, ClientResult};

/// Server service
///
/// Servers only come from the gateway, so lookups never go to REST.
pub struct ServerService<'a> {
    client: &'a Client,
}

impl<'a> ServerService<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn get(&self, server_id: Snowflake) -> ClientResult<Server> {
        self.client
            .cache()
            .server(server_id)
            .ok_or_else(|| ClientError::not_found("Server", server_id))
    }

    pub fn all(&self) -> Vec<Server> {
        self.client.cache().servers()
    }

    pub fn channels(&self, server_id: Snowflake) -> Vec<Channel> {
        self.client.cache().channels_of(server_id)
    }

    pub fn roles(&self, server_id: Snowflake) -> Vec<Role> {
        self.client.cache().roles_of(server_id)
    }

    /// Servers listed in READY that have not arrived yet
    pub fn unavailable(&self) -> Vec<Snowflake> {
        self.client.cache().unavailable_servers()
    }

    #[instrument(skip(self))]
    pub async fn leave(&self, server_id: Snowflake) -> ClientResult<()> {
        self.client.rest().leave_server(server_id).await?;
        info!(server_id = %server_id, "Left server");
        Ok(())
    }
}
