//! User service

use cord_core::{Snowflake, User};
use tracing::instrument;

use crate::client::Client;
use crate::error::{ClientError, ClientResult};

/// User service
pub struct UserService<'a> {
    client: &'a Client,
}

impl<'a> UserService<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Cached user, fetched and cached on a miss
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: Snowflake) -> ClientResult<User> {
        let cache = self.client.cache();
        if let Some(user) = cache.user(user_id) {
            return Ok(user);
        }
        let payload = self.client.rest().get_user(user_id).await?;
        cache.upsert_user(&payload);
        cache
            .user(user_id)
            .ok_or_else(|| ClientError::not_found("User", user_id))
    }

    /// Fetch the account this client runs as and refresh the cached copy
    #[instrument(skip(self))]
    pub async fn current(&self) -> ClientResult<User> {
        let payload = self.client.rest().get_current_user().await?;
        let cache = self.client.cache();
        cache.set_yourself(&payload);
        Ok(cache.user(payload.id).unwrap_or_else(|| User::from(&payload)))
    }
}
