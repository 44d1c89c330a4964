//! Member service

use cord_core::{Member, Snowflake};
use tracing::{info, instrument};

use crate::client::Client;
use crate::error::{ClientError, ClientResult};

/// Member service
pub struct MemberService<'a> {
    client: &'a Client,
}

impl<'a> MemberService<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Cached membership, fetched and cached on a miss
    ///
    /// Fails with not-found if the server itself is not cached.
    #[instrument(skip(self))]
    pub async fn get(&self, server_id: Snowflake, user_id: Snowflake) -> ClientResult<Member> {
        let cache = self.client.cache();
        if !cache.contains_server(server_id) {
            return Err(ClientError::not_found("Server", server_id));
        }
        if let Some(member) = cache.member(server_id, user_id) {
            return Ok(member);
        }

        let payload = self.client.rest().get_member(server_id, user_id).await?;
        cache.upsert_user(&payload.user);
        let member = Member::from_payload(&payload);
        cache.add_member(server_id, member)?;
        cache
            .member(server_id, user_id)
            .ok_or_else(|| ClientError::not_found("Member", user_id))
    }

    /// Set or clear a nickname
    #[instrument(skip(self))]
    pub async fn set_nickname(&self, server_id: Snowflake, user_id: Snowflake, nickname: Option<&str>) -> ClientResult<()> {
        self.client.rest().set_nickname(server_id, user_id, nickname).await?;
        info!(server_id = %server_id, user_id = %user_id, "Nickname changed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn kick(&self, server_id: Snowflake, user_id: Snowflake) -> ClientResult<()> {
        self.client.rest().kick_member(server_id, user_id).await?;
        info!(server_id = %server_id, user_id = %user_id, "Member kicked");
        Ok(())
    }

    /// Ban a user, deleting their messages of the last `delete_message_days` (0-7)
    #[instrument(skip(self))]
    pub async fn ban(&self, server_id: Snowflake, user_id: Snowflake, delete_message_days: u8) -> ClientResult<()> {
        self.client
            .rest()
            .ban_member(server_id, user_id, delete_message_days.min(7))
            .await?;
        info!(server_id = %server_id, user_id = %user_id, "Member banned");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn unban(&self, server_id: Snowflake, user_id: Snowflake) -> ClientResult<()> {
        self.client.rest().unban_member(server_id, user_id).await?;
        info!(server_id = %server_id, user_id = %user_id, "Member unbanned");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn add_role(&self, server_id: Snowflake, user_id: Snowflake, role_id: Snowflake) -> ClientResult<()> {
        self.client.rest().add_member_role(server_id, user_id, role_id).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_role(&self, server_id: Snowflake, user_id: Snowflake, role_id: Snowflake) -> ClientResult<()> {
        self.client.rest().remove_member_role(server_id, user_id, role_id).await?;
        Ok(())
    }
}
