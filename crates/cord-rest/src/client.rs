//! REST client
//!
//! Every call goes through `execute`: wait for the bucket, send, record
//! the rate-limit headers, and retry exactly once on a 429.

use std::time::Duration;

use cord_common::ClientConfig;
use cord_core::payloads::{ChannelPayload, MemberPayload, MessagePayload, UserPayload};
use cord_core::{Embed, Snowflake};
use reqwest::header::AUTHORIZATION;
use reqwest::{Proxy, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RestError, RestResult};
use crate::ratelimit::{RateLimitHeaders, RateLimiter};
use crate::route::Route;

const DEFAULT_USER_AGENT: &str = concat!("DiscordBot (cord, ", env!("CARGO_PKG_VERSION"), ")");
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of `GET /gateway/bot`
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayBotInfo {
    pub url: String,
    #[serde(default = "default_shards")]
    pub shards: u32,
}

fn default_shards() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct GatewayInfo {
    url: String,
}

/// Body of a 429 response
#[derive(Debug, Default, Deserialize)]
struct RateLimitBody {
    /// Milliseconds
    #[serde(default)]
    retry_after: f64,
    #[serde(default)]
    global: bool,
}

/// Body of a create-message call
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateMessage {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    pub tts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl CreateMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Body of an edit-message call; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Serialize)]
pub struct EditMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<Embed>>,
}

/// History window of `GET /channels/{id}/messages`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub before: Option<Snowflake>,
    pub after: Option<Snowflake>,
    /// 1-100, platform default 50
    pub limit: Option<u8>,
}

impl HistoryQuery {
    fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(before) = self.before {
            pairs.push(("before", before.to_string()));
        }
        if let Some(after) = self.after {
            pairs.push(("after", after.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.clamp(1, 100).to_string()));
        }
        pairs
    }
}

/// Authenticated REST client with rate-limit handling
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    authorization: String,
    limiter: RateLimiter,
}

impl RestClient {
    /// Create a client for `base_url` with a full `authorization` header value
    pub fn new(base_url: &str, authorization: String, proxy: Option<&str>) -> RestResult<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| RestError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(RestError::InvalidUrl(base_url.to_string()));
        }

        let mut builder = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(DEFAULT_USER_AGENT);
        if let Some(proxy) = proxy {
            builder = builder.proxy(Proxy::all(proxy)?);
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
            authorization,
            limiter: RateLimiter::new(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> RestResult<Self> {
        Self::new(
            &config.api_base_url,
            config.account_type.authorization(&config.token),
            config.proxy.as_deref(),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    fn url(&self, route: &Route, query: &[(&'static str, String)]) -> RestResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RestError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(route.segments());
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Send a route and return the raw response body
    pub async fn execute(
        &self,
        route: &Route,
        query: &[(&'static str, String)],
        body: Option<&Value>,
    ) -> RestResult<String> {
        let key = route.bucket_key();
        let url = self.url(route, query)?;
        let mut retried = false;

        loop {
            self.limiter.acquire(&key).await;

            let mut request = self
                .http
                .request(route.method(), url.clone())
                .header(AUTHORIZATION, &self.authorization);
            if let Some(body) = body {
                request = request.json(body);
            }

            tracing::trace!(route = %route, "Sending REST request");
            let response = request.send().await?;
            let status = response.status();
            let headers = RateLimitHeaders::from_headers(response.headers());
            self.limiter.update(&key, &headers).await;
            let text = response.text().await?;

            if status.as_u16() == 429 {
                let parsed: RateLimitBody = serde_json::from_str(&text).unwrap_or_default();
                let retry_after = Duration::from_secs_f64((parsed.retry_after.max(0.0)) / 1000.0);
                let global = headers.global || parsed.global;
                tracing::warn!(
                    route = %route,
                    retry_after_ms = retry_after.as_millis() as u64,
                    global = global,
                    retried = retried,
                    "Rate limited"
                );

                if global {
                    self.limiter.block_global(retry_after);
                } else {
                    self.limiter.block_route(&key, retry_after).await;
                }
                if retried {
                    return Err(RestError::RateLimited { retry_after, global });
                }
                retried = true;
                continue;
            }

            if status.is_success() || status.is_redirection() {
                return Ok(text);
            }
            tracing::debug!(route = %route, status = status.as_u16(), "REST request failed");
            return Err(RestError::from_response(status.as_u16(), text));
        }
    }

    async fn call<T: DeserializeOwned>(&self, route: Route, body: Option<Value>) -> RestResult<T> {
        let text = self.execute(&route, &[], body.as_ref()).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn call_empty(&self, route: Route, body: Option<Value>) -> RestResult<()> {
        self.execute(&route, &[], body.as_ref()).await.map(|_| ())
    }

    // =========================================================================
    // Gateway
    // =========================================================================

    pub async fn gateway_bot(&self) -> RestResult<GatewayBotInfo> {
        self.call(Route::GatewayBot, None).await
    }

    pub async fn gateway_url(&self) -> RestResult<String> {
        let info: GatewayInfo = self.call(Route::Gateway, None).await?;
        Ok(info.url)
    }

    // =========================================================================
    // Channels
    // =========================================================================

    pub async fn get_channel(&self, channel: Snowflake) -> RestResult<ChannelPayload> {
        self.call(Route::GetChannel { channel }, None).await
    }

    pub async fn delete_channel(&self, channel: Snowflake) -> RestResult<()> {
        self.call_empty(Route::DeleteChannel { channel }, None).await
    }

    pub async fn trigger_typing(&self, channel: Snowflake) -> RestResult<()> {
        self.call_empty(Route::TriggerTyping { channel }, None).await
    }

    // =========================================================================
    // Messages
    // =========================================================================

    pub async fn create_message(&self, channel: Snowflake, message: &CreateMessage) -> RestResult<MessagePayload> {
        let body = serde_json::to_value(message)?;
        self.call(Route::CreateMessage { channel }, Some(body)).await
    }

    pub async fn get_message(&self, channel: Snowflake, message: Snowflake) -> RestResult<MessagePayload> {
        self.call(Route::GetMessage { channel, message }, None).await
    }

    /// Messages of a channel, newest first as the platform returns them
    pub async fn get_messages(&self, channel: Snowflake, query: HistoryQuery) -> RestResult<Vec<MessagePayload>> {
        let text = self
            .execute(&Route::GetMessages { channel }, &query.pairs(), None)
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn edit_message(
        &self,
        channel: Snowflake,
        message: Snowflake,
        edit: &EditMessage,
    ) -> RestResult<MessagePayload> {
        let body = serde_json::to_value(edit)?;
        self.call(Route::EditMessage { channel, message }, Some(body)).await
    }

    pub async fn delete_message(&self, channel: Snowflake, message: Snowflake) -> RestResult<()> {
        self.call_empty(Route::DeleteMessage { channel, message }, None).await
    }

    pub async fn bulk_delete_messages(&self, channel: Snowflake, messages: &[Snowflake]) -> RestResult<()> {
        let body = serde_json::json!({ "messages": messages });
        self.call_empty(Route::BulkDeleteMessages { channel }, Some(body)).await
    }

    pub async fn pin_message(&self, channel: Snowflake, message: Snowflake) -> RestResult<()> {
        self.call_empty(Route::PinMessage { channel, message }, None).await
    }

    pub async fn unpin_message(&self, channel: Snowflake, message: Snowflake) -> RestResult<()> {
        self.call_empty(Route::UnpinMessage { channel, message }, None).await
    }

    // =========================================================================
    // Reactions
    // =========================================================================

    /// `emoji` is a route segment: the unicode text or `name:id`
    pub async fn add_reaction(&self, channel: Snowflake, message: Snowflake, emoji: &str) -> RestResult<()> {
        let emoji = emoji.to_string();
        self.call_empty(Route::AddOwnReaction { channel, message, emoji }, None)
            .await
    }

    pub async fn remove_own_reaction(&self, channel: Snowflake, message: Snowflake, emoji: &str) -> RestResult<()> {
        let emoji = emoji.to_string();
        self.call_empty(Route::RemoveOwnReaction { channel, message, emoji }, None)
            .await
    }

    pub async fn remove_user_reaction(
        &self,
        channel: Snowflake,
        message: Snowflake,
        emoji: &str,
        user: Snowflake,
    ) -> RestResult<()> {
        let emoji = emoji.to_string();
        self.call_empty(
            Route::RemoveUserReaction {
                channel,
                message,
                emoji,
                user,
            },
            None,
        )
        .await
    }

    pub async fn remove_all_reactions(&self, channel: Snowflake, message: Snowflake) -> RestResult<()> {
        self.call_empty(Route::RemoveAllReactions { channel, message }, None)
            .await
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn get_user(&self, user: Snowflake) -> RestResult<UserPayload> {
        self.call(Route::GetUser { user }, None).await
    }

    pub async fn get_current_user(&self) -> RestResult<UserPayload> {
        self.call(Route::GetCurrentUser, None).await
    }

    // =========================================================================
    // Members
    // =========================================================================

    pub async fn get_member(&self, server: Snowflake, user: Snowflake) -> RestResult<MemberPayload> {
        self.call(Route::GetMember { server, user }, None).await
    }

    /// `None` clears the nickname
    pub async fn set_nickname(&self, server: Snowflake, user: Snowflake, nickname: Option<&str>) -> RestResult<()> {
        let body = serde_json::json!({ "nick": nickname });
        self.call_empty(Route::ModifyMember { server, user }, Some(body)).await
    }

    pub async fn kick_member(&self, server: Snowflake, user: Snowflake) -> RestResult<()> {
        self.call_empty(Route::KickMember { server, user }, None).await
    }

    pub async fn ban_member(&self, server: Snowflake, user: Snowflake, delete_message_days: u8) -> RestResult<()> {
        let body = serde_json::json!({ "delete_message_days": delete_message_days.min(7) });
        self.call_empty(Route::BanMember { server, user }, Some(body)).await
    }

    pub async fn unban_member(&self, server: Snowflake, user: Snowflake) -> RestResult<()> {
        self.call_empty(Route::UnbanMember { server, user }, None).await
    }

    pub async fn add_member_role(&self, server: Snowflake, user: Snowflake, role: Snowflake) -> RestResult<()> {
        self.call_empty(Route::AddMemberRole { server, user, role }, None)
            .await
    }

    pub async fn remove_member_role(&self, server: Snowflake, user: Snowflake, role: Snowflake) -> RestResult<()> {
        self.call_empty(Route::RemoveMemberRole { server, user, role }, None)
            .await
    }

    // =========================================================================
    // Servers
    // =========================================================================

    pub async fn leave_server(&self, server: Snowflake) -> RestResult<()> {
        self.call_empty(Route::LeaveServer { server }, None).await
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}
