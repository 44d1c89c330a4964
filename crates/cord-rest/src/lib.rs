//! # cord-rest
//!
//! REST gateway used by the client for user-facing operations and by the
//! gateway handlers for member backfills.
//!
//! ## Features
//!
//! - **Routes**: one enum variant per endpoint with its method and bucket
//! - **Rate limits**: per-bucket headroom from response headers, plus the
//!   global limit, waited out by the calling task only
//! - **429 handling**: wait the advertised delay and retry once
//!
//! ## Example
//!
//! ```ignore
//! use cord_rest::{CreateMessage, RestClient};
//!
//! let rest = RestClient::from_config(&config)?;
//! let sent = rest.create_message(channel_id, &CreateMessage::text("hello")).await?;
//! ```

pub mod client;
pub mod error;
pub mod ratelimit;
pub mod route;

pub use client::{CreateMessage, EditMessage, GatewayBotInfo, HistoryQuery, RestClient};
pub use error::{RestError, RestResult};
pub use ratelimit::{RateLimitHeaders, RateLimiter};
pub use route::{Route, RouteKey};
