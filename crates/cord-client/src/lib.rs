//! # cord-client
//!
//! Client façade: builds the cache, dispatcher and REST client from a
//! [`ClientConfig`](cord_common::ClientConfig), logs in one or all shards,
//! and exposes entity operations that keep the cache in step with REST.
//!
//! ## Example
//!
//! ```ignore
//! use cord_client::ClientBuilder;
//! use cord_core::{Event, EventKind};
//!
//! let client = ClientBuilder::new(token)
//!     .on(EventKind::MessageCreate, |event, cache| {
//!         if let Event::MessageCreate { message_id, .. } = event {
//!             println!("{:?}", cache.messages().get(*message_id));
//!         }
//!     })
//!     .login()
//!     .await?;
//! client.messages().send(channel_id, "pong").await?;
//! ```

pub mod builder;
pub mod client;
pub mod error;
pub mod services;

pub use builder::ClientBuilder;
pub use client::Client;
pub use error::{ClientError, ClientResult};
pub use services::{ChannelService, MemberService, MessageService, ServerService, UserService};
