//! Value objects - immutable types that represent protocol concepts

mod intents;
mod permissions;
mod snowflake;

pub use intents::Intents;
pub use permissions::{OverwriteSubject, PermissionOverwrite, PermissionState, Permissions};
pub use snowflake::{Snowflake, SnowflakeGenerator, SnowflakeParseError};
