//! Configuration structs

mod client_config;

pub use client_config::{AccountType, ClientConfig, ConfigError};
