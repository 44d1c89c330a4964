//! Integration test utilities for cord
//!
//! A mock platform (websocket gateway plus REST api on one axum server)
//! and payload fixtures for end-to-end tests of the client.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
