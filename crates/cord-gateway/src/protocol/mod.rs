//! Gateway protocol definitions
//!
//! Op codes, close codes, the frame envelope, control payloads and the
//! inbound packet decoder.

mod close_codes;
mod decoder;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{describe as describe_close_code, CloseAction, CloseCode};
pub use decoder::{decode, decode_binary, DecodeError, Packet};
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, PresenceUpdatePayload,
    RequestGuildMembersPayload, ResumePayload,
};
