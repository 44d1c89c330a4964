//! Packet decoder
//!
//! Turns raw frames into typed packets. Malformed envelopes are errors the
//! session logs and skips; unknown opcodes decode to `None`.
//!
//! Client opcodes decode too, so an encoded Identify or Resume reads back
//! into its payload. The session ignores them when they arrive inbound.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{
    GatewayMessage, HelloPayload, IdentifyPayload, OpCode, PresenceUpdatePayload,
    RequestGuildMembersPayload, ResumePayload,
};

/// Inbound packet the session acts on
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Dispatch {
        seq: Option<u64>,
        event: String,
        payload: Value,
    },
    /// Server asks for an immediate heartbeat
    Heartbeat,
    Reconnect,
    InvalidSession {
        resumable: bool,
    },
    Hello(HelloPayload),
    HeartbeatAck,
    Identify(IdentifyPayload),
    Resume(ResumePayload),
    PresenceUpdate(PresenceUpdatePayload),
    RequestGuildMembers(RequestGuildMembersPayload),
}

impl Packet {
    pub fn opcode(&self) -> OpCode {
        match self {
            Self::Dispatch { .. } => OpCode::Dispatch,
            Self::Heartbeat => OpCode::Heartbeat,
            Self::Reconnect => OpCode::Reconnect,
            Self::InvalidSession { .. } => OpCode::InvalidSession,
            Self::Hello(_) => OpCode::Hello,
            Self::HeartbeatAck => OpCode::HeartbeatAck,
            Self::Identify(_) => OpCode::Identify,
            Self::Resume(_) => OpCode::Resume,
            Self::PresenceUpdate(_) => OpCode::PresenceUpdate,
            Self::RequestGuildMembers(_) => OpCode::RequestGuildMembers,
        }
    }

    /// Whether only a client sends this packet
    pub fn is_client_only(&self) -> bool {
        matches!(
            self,
            Self::Identify(_) | Self::Resume(_) | Self::PresenceUpdate(_) | Self::RequestGuildMembers(_)
        )
    }
}

/// Malformed frame
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Binary frame is not UTF-8")]
    NotUtf8,

    #[error("Envelope has no op field")]
    MissingOpcode,

    #[error("Envelope op is not an integer: {0}")]
    InvalidOpcode(Value),

    #[error("Dispatch without event name")]
    MissingEventName,

    #[error("Invalid payload for {op}: {reason}")]
    InvalidPayload { op: OpCode, reason: String },
}

/// Decode a text frame
pub fn decode(text: &str) -> Result<Option<Packet>, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    decode_value(value)
}

/// Decode a binary frame holding UTF-8 JSON
pub fn decode_binary(bytes: &[u8]) -> Result<Option<Packet>, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?;
    decode(text)
}

fn decode_value(value: Value) -> Result<Option<Packet>, DecodeError> {
    let raw_op = value.get("op").ok_or(DecodeError::MissingOpcode)?;
    let raw = raw_op
        .as_u64()
        .ok_or_else(|| DecodeError::InvalidOpcode(raw_op.clone()))?;

    let Some(op) = u8::try_from(raw).ok().and_then(OpCode::from_u8) else {
        tracing::debug!(op = raw, "Ignoring unknown opcode");
        return Ok(None);
    };

    let envelope: GatewayMessage = serde_json::from_value(value)?;
    let packet = match op {
        OpCode::Dispatch => Packet::Dispatch {
            seq: envelope.s,
            event: envelope.t.ok_or(DecodeError::MissingEventName)?,
            payload: envelope.d,
        },
        OpCode::Heartbeat => Packet::Heartbeat,
        OpCode::Reconnect => Packet::Reconnect,
        OpCode::InvalidSession => Packet::InvalidSession {
            resumable: match envelope.d {
                Value::Bool(resumable) => resumable,
                Value::Null => false,
                other => {
                    return Err(DecodeError::InvalidPayload {
                        op,
                        reason: format!("expected bool, got {other}"),
                    })
                }
            },
        },
        OpCode::Hello => {
            let hello: HelloPayload = payload(op, envelope.d)?;
            if hello.heartbeat_interval == 0 {
                return Err(DecodeError::InvalidPayload {
                    op,
                    reason: "heartbeat interval is zero".to_string(),
                });
            }
            Packet::Hello(hello)
        }
        OpCode::HeartbeatAck => Packet::HeartbeatAck,
        OpCode::Identify => Packet::Identify(payload(op, envelope.d)?),
        OpCode::Resume => Packet::Resume(payload(op, envelope.d)?),
        OpCode::PresenceUpdate => Packet::PresenceUpdate(payload(op, envelope.d)?),
        OpCode::RequestGuildMembers => Packet::RequestGuildMembers(payload(op, envelope.d)?),
    };
    Ok(Some(packet))
}

fn payload<T: DeserializeOwned>(op: OpCode, d: Value) -> Result<T, DecodeError> {
    serde_json::from_value(d).map_err(|e| DecodeError::InvalidPayload {
        op,
        reason: e.to_string(),
    })
}
