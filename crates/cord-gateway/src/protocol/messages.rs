//! Gateway message format
//!
//! Every frame is a JSON envelope `{op, d, s, t}`. `s` and `t` are only set
//! on dispatches.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    IdentifyPayload, OpCode, PresenceUpdatePayload, RequestGuildMembersPayload,
    ResumePayload,
};

/// Gateway frame envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Raw op code, unknown values included
    pub op: u8,

    #[serde(default)]
    pub d: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayMessage {
    fn control(op: OpCode, d: Value) -> Self {
        Self {
            op: op.as_u8(),
            d,
            s: None,
            t: None,
        }
    }

    // === Client Messages ===

    /// Heartbeat (op=1) carrying the last sequence number
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::control(OpCode::Heartbeat, last_sequence.map_or(Value::Null, Value::from))
    }

    pub fn identify(payload: &IdentifyPayload) -> serde_json::Result<Self> {
        Ok(Self::control(OpCode::Identify, serde_json::to_value(payload)?))
    }

    pub fn resume(payload: &ResumePayload) -> serde_json::Result<Self> {
        Ok(Self::control(OpCode::Resume, serde_json::to_value(payload)?))
    }

    pub fn request_guild_members(payload: &RequestGuildMembersPayload) -> serde_json::Result<Self> {
        Ok(Self::control(OpCode::RequestGuildMembers, serde_json::to_value(payload)?))
    }

    pub fn presence_update(payload: &PresenceUpdatePayload) -> serde_json::Result<Self> {
        Ok(Self::control(OpCode::PresenceUpdate, serde_json::to_value(payload)?))
    }

    // === Server Messages ===

    #[must_use]
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::control(
            OpCode::Hello,
            serde_json::json!({ "heartbeat_interval": heartbeat_interval }),
        )
    }

    #[must_use]
    pub fn dispatch(event: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch.as_u8(),
            d: data,
            s: Some(sequence),
            t: Some(event.into()),
        }
    }

    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::control(OpCode::HeartbeatAck, Value::Null)
    }

    #[must_use]
    pub fn reconnect() -> Self {
        Self::control(OpCode::Reconnect, Value::Null)
    }

    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::control(OpCode::InvalidSession, Value::Bool(resumable))
    }

    // === Utilities ===

    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::from_u8(self.op)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.t, self.opcode()) {
            (Some(t), _) => {
                write!(f, "GatewayMessage(op={}, t={t}", self.op)?;
                if let Some(s) = self.s {
                    write!(f, ", s={s}")?;
                }
                write!(f, ")")
            }
            (None, Some(op)) => write!(f, "GatewayMessage(op={op})"),
            (None, None) => write!(f, "GatewayMessage(op={})", self.op),
        }
    }
}
