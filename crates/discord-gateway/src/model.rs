//! Gateway and REST payloads.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Gateway intent bits.
pub mod intents {
    pub const GUILDS: u64 = 1 << 0;
    pub const GUILD_MESSAGES: u64 = 1 << 9;
    pub const MESSAGE_CONTENT: u64 = 1 << 15;

    /// Intents for a session; message content is a privileged opt-in.
    pub fn for_session(message_content: bool) -> u64 {
        let base = GUILDS | GUILD_MESSAGES;
        if message_content {
            base | MESSAGE_CONTENT
        } else {
            base
        }
    }
}

/// Gateway opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Dispatch,
    Heartbeat,
    Identify,
    Resume,
    Reconnect,
    InvalidSession,
    Hello,
    HeartbeatAck,
    Unknown(u8),
}

impl From<u8> for OpCode {
    fn from(op: u8) -> Self {
        match op {
            0 => OpCode::Dispatch,
            1 => OpCode::Heartbeat,
            2 => OpCode::Identify,
            6 => OpCode::Resume,
            7 => OpCode::Reconnect,
            9 => OpCode::InvalidSession,
            10 => OpCode::Hello,
            11 => OpCode::HeartbeatAck,
            other => OpCode::Unknown(other),
        }
    }
}

impl OpCode {
    pub fn code(&self) -> u8 {
        match self {
            OpCode::Dispatch => 0,
            OpCode::Heartbeat => 1,
            OpCode::Identify => 2,
            OpCode::Resume => 6,
            OpCode::Reconnect => 7,
            OpCode::InvalidSession => 9,
            OpCode::Hello => 10,
            OpCode::HeartbeatAck => 11,
            OpCode::Unknown(op) => *op,
        }
    }
}

/// A gateway frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,
    #[serde(default)]
    pub d: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayPayload {
    fn new(op: OpCode, d: serde_json::Value) -> Self {
        Self {
            op: op.code(),
            d,
            s: None,
            t: None,
        }
    }

    pub fn opcode(&self) -> OpCode {
        OpCode::from(self.op)
    }

    /// Create a HEARTBEAT frame carrying the last sequence number.
    pub fn heartbeat(seq: Option<u64>) -> Self {
        Self::new(OpCode::Heartbeat, json!(seq))
    }

    /// Create an IDENTIFY frame.
    pub fn identify(token: &str, intents: u64) -> Self {
        Self::new(
            OpCode::Identify,
            json!({
                "token": token,
                "intents": intents,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "herald",
                    "device": "herald"
                }
            }),
        )
    }

    /// Create a RESUME frame.
    pub fn resume(token: &str, session_id: &str, seq: Option<u64>) -> Self {
        Self::new(
            OpCode::Resume,
            json!({
                "token": token,
                "session_id": session_id,
                "seq": seq
            }),
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Message author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: Option<bool>,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageData {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    pub author: UserData,
    #[serde(default)]
    pub webhook_id: Option<String>,
    #[serde(default)]
    pub content: String,
}

impl MessageData {
    pub fn author_is_bot(&self) -> bool {
        self.author.bot.unwrap_or(false)
    }
}

/// A channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelData {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
}

/// GUILD_CREATE payload (the fields herald uses).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildData {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub channels: Vec<ChannelData>,
    #[serde(default)]
    pub unavailable: Option<bool>,
}

/// READY payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyData {
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    pub user: UserData,
    #[serde(default)]
    pub guilds: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_intents() {
        assert_eq!(intents::for_session(false), 513);
        assert_eq!(intents::for_session(true), 513 | 32768);

        let frame = GatewayPayload::identify("tok", intents::for_session(true));
        let json: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(json["op"], 2);
        assert_eq!(json["d"]["intents"], 33281);
        assert_eq!(json["d"]["token"], "tok");
        assert!(json.get("s").is_none());
    }

    #[test]
    fn heartbeat_carries_sequence() {
        let json = GatewayPayload::heartbeat(Some(42)).to_json().unwrap();
        assert_eq!(json, r#"{"op":1,"d":42}"#);
        let json = GatewayPayload::heartbeat(None).to_json().unwrap();
        assert_eq!(json, r#"{"op":1,"d":null}"#);
    }

    #[test]
    fn parse_dispatch() {
        let frame = GatewayPayload::from_json(
            r#"{"op":0,"s":3,"t":"MESSAGE_CREATE","d":{"id":"1"}}"#,
        )
        .unwrap();
        assert_eq!(frame.opcode(), OpCode::Dispatch);
        assert_eq!(frame.s, Some(3));
        assert_eq!(frame.t.as_deref(), Some("MESSAGE_CREATE"));
    }

    #[test]
    fn parse_message_from_webhook() {
        let message: MessageData = serde_json::from_str(
            r#"{"id":"5","channel_id":"9","author":{"id":"7","username":"Relay","bot":true},"webhook_id":"7","content":"hi"}"#,
        )
        .unwrap();
        assert!(message.author_is_bot());
        assert_eq!(message.webhook_id.as_deref(), Some("7"));
        assert!(message.guild_id.is_none());
    }

    #[test]
    fn unknown_opcode_round_trips() {
        assert_eq!(OpCode::from(42), OpCode::Unknown(42));
        assert_eq!(OpCode::Unknown(42).code(), 42);
        assert_eq!(OpCode::from(10), OpCode::Hello);
    }
}
