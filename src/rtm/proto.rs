//! Realtime wire frames: inbound classification and outbound encoding.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Classification of an inbound frame by its `type` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    Hello,
    Typing,
    UserTyping,
    Message,
    /// `message` frame with subtype `message_changed`.
    MessageChanged,
    /// `message` frame with subtype `message_deleted`.
    MessageDeleted,
    DesktopNotification,
    Goodbye,
    /// Untyped acknowledgement of an outbound frame (`reply_to` set).
    Reply,
    Other(String),
}

impl FrameKind {
    fn classify(fields: &Map<String, Value>) -> Self {
        let Some(tag) = fields.get("type").and_then(Value::as_str) else {
            return if fields.contains_key("reply_to") {
                Self::Reply
            } else {
                Self::Other(String::new())
            };
        };

        match tag {
            "hello" => Self::Hello,
            "typing" => Self::Typing,
            "user_typing" => Self::UserTyping,
            "desktop_notification" => Self::DesktopNotification,
            "goodbye" => Self::Goodbye,
            "message" => match fields.get("subtype").and_then(Value::as_str) {
                Some("message_changed") => Self::MessageChanged,
                Some("message_deleted") => Self::MessageDeleted,
                _ => Self::Message,
            },
            other => Self::Other(other.to_string()),
        }
    }
}

/// Decoded inbound realtime frame.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    pub kind: FrameKind,
    /// The full decoded JSON object, `type` included.
    pub payload: Map<String, Value>,
}

impl InboundFrame {
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        let payload: Map<String, Value> = serde_json::from_str(text)?;
        Ok(Self {
            kind: FrameKind::classify(&payload),
            payload,
        })
    }

    /// Raw `type` tag, if present.
    pub fn type_tag(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }

    pub fn is_hello(&self) -> bool {
        self.kind == FrameKind::Hello
    }

    pub fn is_goodbye(&self) -> bool {
        self.kind == FrameKind::Goodbye
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }

    pub fn channel(&self) -> Option<&str> {
        self.get("channel").and_then(Value::as_str)
    }

    pub fn text(&self) -> Option<&str> {
        self.get("text").and_then(Value::as_str)
    }

    pub fn ts(&self) -> Option<&str> {
        self.get("ts").and_then(Value::as_str)
    }
}

/// Type-specific body of an outbound frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundBody {
    Typing {
        channel: String,
    },
    Message {
        channel: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        thread_ts: Option<String>,
    },
    Ping {},
}

/// Outbound realtime frame with its correlation id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundFrame {
    pub id: u64,
    #[serde(flatten)]
    pub body: OutboundBody,
}

impl OutboundFrame {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
