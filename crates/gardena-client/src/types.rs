//! Wire types for the Gardena smart system API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Location id → display name.
pub type LocationMap = BTreeMap<String, String>;

/// Name used for locations that carry no `name` attribute.
pub const UNKNOWN_LOCATION: &str = "Unknown location";

/// Operation that requires a duration.
pub const START_SECONDS_TO_OVERRIDE: &str = "START_SECONDS_TO_OVERRIDE";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Raw responses
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Status and body of a resource API response.
///
/// The body is parsed as JSON when possible; an empty body becomes `null`
/// and anything else is kept as a JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn from_text(status: u16, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
        };
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Commands
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Command resource type, one per controllable service kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    ValveControl,
    MowerControl,
    PowerSocketControl,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::ValveControl => "VALVE_CONTROL",
            CommandType::MowerControl => "MOWER_CONTROL",
            CommandType::PowerSocketControl => "POWER_SOCKET_CONTROL",
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PUT /command/{serviceId} — request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub data: CommandData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandData {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: CommandType,
    pub attributes: CommandAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandAttributes {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<u64>,
}

impl CommandRequest {
    /// Build a command; the duration is given in minutes and sent in seconds.
    pub fn new(kind: CommandType, operation: &str, duration_minutes: Option<u32>) -> Self {
        Self {
            data: CommandData {
                id: "request".into(),
                kind,
                attributes: CommandAttributes {
                    command: operation.to_owned(),
                    seconds: duration_minutes.map(|m| u64::from(m) * 60),
                },
            },
        }
    }
}
