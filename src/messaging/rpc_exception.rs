use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const BAD_REQUEST: u16 = 400;

/// Wire error envelope: `{status, message}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct RpcException {
    pub status: u16,
    pub message: String,
}

impl RpcException {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(BAD_REQUEST, message)
    }

    pub fn to_value(&self) -> Value {
        json!({ "status": self.status, "message": self.message })
    }

    /// Normalize an error of any shape.
    ///
    /// An object carrying both `status` and `message` keeps them, with a
    /// non-numeric status replaced by 400. Anything else becomes a 400 whose
    /// message is the value's string form.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) if map.contains_key("status") && map.contains_key("message") => {
                let status = map.get("status").and_then(parse_status).unwrap_or(BAD_REQUEST);
                let message = match map.get("message") {
                    Some(Value::String(message)) => message.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                Self::new(status, message)
            }
            Value::String(message) => Self::bad_request(message),
            other => Self::bad_request(other.to_string()),
        }
    }
}

fn parse_status(value: &Value) -> Option<u16> {
    let status = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    }?;
    (100..=599).contains(&status).then_some(status)
}

impl From<serde_json::Error> for RpcException {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(err.to_string())
    }
}
