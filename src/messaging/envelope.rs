use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::RpcException;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub cmd: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub id: Uuid,
    pub pattern: Pattern,
    #[serde(default)]
    pub data: Value,
    pub reply_to: String,
}

impl RequestEnvelope {
    pub fn new(cmd: impl Into<String>, data: Value, reply_to: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pattern: Pattern { cmd: cmd.into() },
            data,
            reply_to: reply_to.into(),
        }
    }
}

/// Reply to a request: exactly one of `response` and `err` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<Value>,
}

impl ReplyEnvelope {
    pub fn ok(id: Uuid, response: Value) -> Self {
        Self {
            id,
            response: Some(response),
            err: None,
        }
    }

    pub fn error(id: Uuid, err: &RpcException) -> Self {
        Self {
            id,
            response: None,
            err: Some(err.to_value()),
        }
    }

    pub fn into_result(self) -> Result<Value, RpcException> {
        match self.err {
            Some(err) => Err(RpcException::from_value(err)),
            None => Ok(self.response.unwrap_or(Value::Null)),
        }
    }
}
