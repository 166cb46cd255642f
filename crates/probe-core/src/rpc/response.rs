//! Parsing of replies found on the server's stdout.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::request::{JSONRPC_VERSION, RequestId};

/// Errors raised when a line is not a well-formed JSON-RPC response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response is not a JSON object")]
    NotAnObject,

    #[error("unsupported jsonrpc version {0:?} (expected \"2.0\")")]
    WrongVersion(String),

    #[error("missing jsonrpc version tag")]
    MissingVersion,

    #[error("response has neither `result` nor `error`")]
    MissingPayload,

    #[error("response has both `result` and `error`")]
    AmbiguousPayload,

    #[error("malformed `error` object: {0}")]
    InvalidError(serde_json::Error),
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Either side of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Result(Value),
    Error(RpcError),
}

/// A parsed JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// `None` when the server replied with `"id": null` (or omitted it),
    /// which happens for parse errors on its side.
    pub id: Option<RequestId>,
    pub payload: ResponsePayload,
}

impl Response {
    /// Parse one line of server output.
    ///
    /// `result` and `error` are detected by key presence, so
    /// `"result": null` is a valid (empty) result.
    pub fn parse(line: &str) -> Result<Self, ResponseError> {
        let value: Value = serde_json::from_str(line.trim())?;
        let Value::Object(mut obj) = value else {
            return Err(ResponseError::NotAnObject);
        };

        match obj.get("jsonrpc") {
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            Some(Value::String(v)) => return Err(ResponseError::WrongVersion(v.clone())),
            Some(other) => return Err(ResponseError::WrongVersion(other.to_string())),
            None => return Err(ResponseError::MissingVersion),
        }

        // A non-null id that is neither a number nor a string is treated
        // like a missing id; it can never match one of ours.
        let id = obj
            .remove("id")
            .and_then(|id| serde_json::from_value::<RequestId>(id).ok());

        let payload = match (obj.remove("result"), obj.remove("error")) {
            (Some(result), None) => ResponsePayload::Result(result),
            (None, Some(error)) => ResponsePayload::Error(
                serde_json::from_value(error).map_err(ResponseError::InvalidError)?,
            ),
            (Some(_), Some(_)) => return Err(ResponseError::AmbiguousPayload),
            (None, None) => return Err(ResponseError::MissingPayload),
        };

        Ok(Self { id, payload })
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, ResponsePayload::Error(_))
    }
}
