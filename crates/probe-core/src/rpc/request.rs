//! Outgoing request and notification envelopes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol version tag carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision announced in the `initialize` handshake.
const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Id used for the handshake request so it never collides with numeric
/// scenario ids.
const HANDSHAKE_ID: &str = "probe-init";

/// A JSON-RPC request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_owned())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolCallParams {
    /// Tool identifier as registered by the server (e.g. `GetCurrentWeather`).
    pub name: String,
    /// Tool arguments; shape depends on the tool.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Request parameters: either a tool call or any other JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    ToolCall(ToolCallParams),
    Raw(Value),
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
}

impl Request {
    /// Create a request without parameters.
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: id.into(),
            method: method.into(),
            params: None,
        }
    }

    /// `tools/list` with no parameters.
    pub fn list_tools(id: u64) -> Self {
        Self::new(id, "tools/list")
    }

    /// `tools/call` for the named tool.
    pub fn call_tool(
        id: u64,
        name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self::new(id, "tools/call").with_params(Params::ToolCall(ToolCallParams {
            name: name.into(),
            arguments,
        }))
    }

    /// Attach parameters.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = Some(params);
        self
    }

    /// Name of the called tool, if this is a tool call.
    pub fn tool_name(&self) -> Option<&str> {
        match &self.params {
            Some(Params::ToolCall(call)) => Some(&call.name),
            _ => None,
        }
    }

    /// Serialize as one line of compact JSON terminated by `\n`.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// A JSON-RPC 2.0 notification (a request without an id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            method: method.into(),
            params: None,
        }
    }

    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// The MCP `initialize` request sent ahead of a scenario when the
/// handshake is enabled.
pub fn initialize_request() -> Request {
    Request::new(HANDSHAKE_ID, "initialize").with_params(Params::Raw(serde_json::json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": "probe",
            "version": env!("CARGO_PKG_VERSION"),
        },
    })))
}

/// The `notifications/initialized` notification that completes the handshake.
pub fn initialized_notification() -> Notification {
    Notification::new("notifications/initialized")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn list_tools_omits_params() {
        let req = Request::list_tools(1);
        assert_eq!(
            req.to_line().unwrap(),
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n"
        );
    }

    #[test]
    fn call_tool_serializes_envelope_in_order() {
        let req = Request::call_tool(
            2,
            "GetCurrentWeather",
            args(json!({"city": "Moscow", "countryCode": "RU"})),
        );
        assert_eq!(
            req.to_line().unwrap(),
            concat!(
                r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":"#,
                r#"{"name":"GetCurrentWeather","arguments":{"city":"Moscow","countryCode":"RU"}}}"#,
                "\n"
            )
        );
    }

    #[test]
    fn to_line_is_a_single_line() {
        let req = Request::call_tool(
            7,
            "Echo",
            args(json!({"text": "line one\nline two"})),
        );
        let line = req.to_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1, "embedded newlines must be escaped");
    }

    #[test]
    fn request_roundtrips_through_json() {
        let req = Request::call_tool(
            3,
            "GetWeatherForecast",
            args(json!({"city": "London", "countryCode": "UK", "days": 3})),
        );
        let parsed: Request = serde_json::from_str(req.to_line().unwrap().trim_end()).unwrap();
        assert_eq!(parsed, req);
        assert_eq!(parsed.tool_name(), Some("GetWeatherForecast"));
    }

    #[test]
    fn initialize_params_stay_raw_after_roundtrip() {
        let req = initialize_request();
        let parsed: Request = serde_json::from_str(&req.to_string()).unwrap();
        assert_eq!(parsed, req);
        assert!(matches!(parsed.params, Some(Params::Raw(_))));
        assert_eq!(parsed.id, RequestId::from("probe-init"));
    }

    #[test]
    fn string_and_numeric_ids_differ() {
        assert_ne!(RequestId::Number(1), RequestId::from("1"));
        assert_eq!(RequestId::Number(1).to_string(), "1");
        assert_eq!(RequestId::from("a").to_string(), "\"a\"");
    }

    #[test]
    fn notification_has_no_id() {
        let line = initialized_notification().to_line().unwrap();
        assert_eq!(
            line,
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n"
        );
    }
}
