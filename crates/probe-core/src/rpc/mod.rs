//! JSON-RPC 2.0 envelopes exchanged with the subordinate process.
//!
//! Requests are written to the server's stdin as one compact JSON object
//! per line. Replies are kept as opaque text by the runner and only parsed
//! here when a verdict is computed.

pub mod request;
pub mod response;

pub use request::{
    JSONRPC_VERSION, Notification, Params, Request, RequestId, ToolCallParams,
    initialize_request, initialized_notification,
};
pub use response::{Response, ResponseError, ResponsePayload, RpcError};
