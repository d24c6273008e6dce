//! JSON-RPC 2.0 message types for daemon communication.
//!
//! Wire shapes:
//!
//! ```text
//! Request   {"jsonrpc":"2.0","id":<int>,"method":<string>,"params"?:<object>}
//! Success   {"jsonrpc":"2.0","id":<int>,"result":<any>}
//! Error     {"jsonrpc":"2.0","id":<int>,"error":{"code":<int>,"message":<string>}}
//! Event     {"jsonrpc":"2.0","method":<string>,"params":<any>}
//! ```

use crate::correlation::CorrelationId;
use crate::error::ClientResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version carried by every frame.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes.
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    /// Start of the implementation-defined server error range.
    pub const SERVER_ERROR: i64 = -32000;
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// An unsolicited server-pushed notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEvent {
    pub method: String,
    pub params: Value,
}

/// Every message shape the client sends or receives.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcMessage {
    /// A call with a correlation id.
    Request {
        id: CorrelationId,
        method: String,
        params: Option<Value>,
    },
    /// The answer to a request, matched by id.
    Response {
        id: CorrelationId,
        outcome: Result<Value, RpcErrorObject>,
    },
    /// A notification with no id.
    Event(ServerEvent),
}

/// Outbound request frame.
#[derive(Debug, Serialize)]
struct RequestFrame<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Value>,
}

/// Outbound response frame (used by test daemons).
#[derive(Debug, Serialize)]
struct ResponseFrame<'a> {
    jsonrpc: &'static str,
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a RpcErrorObject>,
}

/// Outbound notification frame.
#[derive(Debug, Serialize)]
struct EventFrame<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a Value,
}

/// Loose inbound shape; classification happens after parsing.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

impl RpcMessage {
    /// Build a request message.
    pub fn request(id: CorrelationId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Request {
            id,
            method: method.into(),
            params,
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> ClientResult<String> {
        let text = match self {
            Self::Request { id, method, params } => serde_json::to_string(&RequestFrame {
                jsonrpc: JSONRPC_VERSION,
                id: id.get(),
                method,
                params: params.as_ref(),
            })?,
            Self::Response { id, outcome } => {
                let (result, error) = match outcome {
                    Ok(value) => (Some(value), None),
                    Err(error) => (None, Some(error)),
                };
                serde_json::to_string(&ResponseFrame {
                    jsonrpc: JSONRPC_VERSION,
                    id: id.get(),
                    result,
                    error,
                })?
            }
            Self::Event(event) => serde_json::to_string(&EventFrame {
                jsonrpc: JSONRPC_VERSION,
                method: &event.method,
                params: &event.params,
            })?,
        };
        Ok(text)
    }

    /// Parse and classify an inbound text frame.
    ///
    /// Returns `None` for anything that is not JSON, not an object, or
    /// neither a response nor an event. Such frames are dropped by the
    /// caller without further handling.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let frame: InboundFrame = serde_json::from_str(text).ok()?;

        let id = match frame.id {
            None | Some(Value::Null) => None,
            Some(value) => Some(CorrelationId::new(value.as_u64()?)),
        };

        match (id, frame.method) {
            (Some(id), None) => {
                let outcome = match frame.error {
                    Some(error) => Err(error),
                    // `"result": null` parses as `None`
                    None => Ok(frame.result.unwrap_or(Value::Null)),
                };
                Some(Self::Response { id, outcome })
            }
            (Some(id), Some(method)) => Some(Self::Request {
                id,
                method,
                params: frame.params,
            }),
            (None, Some(method)) => Some(Self::Event(ServerEvent {
                method,
                params: frame.params.unwrap_or(Value::Null),
            })),
            (None, None) => None,
        }
    }
}
