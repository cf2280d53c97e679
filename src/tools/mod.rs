//! Tool-call dispatch
//!
//! Function-call requests from the backend are validated against a typed
//! registry and serialized onto the capability surface.

mod dispatcher;
pub mod registry;

pub use dispatcher::ToolDispatcher;
pub use registry::ToolRegistry;

use serde_json::Map;
use uuid::Uuid;

use crate::session::SessionId;

/// A function-call request surfaced by the conversation backend
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    /// Declared tool name
    pub name: String,

    /// Raw argument mapping as received
    pub args: Map<String, serde_json::Value>,

    /// Correlates the eventual result with this request
    pub correlation_id: Uuid,

    /// Session that produced the request
    pub session_id: SessionId,
}

/// The single result produced for a [`ToolCallRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallResult {
    /// Correlation id of the originating request
    pub correlation_id: Uuid,

    /// Whether the invocation succeeded
    pub ok: bool,

    /// Result payload on success, error description on failure
    pub payload: String,
}

impl ToolCallResult {
    /// A successful result
    #[must_use]
    pub const fn success(correlation_id: Uuid, payload: String) -> Self {
        Self {
            correlation_id,
            ok: true,
            payload,
        }
    }

    /// A structured error result
    #[must_use]
    pub const fn error(correlation_id: Uuid, description: String) -> Self {
        Self {
            correlation_id,
            ok: false,
            payload: description,
        }
    }
}

/// A named bundle of instructions and permitted tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Profile name
    pub name: String,

    /// Tool allow-list
    pub allowed_tools: Vec<String>,

    /// Instruction payload, opaque to the core, forwarded to the backend
    pub instructions: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            allowed_tools: vec![
                "robot_expression".to_string(),
                "robot_look_at".to_string(),
            ],
            instructions: "You are a small desk companion robot. Be warm and concise. \
                           Use your expression and gaze tools to react physically."
                .to_string(),
        }
    }
}

impl Profile {
    /// Whether `tool` is on this profile's allow-list
    #[must_use]
    pub fn allows(&self, tool: &str) -> bool {
        self.allowed_tools.iter().any(|t| t == tool)
    }
}
