//! Typed tool registry
//!
//! Maps tool names to argument schemas and validates raw JSON arguments into
//! [`CapabilityAction`] values. Unknown names are rejected at validation time;
//! there is no reflective lookup.

use serde_json::{Map, Value};

use crate::robot::expressions::{EXPRESSION_NAMES, LOOK_DIRECTIONS};
use crate::robot::CapabilityAction;

/// Default intensity when the argument is omitted
const DEFAULT_INTENSITY: f64 = 1.0;

/// The closed set of dispatchable tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolKind {
    Expression,
    LookAt,
}

/// Registry of declared tools
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry(());

impl ToolRegistry {
    /// Create the registry of built-in robot tools
    #[must_use]
    pub const fn new() -> Self {
        Self(())
    }

    /// Names of every declared tool, for backend tool declarations
    #[must_use]
    pub const fn tool_names() -> &'static [&'static str] {
        &["robot_expression", "robot_look_at"]
    }

    fn resolve(&self, name: &str) -> Option<ToolKind> {
        match name {
            "robot_expression" => Some(ToolKind::Expression),
            "robot_look_at" => Some(ToolKind::LookAt),
            _ => None,
        }
    }

    /// Validate `args` for tool `name` into a typed action.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the first violation: unknown
    /// tool, missing required field, wrong type, or unknown enum value.
    /// Numeric ranges are clamped rather than rejected.
    pub fn validate(
        &self,
        name: &str,
        args: &Map<String, Value>,
    ) -> Result<CapabilityAction, String> {
        let kind = self
            .resolve(name)
            .ok_or_else(|| format!("unknown tool '{name}'"))?;

        match kind {
            ToolKind::Expression => {
                let action = require_str(args, "action")?;
                if !EXPRESSION_NAMES.contains(&action) {
                    return Err(format!(
                        "unknown expression '{action}', expected one of: {}",
                        EXPRESSION_NAMES.join(", ")
                    ));
                }

                let intensity = match args.get("intensity") {
                    None => DEFAULT_INTENSITY,
                    Some(Value::Number(n)) => {
                        n.as_f64().unwrap_or(DEFAULT_INTENSITY).clamp(0.0, 1.0)
                    }
                    Some(other) => {
                        return Err(format!("'intensity' must be a number, got {other}"));
                    }
                };

                Ok(CapabilityAction::Expression {
                    name: action.to_string(),
                    intensity,
                })
            }
            ToolKind::LookAt => {
                let direction = require_str(args, "direction")?;
                if !LOOK_DIRECTIONS.contains(&direction) {
                    return Err(format!(
                        "unknown direction '{direction}', expected one of: {}",
                        LOOK_DIRECTIONS.join(", ")
                    ));
                }

                Ok(CapabilityAction::LookAt {
                    direction: direction.to_string(),
                })
            }
        }
    }
}

fn require_str<'a>(args: &'a Map<String, Value>, field: &str) -> Result<&'a str, String> {
    match args.get(field) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(format!("'{field}' must be a string, got {other}")),
        None => Err(format!("missing required field '{field}'")),
    }
}
