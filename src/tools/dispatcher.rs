//! Serialized tool-call dispatch
//!
//! Every dispatch goes through one fair async mutex over the capability
//! surface, so concurrent tool calls queue FIFO and physical commands never
//! interleave. Dispatch never raises past its boundary: every request yields
//! exactly one [`ToolCallResult`].

use std::sync::Arc;

use tokio::sync::Mutex;

use super::{Profile, ToolCallRequest, ToolCallResult, ToolRegistry};
use crate::robot::{CapabilityAction, CapabilitySurface};
use crate::Result;

/// Validates and serializes function-call requests onto the robot
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: ToolRegistry,
    // tokio's Mutex is fair: queued dispatches acquire in arrival order
    surface: Arc<Mutex<Box<dyn CapabilitySurface>>>,
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher").finish_non_exhaustive()
    }
}

impl ToolDispatcher {
    /// Create a dispatcher owning the shared surface
    #[must_use]
    pub fn new(surface: Box<dyn CapabilitySurface>) -> Self {
        Self {
            registry: ToolRegistry::new(),
            surface: Arc::new(Mutex::new(surface)),
        }
    }

    /// Dispatch one request against `profile`.
    ///
    /// Validation order: allow-list, then argument schema, then invocation.
    /// Any failure becomes a structured error result; the surface is never
    /// touched for a disallowed or malformed request.
    pub async fn dispatch(&self, request: &ToolCallRequest, profile: &Profile) -> ToolCallResult {
        tracing::info!(
            tool = %request.name,
            correlation_id = %request.correlation_id,
            "tool call"
        );

        if !profile.allows(&request.name) {
            tracing::warn!(tool = %request.name, profile = %profile.name, "tool not permitted");
            return ToolCallResult::error(
                request.correlation_id,
                format!(
                    "tool '{}' is not permitted by profile '{}'",
                    request.name, profile.name
                ),
            );
        }

        let action = match self.registry.validate(&request.name, &request.args) {
            Ok(action) => action,
            Err(description) => {
                tracing::warn!(
                    tool = %request.name,
                    correlation_id = %request.correlation_id,
                    error = %description,
                    "tool argument validation failed"
                );
                return ToolCallResult::error(request.correlation_id, description);
            }
        };

        let mut surface = self.surface.lock().await;
        match surface.invoke(action).await {
            Ok(payload) => ToolCallResult::success(request.correlation_id, payload),
            Err(e) => {
                tracing::error!(
                    tool = %request.name,
                    correlation_id = %request.correlation_id,
                    error = %e,
                    "capability invocation failed"
                );
                ToolCallResult::error(request.correlation_id, format!("capability error: {e}"))
            }
        }
    }

    /// Run an orchestrator-level action (greeting, sleep animation) through
    /// the same serialization lock as tool calls.
    ///
    /// # Errors
    ///
    /// Returns the surface's error unchanged; callers log and continue.
    pub async fn perform(&self, action: CapabilityAction) -> Result<String> {
        let mut surface = self.surface.lock().await;
        surface.invoke(action).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::{Duration, sleep};
    use uuid::Uuid;

    use super::*;
    use crate::robot::SimulatedSurface;
    use crate::session::SessionId;
    use crate::Error;

    fn request(name: &str, args: serde_json::Value) -> ToolCallRequest {
        ToolCallRequest {
            name: name.to_string(),
            args: args.as_object().cloned().unwrap_or_default(),
            correlation_id: Uuid::new_v4(),
            session_id: SessionId::new(),
        }
    }

    /// Surface that records concurrent occupancy to detect overlap
    struct ProbeSurface {
        in_flight: Arc<AtomicU32>,
        max_in_flight: Arc<AtomicU32>,
        completed: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl CapabilitySurface for ProbeSurface {
        async fn invoke(&mut self, action: CapabilityAction) -> crate::Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let label = match action {
                CapabilityAction::Expression { name, .. } => name,
                CapabilityAction::LookAt { direction } => direction,
                CapabilityAction::WakeUp => "wake".to_string(),
                CapabilityAction::Sleep => "sleep".to_string(),
            };
            self.completed.lock().await.push(label.clone());
            Ok(label)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_success_returns_payload() {
        let dispatcher = ToolDispatcher::new(Box::new(SimulatedSurface::new(1.0)));
        let req = request("robot_expression", json!({"action": "nod"}));

        let result = dispatcher.dispatch(&req, &Profile::default()).await;
        assert!(result.ok);
        assert_eq!(result.correlation_id, req.correlation_id);
        assert_eq!(result.payload, "Performed nod");
    }

    #[tokio::test]
    async fn disallowed_tool_never_reaches_surface() {
        let invocations = Arc::new(AtomicU32::new(0));
        let dispatcher = ToolDispatcher::new(Box::new(ProbeSurface {
            in_flight: Arc::clone(&invocations),
            max_in_flight: Arc::new(AtomicU32::new(0)),
            completed: Arc::new(Mutex::new(Vec::new())),
        }));

        let profile = Profile {
            allowed_tools: vec!["robot_look_at".to_string()],
            ..Profile::default()
        };
        let req = request("robot_expression", json!({"action": "nod"}));

        let result = dispatcher.dispatch(&req, &profile).await;
        assert!(!result.ok);
        assert!(result.payload.contains("not permitted"));
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_arguments_yield_error_result() {
        let dispatcher = ToolDispatcher::new(Box::new(SimulatedSurface::new(1.0)));
        let req = request("robot_look_at", json!({}));

        let result = dispatcher.dispatch(&req, &Profile::default()).await;
        assert!(!result.ok);
        assert!(result.payload.contains("direction"));
    }

    #[tokio::test]
    async fn capability_failure_becomes_error_result() {
        struct FailingSurface;

        #[async_trait]
        impl CapabilitySurface for FailingSurface {
            async fn invoke(&mut self, _action: CapabilityAction) -> crate::Result<String> {
                Err(Error::Capability("servo stalled".to_string()))
            }
        }

        let dispatcher = ToolDispatcher::new(Box::new(FailingSurface));
        let req = request("robot_expression", json!({"action": "nod"}));

        let result = dispatcher.dispatch(&req, &Profile::default()).await;
        assert!(!result.ok);
        assert!(result.payload.contains("servo stalled"));
    }

    #[tokio::test]
    async fn concurrent_dispatches_serialize_in_request_order() {
        let max_in_flight = Arc::new(AtomicU32::new(0));
        let completed = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = ToolDispatcher::new(Box::new(ProbeSurface {
            in_flight: Arc::new(AtomicU32::new(0)),
            max_in_flight: Arc::clone(&max_in_flight),
            completed: Arc::clone(&completed),
        }));
        let profile = Profile::default();

        let first = request("robot_expression", json!({"action": "nod"}));
        let second = request("robot_look_at", json!({"direction": "left"}));

        let d1 = dispatcher.clone();
        let p1 = profile.clone();
        let f1 = first.clone();
        let task1 = tokio::spawn(async move { d1.dispatch(&f1, &p1).await });
        // Yield so the first dispatch takes the lock before the second queues
        tokio::task::yield_now().await;
        let task2 = tokio::spawn({
            let d2 = dispatcher.clone();
            let p2 = profile.clone();
            let s2 = second.clone();
            async move { d2.dispatch(&s2, &p2).await }
        });

        let (r1, r2) = (task1.await.unwrap(), task2.await.unwrap());
        assert!(r1.ok && r2.ok);
        assert_eq!(r1.correlation_id, first.correlation_id);
        assert_eq!(r2.correlation_id, second.correlation_id);

        // Never overlapped, and completed in request order
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(*completed.lock().await, vec!["nod", "left"]);
    }
}
