//! Simulated capability surface
//!
//! Logs every action instead of moving hardware. Holds the dispatcher lock for
//! the choreography's real duration so serialization behaves as it would on a
//! physical robot.

use async_trait::async_trait;
use tokio::time::{Duration, sleep};

use super::expressions::{self, MoveStep};
use super::{CapabilityAction, CapabilitySurface};
use crate::{Error, Result};

/// No-op surface for simulate mode and headless tests
#[derive(Debug)]
pub struct SimulatedSurface {
    expression_speed: f64,
    invocations: u64,
}

impl SimulatedSurface {
    /// Create a simulated surface with the configured choreography speed
    #[must_use]
    pub const fn new(expression_speed: f64) -> Self {
        Self {
            expression_speed,
            invocations: 0,
        }
    }

    /// Number of actions invoked so far
    #[must_use]
    pub const fn invocations(&self) -> u64 {
        self.invocations
    }

    fn choreography_duration(&self, steps: &[MoveStep]) -> Duration {
        let total: f32 = steps.iter().map(|s| s.duration).sum();
        Duration::from_secs_f64(f64::from(total) / self.expression_speed.max(0.1))
    }
}

#[async_trait]
impl CapabilitySurface for SimulatedSurface {
    async fn invoke(&mut self, action: CapabilityAction) -> Result<String> {
        self.invocations += 1;

        match action {
            CapabilityAction::Expression { name, intensity } => {
                let steps = expressions::expression(&name).ok_or_else(|| {
                    Error::Capability(format!("unknown expression '{name}'"))
                })?;
                tracing::info!(expression = %name, intensity, "simulated expression");
                sleep(self.choreography_duration(steps)).await;
                Ok(format!("Performed {name}"))
            }
            CapabilityAction::LookAt { direction } => {
                let pose = expressions::look_direction(&direction).ok_or_else(|| {
                    Error::Capability(format!("unknown direction '{direction}'"))
                })?;
                tracing::info!(direction = %direction, ?pose, "simulated look");
                sleep(Duration::from_millis(500)).await;
                Ok(format!("Looking {direction}"))
            }
            CapabilityAction::WakeUp => {
                tracing::info!("simulated wake-up animation");
                sleep(Duration::from_millis(300)).await;
                Ok("Awake".to_string())
            }
            CapabilityAction::Sleep => {
                tracing::info!("simulated sleep animation");
                sleep(Duration::from_millis(300)).await;
                Ok("Asleep".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expression_returns_result_string() {
        let mut surface = SimulatedSurface::new(1.0);
        let result = surface
            .invoke(CapabilityAction::Expression {
                name: "nod".to_string(),
                intensity: 1.0,
            })
            .await
            .unwrap();
        assert_eq!(result, "Performed nod");
        assert_eq!(surface.invocations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_expression_is_capability_error() {
        let mut surface = SimulatedSurface::new(1.0);
        let err = surface
            .invoke(CapabilityAction::Expression {
                name: "backflip".to_string(),
                intensity: 1.0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Capability(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn look_at_known_direction() {
        let mut surface = SimulatedSurface::new(1.0);
        let result = surface
            .invoke(CapabilityAction::LookAt {
                direction: "user".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(result, "Looking user");
    }
}
