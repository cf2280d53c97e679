//! Robot capability surface
//!
//! The abstracted set of physical actions the dispatcher may invoke. Concrete
//! surfaces register in [`create_surface`]; a simulate-mode no-op variant
//! substitutes when no hardware is attached.

pub mod expressions;
mod sim;

pub use sim::SimulatedSurface;

use async_trait::async_trait;

use crate::config::RobotConfig;
use crate::{Error, Result};

/// A validated physical action
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityAction {
    /// Perform an expression choreography
    Expression {
        /// Expression name, validated against [`expressions::EXPRESSION_NAMES`]
        name: String,
        /// Movement scale in [0, 1]
        intensity: f64,
    },
    /// Move the head to look in a direction
    LookAt {
        /// Direction name, validated against [`expressions::LOOK_DIRECTIONS`]
        direction: String,
    },
    /// Wake-up greeting animation (head lifts, antennas perk)
    WakeUp,
    /// Sleep animation (head droops)
    Sleep,
}

/// The single shared physical resource.
///
/// All mutation is serialized through the dispatcher's lock; implementations
/// may assume invocations never overlap.
#[async_trait]
pub trait CapabilitySurface: Send {
    /// Execute an action, returning a short human-readable result for the
    /// backend's tool response.
    async fn invoke(&mut self, action: CapabilityAction) -> Result<String>;
}

/// Build the capability surface selected by configuration.
///
/// `simulate` forces the no-op variant regardless of the configured hardware.
/// Hardware-backed surfaces register here, keyed by a future config string.
///
/// # Errors
///
/// Returns `Error::Config` for an unknown surface kind.
pub fn create_surface(config: &RobotConfig) -> Result<Box<dyn CapabilitySurface>> {
    if config.simulate {
        tracing::info!("simulate mode: robot actions are logged no-ops");
        return Ok(Box::new(SimulatedSurface::new(config.expression_speed)));
    }

    // No hardware SDK is wired in yet; the physical surface plugs in here.
    Err(Error::Config(
        "no hardware surface available; run with --simulate".to_string(),
    ))
}
