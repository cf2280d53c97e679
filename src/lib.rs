//! Ember Companion - wake-word conversational companion core for desk robots
//!
//! This library provides the control and session core for a physical companion
//! robot bridged to a cloud-hosted real-time audio AI backend:
//! - Device lifecycle state machine (sleep / wake / converse / cooldown)
//! - Resilient duplex streaming session manager with reconnection
//! - Serialized tool-call dispatch against the robot
//! - Daily spend gating backed by a local cost ledger
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Daemon                           │
//! │   WakeSignal  │  StateMachine  │  Audio I/O         │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                SessionManager                        │
//! │   BudgetGate  │  ReconnectPolicy  │  Backend stream │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                ToolDispatcher                        │
//! │        CapabilitySurface (robot / simulated)        │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod budget;
pub mod config;
pub mod cost;
pub mod daemon;
pub mod error;
pub mod robot;
pub mod session;
pub mod state;
pub mod tools;
pub mod voice;
pub mod wake;

pub use budget::{BudgetDecision, BudgetGate, DailyBudgetGate};
pub use config::Config;
pub use cost::{CostLedger, Pricing};
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use robot::{CapabilityAction, CapabilitySurface, SimulatedSurface};
pub use session::reconnect::{Decision, FailureCause, ReconnectAttempt, ReconnectPolicy};
pub use session::{
    ConversationSession, EndReason, OpenOutcome, SessionEvent, SessionHandle, SessionId,
    SessionLimits, SessionManager, SessionReport,
};
pub use state::{DeviceState, Effect, EndCause, StateEvent, StateMachine};
pub use tools::{Profile, ToolCallRequest, ToolCallResult, ToolDispatcher};
pub use voice::AudioFrame;
pub use wake::{EnergyWakeDetector, WakeSignal};
