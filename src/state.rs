//! Device lifecycle state machine
//!
//! A pure transition engine: no I/O, fully deterministic. The daemon feeds it
//! events and executes the effects it emits; nothing else mutates the device
//! state.

use std::time::Instant;

/// Operating mode of the companion device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Initial state, configuration not yet validated
    Setup,
    /// Idle, listening for the wake word
    Sleeping,
    /// Wake word heard, greeting in progress
    Waking,
    /// Conversation session open
    Active,
    /// Post-conversation settling period
    Cooldown,
    /// Terminal state, process exits
    Shutdown,
}

/// Why an active session came to an end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndCause {
    /// Backend closed the conversation normally
    Normal,
    /// Retries exhausted or a fatal stream error
    Error(String),
}

/// Events fed into the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    /// Startup validation finished
    SetupComplete,
    /// Wake word candidate with its confidence score
    WakeDetected {
        /// Detector confidence in [0, 1]
        confidence: f32,
    },
    /// Greeting animation finished
    GreetingDone,
    /// Budget gate refused to open a session
    BudgetDenied {
        /// Gate's denial reason
        reason: String,
    },
    /// Session ended (normally or after exhausted retries)
    SessionEnded(EndCause),
    /// No audio activity for the configured window
    SilenceTimeout,
    /// Unrecoverable session error, no retry
    FatalSessionError {
        /// Diagnostic message
        message: String,
    },
    /// Absolute session ceiling reached
    MaxDurationReached,
    /// Cooldown period elapsed
    CooldownElapsed,
    /// Process shutdown requested
    Shutdown,
}

/// Commands emitted by a transition, executed by the daemon
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open a conversation session
    OpenSession,
    /// Close the active session
    CloseSession,
    /// Play the wake greeting animation
    StartGreeting,
    /// Log a budget denial
    LogDenied(String),
    /// Log a fatal session error
    LogError(String),
    /// Close the session if one is open (shutdown path)
    CloseSessionIfOpen,
}

/// Compute the transition for `(state, event)`.
///
/// Pairs outside the transition table are no-ops: the same state is returned
/// with no effects. Duplicate signals (a second wake while already waking, a
/// cooldown tick after shutdown) are tolerated rather than treated as errors.
/// A `WakeDetected` below `wake_threshold` is likewise a no-op.
#[must_use]
pub fn transition(
    state: DeviceState,
    event: &StateEvent,
    wake_threshold: f32,
) -> (DeviceState, Vec<Effect>) {
    use DeviceState::{Active, Cooldown, Setup, Shutdown, Sleeping, Waking};

    match (state, event) {
        (_, StateEvent::Shutdown) => (Shutdown, vec![Effect::CloseSessionIfOpen]),

        (Setup, StateEvent::SetupComplete) => (Sleeping, Vec::new()),

        (Sleeping, StateEvent::WakeDetected { confidence }) if *confidence >= wake_threshold => {
            (Waking, vec![Effect::StartGreeting])
        }

        (Waking, StateEvent::GreetingDone) => (Active, vec![Effect::OpenSession]),
        (Waking, StateEvent::BudgetDenied { reason }) => {
            (Sleeping, vec![Effect::LogDenied(reason.clone())])
        }

        (Active, StateEvent::SessionEnded(EndCause::Normal) | StateEvent::SilenceTimeout
            | StateEvent::MaxDurationReached) => (Cooldown, vec![Effect::CloseSession]),
        (Active, StateEvent::SessionEnded(EndCause::Error(message)))
        | (Active, StateEvent::FatalSessionError { message }) => (
            Cooldown,
            vec![Effect::CloseSession, Effect::LogError(message.clone())],
        ),

        (Cooldown, StateEvent::CooldownElapsed) => (Sleeping, Vec::new()),

        _ => (state, Vec::new()),
    }
}

/// Stateful wrapper owning the single `DeviceState` value.
///
/// Tracks when the current state was entered and the confidence of the last
/// accepted wake event. All mutation goes through [`StateMachine::apply`].
#[derive(Debug)]
pub struct StateMachine {
    state: DeviceState,
    entered_at: Instant,
    wake_threshold: f32,
    last_wake_confidence: f32,
}

impl StateMachine {
    /// Create a machine in the `Setup` state
    #[must_use]
    pub fn new(wake_threshold: f32) -> Self {
        Self {
            state: DeviceState::Setup,
            entered_at: Instant::now(),
            wake_threshold,
            last_wake_confidence: 0.0,
        }
    }

    /// Current device state
    #[must_use]
    pub const fn state(&self) -> DeviceState {
        self.state
    }

    /// Seconds spent in the current state
    #[must_use]
    pub fn time_in_state(&self) -> f64 {
        self.entered_at.elapsed().as_secs_f64()
    }

    /// Confidence of the most recent accepted wake event
    #[must_use]
    pub const fn last_wake_confidence(&self) -> f32 {
        self.last_wake_confidence
    }

    /// Apply an event, returning the effects to execute.
    ///
    /// Transitions are logged; no-ops are not.
    pub fn apply(&mut self, event: &StateEvent) -> Vec<Effect> {
        let (next, effects) = transition(self.state, event, self.wake_threshold);

        if next != self.state {
            tracing::info!(
                from = ?self.state,
                to = ?next,
                event = ?event,
                dwell_sec = format!("{:.1}", self.time_in_state()),
                "state transition"
            );
            if let StateEvent::WakeDetected { confidence } = event {
                self.last_wake_confidence = *confidence;
            }
            self.state = next;
            self.entered_at = Instant::now();
        }

        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(machine: &mut StateMachine, events: &[StateEvent]) {
        for event in events {
            machine.apply(event);
        }
    }

    #[test]
    fn setup_to_sleeping() {
        let (next, effects) = transition(DeviceState::Setup, &StateEvent::SetupComplete, 0.7);
        assert_eq!(next, DeviceState::Sleeping);
        assert!(effects.is_empty());
    }

    #[test]
    fn wake_above_threshold_starts_greeting() {
        let (next, effects) = transition(
            DeviceState::Sleeping,
            &StateEvent::WakeDetected { confidence: 0.9 },
            0.7,
        );
        assert_eq!(next, DeviceState::Waking);
        assert_eq!(effects, vec![Effect::StartGreeting]);
    }

    #[test]
    fn wake_below_threshold_is_noop() {
        let (next, effects) = transition(
            DeviceState::Sleeping,
            &StateEvent::WakeDetected { confidence: 0.5 },
            0.7,
        );
        assert_eq!(next, DeviceState::Sleeping);
        assert!(effects.is_empty());
    }

    #[test]
    fn greeting_done_opens_session() {
        let (next, effects) = transition(DeviceState::Waking, &StateEvent::GreetingDone, 0.7);
        assert_eq!(next, DeviceState::Active);
        assert_eq!(effects, vec![Effect::OpenSession]);
    }

    #[test]
    fn budget_denied_returns_to_sleep() {
        let (next, effects) = transition(
            DeviceState::Waking,
            &StateEvent::BudgetDenied {
                reason: "daily budget exhausted".to_string(),
            },
            0.7,
        );
        assert_eq!(next, DeviceState::Sleeping);
        assert!(matches!(effects.as_slice(), [Effect::LogDenied(_)]));
    }

    #[test]
    fn active_exits_to_cooldown() {
        for event in [
            StateEvent::SessionEnded(EndCause::Normal),
            StateEvent::SilenceTimeout,
            StateEvent::MaxDurationReached,
        ] {
            let (next, effects) = transition(DeviceState::Active, &event, 0.7);
            assert_eq!(next, DeviceState::Cooldown, "event {event:?}");
            assert_eq!(effects, vec![Effect::CloseSession]);
        }
    }

    #[test]
    fn fatal_error_closes_and_logs() {
        let (next, effects) = transition(
            DeviceState::Active,
            &StateEvent::FatalSessionError {
                message: "auth rejected".to_string(),
            },
            0.7,
        );
        assert_eq!(next, DeviceState::Cooldown);
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0], Effect::CloseSession);
        assert!(matches!(&effects[1], Effect::LogError(m) if m == "auth rejected"));
    }

    #[test]
    fn shutdown_from_any_state() {
        for state in [
            DeviceState::Setup,
            DeviceState::Sleeping,
            DeviceState::Waking,
            DeviceState::Active,
            DeviceState::Cooldown,
        ] {
            let (next, effects) = transition(state, &StateEvent::Shutdown, 0.7);
            assert_eq!(next, DeviceState::Shutdown);
            assert_eq!(effects, vec![Effect::CloseSessionIfOpen]);
        }
    }

    #[test]
    fn unhandled_pairs_are_noops() {
        let states = [
            DeviceState::Setup,
            DeviceState::Sleeping,
            DeviceState::Waking,
            DeviceState::Active,
            DeviceState::Cooldown,
            DeviceState::Shutdown,
        ];
        let events = [
            StateEvent::SetupComplete,
            StateEvent::WakeDetected { confidence: 0.9 },
            StateEvent::GreetingDone,
            StateEvent::BudgetDenied {
                reason: String::new(),
            },
            StateEvent::SessionEnded(EndCause::Normal),
            StateEvent::SilenceTimeout,
            StateEvent::FatalSessionError {
                message: String::new(),
            },
            StateEvent::MaxDurationReached,
            StateEvent::CooldownElapsed,
        ];

        let handled: &[(DeviceState, usize)] = &[
            (DeviceState::Setup, 0),
            (DeviceState::Sleeping, 1),
            (DeviceState::Waking, 2),
            (DeviceState::Waking, 3),
            (DeviceState::Active, 4),
            (DeviceState::Active, 5),
            (DeviceState::Active, 6),
            (DeviceState::Active, 7),
            (DeviceState::Cooldown, 8),
        ];

        for state in states {
            for (i, event) in events.iter().enumerate() {
                if handled.contains(&(state, i)) {
                    continue;
                }
                let (next, effects) = transition(state, event, 0.7);
                assert_eq!(next, state, "{state:?} + {event:?} should be a no-op");
                assert!(effects.is_empty(), "{state:?} + {event:?} emitted effects");
            }
        }
    }

    #[test]
    fn duplicate_wake_while_waking_ignored() {
        let mut machine = StateMachine::new(0.7);
        walk(
            &mut machine,
            &[
                StateEvent::SetupComplete,
                StateEvent::WakeDetected { confidence: 0.8 },
                StateEvent::WakeDetected { confidence: 0.95 },
            ],
        );
        assert_eq!(machine.state(), DeviceState::Waking);
        // Second wake was dropped, confidence still from the accepted one
        assert!((machine.last_wake_confidence() - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn dwell_clock_resets_on_transition() {
        let mut machine = StateMachine::new(0.7);
        std::thread::sleep(std::time::Duration::from_millis(200));
        assert!(machine.time_in_state() >= 0.2);

        machine.apply(&StateEvent::SetupComplete);
        assert!(machine.time_in_state() < 0.2);
    }

    #[test]
    fn full_cycle_returns_to_sleeping() {
        let mut machine = StateMachine::new(0.7);
        walk(
            &mut machine,
            &[
                StateEvent::SetupComplete,
                StateEvent::WakeDetected { confidence: 0.9 },
                StateEvent::GreetingDone,
                StateEvent::MaxDurationReached,
                StateEvent::CooldownElapsed,
            ],
        );
        assert_eq!(machine.state(), DeviceState::Sleeping);
    }
}
