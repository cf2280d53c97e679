//! End-to-end lifecycle: wake, budget gate, session, cooldown, sleep

use std::sync::Arc;
use std::time::Duration;

use ember_companion::session::backend::SimulatedBackend;
use ember_companion::{
    BudgetGate, CostLedger, DailyBudgetGate, DeviceState, Effect, EndCause, EndReason,
    OpenOutcome, Pricing, Profile, SessionEvent, SessionLimits, SessionManager, StateEvent,
    StateMachine,
};

fn session_manager(gate: Arc<DailyBudgetGate>, limits: SessionLimits) -> SessionManager {
    SessionManager::new(
        Box::new(SimulatedBackend::new("aria")),
        gate,
        ember_companion::ReconnectPolicy::default(),
        limits,
        Pricing::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn wake_to_sleep_full_cycle_records_cost_once() {
    let ledger = CostLedger::in_memory().unwrap();
    let gate = Arc::new(DailyBudgetGate::new(1.00, ledger.clone()));
    let mut sessions = session_manager(
        Arc::clone(&gate),
        SessionLimits {
            max_duration: Duration::from_secs(300),
            silence_timeout: Duration::from_secs(300),
        },
    );
    let mut machine = StateMachine::new(0.7);
    let profile = Profile::default();

    machine.apply(&StateEvent::SetupComplete);
    assert_eq!(machine.state(), DeviceState::Sleeping);

    // A confident wake candidate starts the greeting
    let effects = machine.apply(&StateEvent::WakeDetected { confidence: 0.9 });
    assert_eq!(machine.state(), DeviceState::Waking);
    assert_eq!(effects, vec![Effect::StartGreeting]);

    // Fresh day, $0.10 estimate against a $1.00 budget: approved
    let OpenOutcome::Opened(handle) = sessions.open(&profile, 0.10).await.unwrap() else {
        panic!("expected the budget gate to approve");
    };

    let effects = machine.apply(&StateEvent::GreetingDone);
    assert_eq!(machine.state(), DeviceState::Active);
    assert_eq!(effects, vec![Effect::OpenSession]);

    // The simulated backend speaks its greeting, then stays quiet
    let event = sessions.next_event(handle).await;
    assert!(matches!(event, SessionEvent::AudioOut(_)));

    // Quiet until the 300s ceiling
    let event = sessions.next_event(handle).await;
    assert!(matches!(event, SessionEvent::Ended(EndReason::MaxDuration)));

    let effects = machine.apply(&StateEvent::MaxDurationReached);
    assert_eq!(machine.state(), DeviceState::Cooldown);
    assert_eq!(effects, vec![Effect::CloseSession]);

    let report = sessions
        .close(handle, EndReason::MaxDuration)
        .await
        .expect("close returns the report");
    assert!(report.duration_sec >= 300.0);
    assert_eq!(report.reconnects, 0);

    // Exactly one ledger row for the whole cycle
    assert_eq!(ledger.daily_session_count().unwrap(), 1);
    let spent = ledger.daily_total().unwrap();
    assert!((spent - report.cost_usd).abs() < 1e-12);

    machine.apply(&StateEvent::CooldownElapsed);
    assert_eq!(machine.state(), DeviceState::Sleeping);
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_routes_back_to_sleep() {
    let ledger = CostLedger::in_memory().unwrap();
    let gate = Arc::new(DailyBudgetGate::new(1.00, ledger));
    gate.finalize(300.0, 0.95);

    let mut sessions = session_manager(
        Arc::clone(&gate),
        SessionLimits {
            max_duration: Duration::from_secs(300),
            silence_timeout: Duration::from_secs(15),
        },
    );
    let mut machine = StateMachine::new(0.7);

    machine.apply(&StateEvent::SetupComplete);
    machine.apply(&StateEvent::WakeDetected { confidence: 0.8 });
    assert_eq!(machine.state(), DeviceState::Waking);

    let outcome = sessions.open(&Profile::default(), 0.10).await.unwrap();
    let OpenOutcome::Denied(decision) = outcome else {
        panic!("expected denial with $0.95 spent");
    };
    let reason = decision.reason.expect("denial carries a reason");
    assert!(reason.contains("daily budget exceeded"), "{reason}");

    let effects = machine.apply(&StateEvent::BudgetDenied { reason });
    assert_eq!(machine.state(), DeviceState::Sleeping);
    assert!(matches!(effects.as_slice(), [Effect::LogDenied(_)]));
    assert!(!sessions.is_open());
}

#[tokio::test(start_paused = true)]
async fn silence_ends_session_into_cooldown() {
    let ledger = CostLedger::in_memory().unwrap();
    let gate = Arc::new(DailyBudgetGate::new(1.00, ledger.clone()));
    let mut sessions = session_manager(
        Arc::clone(&gate),
        SessionLimits {
            max_duration: Duration::from_secs(300),
            silence_timeout: Duration::from_secs(15),
        },
    );
    let mut machine = StateMachine::new(0.7);

    machine.apply(&StateEvent::SetupComplete);
    machine.apply(&StateEvent::WakeDetected { confidence: 0.9 });
    let OpenOutcome::Opened(handle) = sessions.open(&Profile::default(), 0.10).await.unwrap()
    else {
        panic!("expected approval");
    };
    machine.apply(&StateEvent::GreetingDone);

    // Greeting audio, then 15 quiet seconds
    let event = sessions.next_event(handle).await;
    assert!(matches!(event, SessionEvent::AudioOut(_)));
    let event = sessions.next_event(handle).await;
    assert!(matches!(event, SessionEvent::Ended(EndReason::Silence)));

    machine.apply(&StateEvent::SilenceTimeout);
    assert_eq!(machine.state(), DeviceState::Cooldown);

    sessions.close(handle, EndReason::Silence).await.unwrap();
    assert_eq!(ledger.daily_session_count().unwrap(), 1);
}

#[tokio::test]
async fn fatal_session_error_logs_and_cools_down() {
    let mut machine = StateMachine::new(0.7);
    machine.apply(&StateEvent::SetupComplete);
    machine.apply(&StateEvent::WakeDetected { confidence: 0.9 });
    machine.apply(&StateEvent::GreetingDone);

    let effects = machine.apply(&StateEvent::SessionEnded(EndCause::Error(
        "stream failed after 5 reconnect attempts".to_string(),
    )));
    assert_eq!(machine.state(), DeviceState::Cooldown);
    assert_eq!(effects.len(), 2);
    assert_eq!(effects[0], Effect::CloseSession);
    assert!(matches!(&effects[1], Effect::LogError(_)));
}
