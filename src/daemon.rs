//! Daemon - the companion's main loop
//!
//! Owns the state machine and executes its effects: wakes on the detector's
//! signal, opens budget-gated sessions, shuttles audio and tool calls while a
//! conversation is live, and settles through cooldown back to sleep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Interval, interval, sleep};

use crate::budget::DailyBudgetGate;
use crate::cost::CostLedger;
use crate::robot::{CapabilityAction, create_surface};
use crate::session::backend::create_backend;
use crate::session::{
    EndReason, OpenOutcome, SessionEvent, SessionHandle, SessionLimits, SessionManager,
    SessionReport,
};
use crate::state::{DeviceState, Effect, EndCause, StateEvent, StateMachine};
use crate::tools::ToolDispatcher;
use crate::voice::{AudioCapture, AudioPlayback};
use crate::wake::{EnergyWakeDetector, WakeSignal};
use crate::{Config, Result};

/// Audio poll interval (one capture chunk at 100ms)
const TICK: Duration = Duration::from_millis(100);

/// What the active-state select resolved to
enum ActiveStep {
    Shutdown,
    Event(SessionEvent),
    AudioTick,
}

/// The Ember daemon - drives the companion lifecycle
pub struct Daemon {
    config: Config,
    machine: StateMachine,
    sessions: SessionManager,
    dispatcher: ToolDispatcher,
    detector: Box<dyn WakeSignal>,
    capture: Option<AudioCapture>,
    playback: Option<AudioPlayback>,
    handle: Option<SessionHandle>,
    end_reason: Option<EndReason>,
    // Persistent so backend events cannot starve the poll deadline
    audio_tick: Interval,
}

impl Daemon {
    /// Create a new daemon instance.
    ///
    /// # Errors
    ///
    /// Returns error if the ledger, backend, or capability surface cannot be
    /// initialized, or if audio hardware is missing outside simulate mode.
    pub fn new(config: Config) -> Result<Self> {
        let ledger_path = config.data_dir.join("ember.db");
        let ledger = CostLedger::open(&ledger_path)?;
        tracing::info!(path = %ledger_path.display(), "cost ledger initialized");

        let gate = Arc::new(DailyBudgetGate::new(config.cost.daily_budget_usd, ledger));
        let backend = create_backend(&config)?;
        let surface = create_surface(&config.robot)?;

        let sessions = SessionManager::new(
            backend,
            gate,
            config.reconnect.policy(),
            SessionLimits {
                max_duration: Duration::from_secs(config.session.max_duration_sec),
                silence_timeout: Duration::from_secs(config.session.silence_timeout_sec),
            },
            config.cost.pricing,
        );

        let (capture, playback) = init_audio(config.robot.simulate)?;

        let detector = Box::new(EnergyWakeDetector::new(Duration::from_secs_f64(
            config.wake.refractory_sec,
        )));

        Ok(Self {
            machine: StateMachine::new(config.wake.confidence_threshold),
            sessions,
            dispatcher: ToolDispatcher::new(surface),
            detector,
            capture,
            playback,
            handle: None,
            end_reason: None,
            audio_tick: interval(TICK),
            config,
        })
    }

    /// Current device state (for observation)
    #[must_use]
    pub const fn state(&self) -> DeviceState {
        self.machine.state()
    }

    /// Run the daemon until interrupted.
    ///
    /// # Errors
    ///
    /// Returns error if audio capture cannot start. Runtime session and
    /// capability failures are routed through the state machine instead.
    pub async fn run(mut self) -> Result<()> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        if let Some(capture) = &mut self.capture {
            capture.start()?;
        }
        if let Some(playback) = &mut self.playback {
            playback.start()?;
        }

        self.drive(StateEvent::SetupComplete).await;
        tracing::info!("ember companion ready, listening for wake word");

        loop {
            match self.machine.state() {
                DeviceState::Shutdown => break,
                DeviceState::Setup => self.drive(StateEvent::SetupComplete).await,
                DeviceState::Sleeping => self.sleep_tick(&mut shutdown_rx).await,
                DeviceState::Waking => self.open_session().await,
                DeviceState::Active => self.active_tick(&mut shutdown_rx).await,
                DeviceState::Cooldown => self.cooldown(&mut shutdown_rx).await,
            }
        }

        if let Some(capture) = &mut self.capture {
            capture.stop();
        }
        if let Some(playback) = &mut self.playback {
            playback.stop();
        }

        tracing::info!("daemon stopped");
        Ok(())
    }

    /// One sleeping-state iteration: poll the mic for a wake candidate
    async fn sleep_tick(&mut self, shutdown_rx: &mut mpsc::Receiver<()>) {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                self.drive(StateEvent::Shutdown).await;
            }
            () = sleep(TICK) => {
                let Some(frame) = self.capture.as_ref().and_then(AudioCapture::take_frame)
                else {
                    return;
                };
                if let Some(confidence) = self.detector.process(&frame.samples) {
                    self.drive(StateEvent::WakeDetected { confidence }).await;
                }
            }
        }
    }

    /// Open the session while still waking, so a budget denial routes back to
    /// sleep without ever entering the active state.
    async fn open_session(&mut self) {
        let estimate = self.config.cost.session_estimate_usd;
        match self.sessions.open(&self.config.profile, estimate).await {
            Ok(OpenOutcome::Opened(handle)) => {
                self.handle = Some(handle);
                if let Some(capture) = &self.capture {
                    capture.clear();
                }
                self.audio_tick.reset();
                self.drive(StateEvent::GreetingDone).await;
            }
            Ok(OpenOutcome::Denied(decision)) => {
                let reason = decision
                    .reason
                    .unwrap_or_else(|| "budget denied".to_string());
                self.drive(StateEvent::BudgetDenied { reason }).await;
            }
            Err(e) => {
                // Connect failures at open take the same path back to sleep
                tracing::error!(error = %e, "session open failed");
                self.drive(StateEvent::BudgetDenied {
                    reason: format!("session open failed: {e}"),
                })
                .await;
            }
        }
    }

    /// One active-state iteration: race the session's next event against the
    /// audio tick and the shutdown signal
    async fn active_tick(&mut self, shutdown_rx: &mut mpsc::Receiver<()>) {
        let Some(handle) = self.handle else {
            tracing::error!("active state without a session handle");
            self.drive(StateEvent::FatalSessionError {
                message: "active state without a session".to_string(),
            })
            .await;
            return;
        };

        match self.next_active_step(handle, shutdown_rx).await {
            ActiveStep::Shutdown => {
                self.end_reason = Some(EndReason::Interrupted);
                self.drive(StateEvent::Shutdown).await;
            }
            ActiveStep::Event(event) => self.handle_session_event(event).await,
            ActiveStep::AudioTick => {
                if let Some(frame) = self.capture.as_ref().and_then(AudioCapture::take_frame) {
                    self.sessions.send_audio(handle, frame).await;
                }
            }
        }
    }

    /// Race the session's next event against the audio poll and shutdown.
    ///
    /// The poll deadline comes from the persistent interval, so a backend
    /// emitting events faster than the tick still yields poll slots.
    async fn next_active_step(
        &mut self,
        handle: SessionHandle,
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) -> ActiveStep {
        let next = self.sessions.next_event(handle);
        tokio::pin!(next);
        tokio::select! {
            _ = shutdown_rx.recv() => ActiveStep::Shutdown,
            event = &mut next => ActiveStep::Event(event),
            _ = self.audio_tick.tick() => ActiveStep::AudioTick,
        }
    }

    async fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::AudioOut(frame) => {
                if let Some(playback) = &self.playback {
                    playback.enqueue(&frame);
                }
            }
            SessionEvent::ToolCall(request) => {
                let result = self.dispatcher.dispatch(&request, &self.config.profile).await;
                if let Some(handle) = self.handle {
                    self.sessions.send_tool_result(handle, &result).await;
                }
            }
            SessionEvent::Ended(reason) => {
                let event = match &reason {
                    EndReason::Normal | EndReason::Interrupted => {
                        StateEvent::SessionEnded(EndCause::Normal)
                    }
                    EndReason::Silence => StateEvent::SilenceTimeout,
                    EndReason::MaxDuration => StateEvent::MaxDurationReached,
                    EndReason::Error(message) => {
                        StateEvent::SessionEnded(EndCause::Error(message.clone()))
                    }
                };
                self.end_reason = Some(reason);
                self.drive(event).await;
            }
        }
    }

    /// Wait out the cooldown period, still honoring shutdown
    async fn cooldown(&mut self, shutdown_rx: &mut mpsc::Receiver<()>) {
        let period = Duration::from_secs(self.config.session.cooldown_sec);
        tokio::select! {
            _ = shutdown_rx.recv() => {
                self.drive(StateEvent::Shutdown).await;
            }
            () = sleep(period) => {
                self.drive(StateEvent::CooldownElapsed).await;
            }
        }
    }

    /// Apply an event to the state machine and execute the resulting effects
    async fn drive(&mut self, event: StateEvent) {
        let effects = self.machine.apply(&event);
        for effect in effects {
            self.execute(effect).await;
        }
    }

    async fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::StartGreeting => {
                if let Err(e) = self.dispatcher.perform(CapabilityAction::WakeUp).await {
                    tracing::warn!(error = %e, "greeting animation failed");
                }
            }
            Effect::OpenSession => {
                // Session was opened during waking; this marks it live
                tracing::debug!(handle = ?self.handle, "session active");
            }
            Effect::CloseSession | Effect::CloseSessionIfOpen => {
                let _ = self.close_session().await;
            }
            Effect::LogDenied(reason) => {
                tracing::warn!(%reason, "session denied");
            }
            Effect::LogError(message) => {
                tracing::error!(%message, "session error");
            }
        }
    }

    /// Close the live session, if any, and settle the audio path.
    ///
    /// A close without a recorded end reason means the conversation was cut
    /// off from outside (shutdown), so it is reported as an interruption.
    async fn close_session(&mut self) -> Option<SessionReport> {
        let handle = self.handle.take()?;

        let reason = self.end_reason.take().unwrap_or(EndReason::Interrupted);
        let report = self.sessions.close(handle, reason).await;
        if let Some(report) = &report {
            tracing::info!(
                session = %report.id,
                duration_sec = format!("{:.1}", report.duration_sec),
                cost = format!("{:.4}", report.cost_usd),
                reason = ?report.reason,
                "session finished"
            );
        }

        if let Some(playback) = &self.playback {
            playback.flush();
        }
        self.detector.reset();

        if let Err(e) = self.dispatcher.perform(CapabilityAction::Sleep).await {
            tracing::warn!(error = %e, "sleep animation failed");
        }

        report
    }
}

/// Open the audio devices. Outside simulate mode missing hardware is fatal;
/// in simulate mode the daemon runs without audio.
fn init_audio(simulate: bool) -> Result<(Option<AudioCapture>, Option<AudioPlayback>)> {
    match (AudioCapture::new(), AudioPlayback::new()) {
        (Ok(capture), Ok(playback)) => Ok((Some(capture), Some(playback))),
        (capture, playback) if simulate => {
            if let Err(e) = &capture {
                tracing::warn!(error = %e, "no audio capture, running without microphone");
            }
            if let Err(e) = &playback {
                tracing::warn!(error = %e, "no audio playback, running silent");
            }
            Ok((capture.ok(), playback.ok()))
        }
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::cost::Pricing;
    use crate::robot::SimulatedSurface;
    use crate::session::backend::{BackendEvent, BackendStream, ContextToken, ConversationBackend};
    use crate::session::reconnect::ReconnectPolicy;
    use crate::tools::{Profile, ToolCallResult};
    use crate::voice::{AudioFrame, PLAYBACK_SAMPLE_RATE};

    /// Backend whose stream produces audio every 50ms, forever
    struct ChattyBackend;

    #[async_trait]
    impl ConversationBackend for ChattyBackend {
        async fn connect(
            &self,
            _profile: &Profile,
            _context: Option<&ContextToken>,
        ) -> Result<Box<dyn BackendStream>> {
            Ok(Box::new(ChattyStream))
        }
    }

    struct ChattyStream;

    #[async_trait]
    impl BackendStream for ChattyStream {
        async fn send_audio(&mut self, _frame: AudioFrame) -> Result<()> {
            Ok(())
        }

        async fn receive(&mut self) -> Result<BackendEvent> {
            sleep(Duration::from_millis(50)).await;
            let samples = vec![0.0; PLAYBACK_SAMPLE_RATE as usize / 20];
            Ok(BackendEvent::Audio(AudioFrame::new(
                samples,
                PLAYBACK_SAMPLE_RATE,
            )))
        }

        async fn send_tool_result(&mut self, _result: &ToolCallResult) -> Result<()> {
            Ok(())
        }

        fn context(&self) -> Option<ContextToken> {
            None
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn test_daemon(backend: Box<dyn ConversationBackend>) -> Daemon {
        let ledger = CostLedger::in_memory().unwrap();
        let gate = Arc::new(DailyBudgetGate::new(5.0, ledger));
        let sessions = SessionManager::new(
            backend,
            gate,
            ReconnectPolicy::default(),
            SessionLimits {
                max_duration: Duration::from_secs(300),
                silence_timeout: Duration::from_secs(300),
            },
            Pricing::default(),
        );

        let config = Config::default();
        Daemon {
            machine: StateMachine::new(config.wake.confidence_threshold),
            sessions,
            dispatcher: ToolDispatcher::new(Box::new(SimulatedSurface::new(1.0))),
            detector: Box::new(EnergyWakeDetector::new(Duration::from_secs(2))),
            capture: None,
            playback: None,
            handle: None,
            end_reason: None,
            audio_tick: interval(TICK),
            config,
        }
    }

    async fn open_test_session(daemon: &mut Daemon) -> SessionHandle {
        let outcome = daemon
            .sessions
            .open(&daemon.config.profile, 0.01)
            .await
            .unwrap();
        let OpenOutcome::Opened(handle) = outcome else {
            panic!("expected the budget gate to approve");
        };
        daemon.handle = Some(handle);
        handle
    }

    #[tokio::test(start_paused = true)]
    async fn audio_poll_keeps_firing_under_constant_backend_events() {
        let mut daemon = test_daemon(Box::new(ChattyBackend));
        let handle = open_test_session(&mut daemon).await;
        daemon.audio_tick.reset();

        let (_tx, mut rx) = mpsc::channel(1);
        let mut ticks = 0u32;
        let mut events = 0u32;
        for _ in 0..40 {
            match daemon.next_active_step(handle, &mut rx).await {
                ActiveStep::AudioTick => ticks += 1,
                ActiveStep::Event(_) => events += 1,
                ActiveStep::Shutdown => panic!("unexpected shutdown"),
            }
        }

        assert!(events > 0, "backend events never surfaced");
        assert!(ticks > 0, "audio poll starved by backend events");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_while_active_closes_the_session() {
        let mut daemon = test_daemon(Box::new(ChattyBackend));
        open_test_session(&mut daemon).await;
        daemon.machine.apply(&StateEvent::SetupComplete);
        daemon
            .machine
            .apply(&StateEvent::WakeDetected { confidence: 0.9 });
        daemon.machine.apply(&StateEvent::GreetingDone);
        assert_eq!(daemon.machine.state(), DeviceState::Active);

        let (tx, mut rx) = mpsc::channel(1);
        tx.send(()).await.unwrap();
        for _ in 0..10 {
            daemon.active_tick(&mut rx).await;
            if daemon.machine.state() == DeviceState::Shutdown {
                break;
            }
        }

        assert_eq!(daemon.machine.state(), DeviceState::Shutdown);
        assert!(!daemon.sessions.is_open());
        assert!(daemon.end_reason.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn close_without_a_recorded_end_reports_interruption() {
        let mut daemon = test_daemon(Box::new(ChattyBackend));
        open_test_session(&mut daemon).await;

        let report = daemon
            .close_session()
            .await
            .expect("close returns the report");
        assert_eq!(report.reason, EndReason::Interrupted);
        assert!(!daemon.sessions.is_open());
    }
}
