//! Conversation session management
//!
//! Owns the single live duplex session with the AI backend: opens it behind
//! the budget gate, pumps its events, reconnects transient failures per the
//! reconnection policy, enforces silence and max-duration limits, and records
//! the final spend on close.

pub mod backend;
pub mod reconnect;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep_until, timeout_at};
use uuid::Uuid;

use crate::budget::{BudgetDecision, BudgetGate};
use crate::cost::Pricing;
use crate::tools::{Profile, ToolCallRequest, ToolCallResult};
use crate::voice::AudioFrame;
use crate::{Error, Result};

use backend::{BackendEvent, BackendStream, ContextToken, ConversationBackend};
use reconnect::{FailureCause, ReconnectAttempt, ReconnectPolicy};

/// Identity of a conversation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh session id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle returned by [`SessionManager::open`]
pub type SessionHandle = SessionId;

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Backend closed the conversation
    Normal,
    /// No audio activity within the silence window
    Silence,
    /// Absolute session ceiling reached
    MaxDuration,
    /// Closed from outside the conversation (process shutdown)
    Interrupted,
    /// Fatal failure or exhausted retries
    Error(String),
}

/// Event surfaced to the orchestrator while a session is active
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Backend speech to play
    AudioOut(AudioFrame),
    /// A function-call request to dispatch
    ToolCall(ToolCallRequest),
    /// The session is over; the orchestrator must call `close`
    Ended(EndReason),
}

/// Outcome of an open attempt
#[derive(Debug)]
pub enum OpenOutcome {
    /// Session established
    Opened(SessionHandle),
    /// Budget gate refused; not an error
    Denied(BudgetDecision),
}

/// Observable snapshot of the live session
#[derive(Debug, Clone)]
pub struct ConversationSession {
    /// Session identity
    pub id: SessionId,
    /// Captured audio forwarded so far, in seconds
    pub input_audio_sec: f64,
    /// Backend audio received so far, in seconds
    pub output_audio_sec: f64,
    /// Successful reconnects performed
    pub reconnects: u32,
    /// Latest conversational continuity token
    pub context: Option<ContextToken>,
}

/// Final accounting for a closed session
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Session identity
    pub id: SessionId,
    /// Wall-clock session duration in seconds
    pub duration_sec: f64,
    /// Final estimated cost in USD
    pub cost_usd: f64,
    /// Successful reconnects performed
    pub reconnects: u32,
    /// Why the session ended
    pub reason: EndReason,
}

/// Session timing limits
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// Absolute session ceiling
    pub max_duration: Duration,
    /// Inactivity window before the session is ended
    pub silence_timeout: Duration,
}

/// Reconnection in progress, kept on the session so a cancelled
/// `next_event` resumes instead of restarting the backoff
#[derive(Debug, Clone)]
struct PendingReconnect {
    plan: ReconnectAttempt,
    last_error: String,
    resume_at: Instant,
}

struct ActiveSession {
    id: SessionId,
    profile: Profile,
    stream: Box<dyn BackendStream>,
    started_at: Instant,
    last_activity: Instant,
    context: Option<ContextToken>,
    input_audio_sec: f64,
    output_audio_sec: f64,
    reconnects: u32,
    pending_reconnect: Option<PendingReconnect>,
}

/// Owns the single live conversation session
pub struct SessionManager {
    backend: Box<dyn ConversationBackend>,
    budget: Arc<dyn BudgetGate>,
    policy: ReconnectPolicy,
    limits: SessionLimits,
    pricing: Pricing,
    session: Option<ActiveSession>,
    dropped_frames: u64,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("open", &self.session.is_some())
            .field("dropped_frames", &self.dropped_frames)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager over `backend`, gated by `budget`
    #[must_use]
    pub fn new(
        backend: Box<dyn ConversationBackend>,
        budget: Arc<dyn BudgetGate>,
        policy: ReconnectPolicy,
        limits: SessionLimits,
        pricing: Pricing,
    ) -> Self {
        Self {
            backend,
            budget,
            policy,
            limits,
            pricing,
            session: None,
            dropped_frames: 0,
        }
    }

    /// Whether a session is currently open
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Handle of the live session, if any
    #[must_use]
    pub fn handle(&self) -> Option<SessionHandle> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Frames dropped because no session was open to take them
    #[must_use]
    pub const fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Snapshot of the live session for observation
    #[must_use]
    pub fn session(&self) -> Option<ConversationSession> {
        self.session.as_ref().map(|s| ConversationSession {
            id: s.id,
            input_audio_sec: s.input_audio_sec,
            output_audio_sec: s.output_audio_sec,
            reconnects: s.reconnects,
            context: s.context.clone(),
        })
    }

    /// Open a session for `profile`.
    ///
    /// Consults the budget gate first; a refusal is returned as
    /// [`OpenOutcome::Denied`], not an error. At most one session may be live;
    /// opening while one is open is a protocol error.
    ///
    /// # Errors
    ///
    /// Returns the backend's connection error unchanged.
    pub async fn open(&mut self, profile: &Profile, budget_estimate: f64) -> Result<OpenOutcome> {
        if self.session.is_some() {
            return Err(Error::Protocol(
                "a session is already open".to_string(),
            ));
        }

        let decision = self.budget.check_and_reserve(budget_estimate);
        if !decision.allowed {
            return Ok(OpenOutcome::Denied(decision));
        }

        let stream = self.backend.connect(profile, None).await?;
        let id = SessionId::new();
        let now = Instant::now();

        tracing::info!(session = %id, profile = %profile.name, "session opened");

        self.session = Some(ActiveSession {
            id,
            profile: profile.clone(),
            stream,
            started_at: now,
            last_activity: now,
            context: None,
            input_audio_sec: 0.0,
            output_audio_sec: 0.0,
            reconnects: 0,
            pending_reconnect: None,
        });

        Ok(OpenOutcome::Opened(id))
    }

    /// Forward one captured audio frame to the backend.
    ///
    /// Dropped with a log (and counted) when no session is open or the handle
    /// is stale; a send failure is likewise logged and left for the receive
    /// path to classify.
    pub async fn send_audio(&mut self, handle: SessionHandle, frame: AudioFrame) {
        let Some(sess) = self.session.as_mut().filter(|s| s.id == handle) else {
            self.dropped_frames += 1;
            tracing::debug!(
                dropped = self.dropped_frames,
                "audio frame dropped, no open session for handle"
            );
            return;
        };

        let duration = frame.duration_secs();
        if let Err(e) = sess.stream.send_audio(frame).await {
            tracing::warn!(session = %sess.id, error = %e, "audio send failed");
            return;
        }

        sess.input_audio_sec += duration;
        sess.last_activity = Instant::now();
    }

    /// Forward a tool result as the response to an earlier tool call
    pub async fn send_tool_result(&mut self, handle: SessionHandle, result: &ToolCallResult) {
        let Some(sess) = self.session.as_mut().filter(|s| s.id == handle) else {
            tracing::warn!(
                correlation_id = %result.correlation_id,
                "tool result dropped, no open session for handle"
            );
            return;
        };

        if let Err(e) = sess.stream.send_tool_result(result).await {
            tracing::warn!(session = %sess.id, error = %e, "tool result send failed");
        }
    }

    /// Wait for the next session event.
    ///
    /// Events arrive in backend order. Transient stream failures are
    /// reconnected here, invisible to the caller unless retries exhaust; the
    /// context snapshot is refreshed after every successfully processed
    /// inbound event so reconnects resume conversational continuity. Silence
    /// and max-duration limits are enforced independently, except that the
    /// silence clock pauses while a reconnection is pending. The future is
    /// cancel safe: reconnection progress lives on the session, so a dropped
    /// poll resumes the same backoff schedule on the next call.
    pub async fn next_event(&mut self, handle: SessionHandle) -> SessionEvent {
        let limits = self.limits;
        let policy = self.policy;
        let backend = &*self.backend;

        let Some(sess) = self.session.as_mut().filter(|s| s.id == handle) else {
            tracing::warn!("next_event polled without an open session");
            return SessionEvent::Ended(EndReason::Error("no open session".to_string()));
        };

        loop {
            let max_deadline = sess.started_at + limits.max_duration;

            if Instant::now() >= max_deadline {
                tracing::info!(session = %sess.id, "max session duration reached");
                return SessionEvent::Ended(EndReason::MaxDuration);
            }

            if sess.pending_reconnect.is_some() {
                if let Err(description) = step_reconnect(backend, policy, sess, max_deadline).await
                {
                    sess.pending_reconnect = None;
                    return SessionEvent::Ended(EndReason::Error(description));
                }
                continue;
            }

            let silence_deadline = sess.last_activity + limits.silence_timeout;
            let deadline = silence_deadline.min(max_deadline);
            match timeout_at(deadline, sess.stream.receive()).await {
                Err(_elapsed) => {
                    if Instant::now() >= max_deadline {
                        tracing::info!(session = %sess.id, "max session duration reached");
                        return SessionEvent::Ended(EndReason::MaxDuration);
                    }
                    tracing::info!(session = %sess.id, "silence timeout");
                    return SessionEvent::Ended(EndReason::Silence);
                }
                Ok(Ok(event)) => {
                    if let Some(token) = sess.stream.context() {
                        sess.context = Some(token);
                    }

                    match event {
                        BackendEvent::Audio(frame) => {
                            sess.last_activity = Instant::now();
                            sess.output_audio_sec += frame.duration_secs();
                            return SessionEvent::AudioOut(frame);
                        }
                        BackendEvent::ToolCall {
                            name,
                            args,
                            call_id,
                        } => {
                            sess.last_activity = Instant::now();
                            return SessionEvent::ToolCall(ToolCallRequest {
                                name,
                                args,
                                correlation_id: call_id,
                                session_id: sess.id,
                            });
                        }
                        BackendEvent::TurnComplete => {
                            sess.last_activity = Instant::now();
                        }
                        BackendEvent::Closed => {
                            tracing::info!(session = %sess.id, "backend closed session");
                            return SessionEvent::Ended(EndReason::Normal);
                        }
                    }
                }
                Ok(Err(e)) => {
                    let cause = FailureCause::classify(&e);
                    if let Err(description) =
                        schedule_reconnect(policy, sess, 0, cause, e.to_string())
                    {
                        return SessionEvent::Ended(EndReason::Error(description));
                    }
                }
            }
        }
    }

    /// Close the session, record its final cost, and destroy it.
    ///
    /// Returns the final accounting, or `None` when no session matches the
    /// handle (a duplicate close is a no-op).
    pub async fn close(&mut self, handle: SessionHandle, reason: EndReason) -> Option<SessionReport> {
        if self.session.as_ref().is_none_or(|s| s.id != handle) {
            tracing::debug!("close ignored, no open session for handle");
            return None;
        }

        let mut sess = self.session.take()?;
        if let Err(e) = sess.stream.close().await {
            tracing::warn!(session = %sess.id, error = %e, "stream close failed");
        }

        let duration_sec = sess.started_at.elapsed().as_secs_f64();
        let cost_usd = self
            .pricing
            .estimate(sess.input_audio_sec, sess.output_audio_sec);
        self.budget.finalize(duration_sec, cost_usd);

        tracing::info!(
            session = %sess.id,
            duration_sec = format!("{duration_sec:.1}"),
            cost = format!("{cost_usd:.4}"),
            reconnects = sess.reconnects,
            ?reason,
            "session closed"
        );

        Some(SessionReport {
            id: sess.id,
            duration_sec,
            cost_usd,
            reconnects: sess.reconnects,
            reason,
        })
    }
}

/// Record a failure on the session as a pending reconnection.
///
/// Returns `Err` with a description when the policy gives up instead.
fn schedule_reconnect(
    policy: ReconnectPolicy,
    sess: &mut ActiveSession,
    attempt: u32,
    cause: FailureCause,
    last_error: String,
) -> std::result::Result<(), String> {
    match policy.plan(attempt, cause) {
        None => {
            tracing::error!(
                session = %sess.id,
                attempt,
                ?cause,
                error = %last_error,
                "giving up on session stream"
            );
            Err(format!(
                "stream failed after {attempt} reconnect attempts: {last_error}"
            ))
        }
        Some(plan) => {
            tracing::warn!(
                session = %sess.id,
                attempt = plan.attempt,
                delay_ms = plan.delay.as_millis(),
                error = %last_error,
                "session stream failed, reconnect scheduled"
            );
            sess.pending_reconnect = Some(PendingReconnect {
                plan,
                last_error,
                resume_at: Instant::now() + plan.delay,
            });
            Ok(())
        }
    }
}

/// Advance the pending reconnection by one step: wait out the backoff, then
/// try to connect. A connect failure reschedules with the next attempt index.
///
/// Returns `Err` with a description once the policy gives up.
async fn step_reconnect(
    backend: &dyn ConversationBackend,
    policy: ReconnectPolicy,
    sess: &mut ActiveSession,
    max_deadline: Instant,
) -> std::result::Result<(), String> {
    let Some(pending) = sess.pending_reconnect.clone() else {
        return Ok(());
    };

    if Instant::now() < pending.resume_at {
        // Cap the wait at the session ceiling; the caller re-checks it
        sleep_until(pending.resume_at.min(max_deadline)).await;
        return Ok(());
    }

    match backend.connect(&sess.profile, sess.context.as_ref()).await {
        Ok(stream) => {
            sess.stream = stream;
            sess.reconnects += 1;
            sess.pending_reconnect = None;
            sess.last_activity = Instant::now();
            tracing::info!(
                session = %sess.id,
                reconnects = sess.reconnects,
                "session stream re-established"
            );
            Ok(())
        }
        Err(e) => {
            let cause = FailureCause::classify(&e);
            schedule_reconnect(policy, sess, pending.plan.attempt + 1, cause, e.to_string())
        }
    }
}
