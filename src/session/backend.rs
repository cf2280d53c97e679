//! Conversation backend abstraction
//!
//! The session manager talks to the AI backend only through these traits.
//! Concrete backends register in [`create_backend`], keyed by the config
//! string; the simulated backend stands in when no cloud service is wired up.

use async_trait::async_trait;
use tokio::time::{Duration, sleep};
use uuid::Uuid;

use crate::config::Config;
use crate::tools::{Profile, ToolCallResult, ToolRegistry};
use crate::voice::{AudioFrame, PLAYBACK_SAMPLE_RATE};
use crate::{Error, Result};

/// Opaque conversational continuity token.
///
/// Returned by the backend as the conversation progresses; presenting it on a
/// reconnect lets the backend resume prior conversational state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextToken(pub String);

/// One inbound event from the backend stream
#[derive(Debug, Clone)]
pub enum BackendEvent {
    /// Speech audio to play
    Audio(AudioFrame),
    /// A function-call request
    ToolCall {
        /// Declared tool name
        name: String,
        /// Raw argument mapping
        args: serde_json::Map<String, serde_json::Value>,
        /// Backend-assigned call id
        call_id: Uuid,
    },
    /// The backend finished a conversational turn
    TurnComplete,
    /// The backend closed the conversation normally
    Closed,
}

/// Factory for duplex conversation streams
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// Open a duplex stream.
    ///
    /// `context` carries the continuity token of a previous stream when
    /// reconnecting mid-conversation.
    ///
    /// # Errors
    ///
    /// Connection failures are classified through `FailureCause::classify`
    /// for retry purposes.
    async fn connect(
        &self,
        profile: &Profile,
        context: Option<&ContextToken>,
    ) -> Result<Box<dyn BackendStream>>;
}

/// An open duplex stream with the backend
#[async_trait]
pub trait BackendStream: Send {
    /// Forward one captured audio frame
    async fn send_audio(&mut self, frame: AudioFrame) -> Result<()>;

    /// Wait for the next inbound event
    async fn receive(&mut self) -> Result<BackendEvent>;

    /// Forward a tool result as the response to an earlier `ToolCall`
    async fn send_tool_result(&mut self, result: &ToolCallResult) -> Result<()>;

    /// Latest continuity token observed on this stream
    fn context(&self) -> Option<ContextToken>;

    /// Close the stream
    async fn close(&mut self) -> Result<()>;
}

/// Build the backend selected by configuration.
///
/// # Errors
///
/// Returns `Error::Config` for an unknown backend kind.
pub fn create_backend(config: &Config) -> Result<Box<dyn ConversationBackend>> {
    match config.backend.kind.as_str() {
        "simulated" => Ok(Box::new(SimulatedBackend::new(&config.backend.voice))),
        other => Err(Error::Config(format!(
            "unknown backend kind '{other}' (available: simulated)"
        ))),
    }
}

/// Offline backend for simulate mode and tests.
///
/// Speaks a short greeting on connect, then stays quiet so the session's
/// silence timeout drives the lifecycle.
#[derive(Debug)]
pub struct SimulatedBackend {
    voice: String,
}

impl SimulatedBackend {
    /// Create a simulated backend
    #[must_use]
    pub fn new(voice: &str) -> Self {
        Self {
            voice: voice.to_string(),
        }
    }
}

#[async_trait]
impl ConversationBackend for SimulatedBackend {
    async fn connect(
        &self,
        profile: &Profile,
        context: Option<&ContextToken>,
    ) -> Result<Box<dyn BackendStream>> {
        // A wire backend would declare these in its session setup message
        tracing::info!(
            profile = %profile.name,
            voice = %self.voice,
            tools = ?ToolRegistry::tool_names(),
            resuming = context.is_some(),
            "simulated backend connected"
        );

        Ok(Box::new(SimulatedStream {
            context: context.cloned(),
            greeted: false,
            exchanges: 0,
        }))
    }
}

struct SimulatedStream {
    context: Option<ContextToken>,
    greeted: bool,
    exchanges: u64,
}

#[async_trait]
impl BackendStream for SimulatedStream {
    async fn send_audio(&mut self, frame: AudioFrame) -> Result<()> {
        tracing::trace!(samples = frame.samples.len(), "simulated backend got audio");
        Ok(())
    }

    async fn receive(&mut self) -> Result<BackendEvent> {
        if !self.greeted {
            self.greeted = true;
            self.exchanges += 1;
            self.context = Some(ContextToken(format!("sim-ctx-{}", self.exchanges)));
            // Half a second of silence standing in for a spoken greeting
            let samples = vec![0.0; PLAYBACK_SAMPLE_RATE as usize / 2];
            return Ok(BackendEvent::Audio(AudioFrame::new(
                samples,
                PLAYBACK_SAMPLE_RATE,
            )));
        }

        // Quiet after the greeting; the silence timeout ends the session
        loop {
            sleep(Duration::from_secs(3600)).await;
        }
    }

    async fn send_tool_result(&mut self, result: &ToolCallResult) -> Result<()> {
        tracing::debug!(
            correlation_id = %result.correlation_id,
            ok = result.ok,
            "simulated backend got tool result"
        );
        Ok(())
    }

    fn context(&self) -> Option<ContextToken> {
        self.context.clone()
    }

    async fn close(&mut self) -> Result<()> {
        tracing::debug!("simulated backend stream closed");
        Ok(())
    }
}
