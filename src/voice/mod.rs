//! Audio I/O
//!
//! Frame type shared across the crate plus cpal-backed capture and playback.

mod capture;
mod playback;

pub use capture::AudioCapture;
pub use playback::AudioPlayback;

/// Sample rate for captured microphone audio (speech)
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Sample rate for backend output audio
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// A chunk of mono audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Samples in [-1.0, 1.0]
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioFrame {
    /// Create a frame from samples at `sample_rate`
    #[must_use]
    pub const fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Duration of this frame in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// Whether the frame carries no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
