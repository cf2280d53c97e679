//! Wake signal detection
//!
//! Watches the microphone stream while the device sleeps and emits a
//! confidence score when a wake phrase is likely. Thresholding happens in the
//! state machine, not here; the detector only scores.

use std::time::Duration;

use crate::voice::CAPTURE_SAMPLE_RATE;

/// Minimum audio energy to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// RMS energy treated as full confidence
const FULL_CONFIDENCE_ENERGY: f32 = 0.3;

/// Minimum duration of speech to trigger (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration to consider end of utterance (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// Source of wake detections over the capture stream
pub trait WakeSignal: Send {
    /// Feed captured samples; returns a confidence in [0, 1] when a candidate
    /// wake phrase completes
    fn process(&mut self, samples: &[f32]) -> Option<f32>;

    /// Drop any partial detection state
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectorState {
    /// Waiting for speech
    Idle,
    /// Detected potential speech, accumulating
    Listening,
}

/// Energy-based wake detector.
///
/// Scores a speech segment by its peak RMS energy. A refractory window after
/// each emission suppresses re-triggering on the tail of the same utterance.
pub struct EnergyWakeDetector {
    state: DetectorState,
    speech_samples: usize,
    silence_counter: usize,
    peak_energy: f32,
    refractory_samples: usize,
    refractory_remaining: usize,
}

impl EnergyWakeDetector {
    /// Create a detector with the given refractory window
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(refractory: Duration) -> Self {
        let refractory_samples =
            (refractory.as_secs_f64() * f64::from(CAPTURE_SAMPLE_RATE)) as usize;

        tracing::debug!(refractory_samples, "wake detector initialized");

        Self {
            state: DetectorState::Idle,
            speech_samples: 0,
            silence_counter: 0,
            peak_energy: 0.0,
            refractory_samples,
            refractory_remaining: 0,
        }
    }

    fn emit(&mut self) -> Option<f32> {
        let confidence = (self.peak_energy / FULL_CONFIDENCE_ENERGY).min(1.0);
        tracing::debug!(
            confidence,
            peak_energy = self.peak_energy,
            samples = self.speech_samples,
            "wake candidate"
        );
        self.reset();
        self.refractory_remaining = self.refractory_samples;
        Some(confidence)
    }
}

impl WakeSignal for EnergyWakeDetector {
    fn process(&mut self, samples: &[f32]) -> Option<f32> {
        if self.refractory_remaining > 0 {
            self.refractory_remaining = self.refractory_remaining.saturating_sub(samples.len());
            return None;
        }

        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            DetectorState::Idle => {
                if is_speech {
                    self.state = DetectorState::Listening;
                    self.speech_samples = samples.len();
                    self.silence_counter = 0;
                    self.peak_energy = energy;
                    tracing::trace!(energy, "speech detected, listening");
                }
            }
            DetectorState::Listening => {
                self.speech_samples += samples.len();

                if is_speech {
                    self.silence_counter = 0;
                    self.peak_energy = self.peak_energy.max(energy);
                } else {
                    self.silence_counter += samples.len();
                }

                // Enough speech followed by silence completes a candidate
                if self.silence_counter > SILENCE_SAMPLES
                    && self.speech_samples > MIN_SPEECH_SAMPLES + self.silence_counter
                {
                    return self.emit();
                }

                // Too much silence without enough speech
                if self.silence_counter > SILENCE_SAMPLES * 2 {
                    tracing::trace!("speech too short, resetting");
                    self.reset();
                }
            }
        }

        None
    }

    fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.speech_samples = 0;
        self.silence_counter = 0;
        self.peak_energy = 0.0;
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
