// yintune-core/src/lib.rs

//! The core logic for the yintune pitch tracker.
//! This crate is responsible for pitch estimation, note mapping,
//! note segmentation and live display smoothing. It is completely headless
//! and contains no terminal or GUI code.

use serde::Serialize;

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod fft;
pub mod live;
pub mod pitch;
pub mod segment;
pub mod smoothing;
pub mod tuning;

pub use analysis::{analyze_signal, AnalysisConfig, PitchTrack};
pub use error::{ConfigError, TuningError};
pub use live::{run_live, LiveTuner, LoopControl};
pub use pitch::{detect_pitch, detect_pitch_yin, YinEstimator, YinParams};
pub use segment::{segment_notes, NoteSegment, NoteSegmenter, SegmentParams};
pub use smoothing::{LiveDisplayState, LiveSmoother, SmootherParams};
pub use tuning::{NoteLabel, PitchClass, PitchLabel, TuningReference};

/// Represents the result of estimating the pitch of a single audio frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PitchResult {
    /// The detected fundamental frequency in Hz. `0.0` means undetected.
    pub frequency: f32,
    /// The confidence of the detected frequency (0.0 to 1.0).
    pub confidence: f32,
}

impl PitchResult {
    /// The result returned for degenerate input: no frequency, no confidence.
    pub const UNDETECTED: PitchResult = PitchResult {
        frequency: 0.0,
        confidence: 0.0,
    };

    /// True when a positive, finite frequency was found.
    pub fn is_detected(&self) -> bool {
        self.frequency.is_finite() && self.frequency > 0.0
    }
}

/// A fixed-length block of mono samples captured at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Estimates the pitch of this frame.
    pub fn estimate(&self, params: &YinParams) -> PitchResult {
        detect_pitch(&self.samples, self.sample_rate, params)
    }
}
