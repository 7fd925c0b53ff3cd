//! # Offline Analysis Module
//!
//! Cuts a fully loaded mono waveform into overlapping frames, estimates the
//! pitch of every frame in parallel, and hands the resulting track to the
//! note segmenter.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::pitch::{YinEstimator, YinParams};
use crate::segment::{segment_notes, NoteSegment, SegmentParams};
use crate::tuning::{hz_to_note, NoteLabel, TuningReference};
use crate::PitchResult;

/// Framing and estimator settings for offline analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Samples per frame.
    pub frame_size: usize,
    /// Samples between frame starts.
    pub hop_size: usize,
    pub yin: YinParams,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 1024,
            yin: YinParams::default(),
        }
    }
}

/// Framewise pitch estimates of a whole signal, in frame order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PitchTrack {
    /// Frame start times in seconds.
    pub times: Vec<f64>,
    pub frequencies: Vec<f32>,
    pub confidences: Vec<f32>,
}

/// One row of a pitch track, with its note when a frequency was found.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackFrame {
    pub time_s: f64,
    pub frequency_hz: f32,
    pub note: Option<NoteLabel>,
    pub cents: f32,
    pub confidence: f32,
}

impl PitchTrack {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Per-frame rows labelled under `tuning`. Undetected frames (zero or
    /// non-finite frequency) carry no note and zero cents.
    pub fn frames(&self, tuning: TuningReference) -> impl Iterator<Item = TrackFrame> + '_ {
        self.times
            .iter()
            .zip(&self.frequencies)
            .zip(&self.confidences)
            .map(move |((&time_s, &frequency_hz), &confidence)| {
                let result = PitchResult {
                    frequency: frequency_hz,
                    confidence,
                };
                let (note, cents) = if result.is_detected() {
                    let pitch = hz_to_note(frequency_hz, tuning);
                    (Some(pitch.label()), pitch.cents)
                } else {
                    (None, 0.0)
                };
                TrackFrame {
                    time_s,
                    frequency_hz,
                    note,
                    cents,
                    confidence,
                }
            })
    }

    /// Groups the track into note segments.
    pub fn segments(&self, tuning: TuningReference, params: &SegmentParams) -> Vec<NoteSegment> {
        segment_notes(
            &self.times,
            &self.frequencies,
            &self.confidences,
            tuning,
            params,
        )
    }
}

/// Start offsets of every complete frame.
///
/// Frames start at `0, hop, 2·hop, …` while `start < len - frame_size`, so a
/// signal of exactly one frame yields no frames.
pub fn frame_starts(len: usize, frame_size: usize, hop_size: usize) -> Vec<usize> {
    if frame_size == 0 || hop_size == 0 || len <= frame_size {
        return Vec::new();
    }
    (0..len - frame_size).step_by(hop_size).collect()
}

/// Estimates the pitch of every frame of a mono signal.
///
/// # Arguments
/// * `samples` - The whole mono waveform
/// * `sample_rate` - Sample rate in Hz
/// * `config` - Frame size, hop size and estimator settings
///
/// # Returns
/// * `PitchTrack` - One entry per frame, time = frame start / sample rate
pub fn analyze_signal(samples: &[f32], sample_rate: u32, config: &AnalysisConfig) -> PitchTrack {
    let starts = frame_starts(samples.len(), config.frame_size, config.hop_size);
    if sample_rate == 0 || starts.is_empty() {
        return PitchTrack::default();
    }
    log::debug!(
        "analyzing {} frames of {} samples (hop {}) at {} Hz",
        starts.len(),
        config.frame_size,
        config.hop_size,
        sample_rate
    );

    // One estimator per worker keeps FFT planning out of the per-frame path.
    let results: Vec<_> = starts
        .par_iter()
        .map_init(
            || YinEstimator::new(config.yin),
            |estimator, &start| {
                let frame = &samples[start..start + config.frame_size];
                estimator.estimate(frame, sample_rate)
            },
        )
        .collect();

    let sr = f64::from(sample_rate);
    PitchTrack {
        times: starts.iter().map(|&start| start as f64 / sr).collect(),
        frequencies: results.iter().map(|r| r.frequency).collect(),
        confidences: results.iter().map(|r| r.confidence).collect(),
    }
}
