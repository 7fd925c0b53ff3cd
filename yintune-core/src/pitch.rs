//! # Pitch Detection Module
//!
//! This module implements the YIN fundamental frequency estimator.
//! It works on a single mono frame and reports a frequency together with a
//! confidence derived from the cumulative mean normalized difference (CMND).
//!
//! ## Features
//! - Absolute-threshold YIN with a global-minimum fallback
//! - Parabolic interpolation for sub-sample accuracy
//! - Never fails: malformed input yields [`PitchResult::UNDETECTED`]

use serde::{Deserialize, Serialize};

use crate::fft::{prepare_frame, remove_dc_offset, DifferenceFunction};
use crate::{AudioFrame, PitchResult};

/// Guards the CMND denominator against a silent frame.
const CMND_EPSILON: f64 = 1e-12;

/// Smallest parabola curvature accepted for interpolation.
const PARABOLA_EPSILON: f64 = 1e-12;

/// CMND value mapped to zero confidence.
const CONFIDENCE_CEILING: f64 = 0.5;

/// Search range and threshold for the YIN estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YinParams {
    /// Lowest detectable frequency in Hz.
    pub f_min: f32,
    /// Highest detectable frequency in Hz.
    pub f_max: f32,
    /// Absolute CMND threshold, in (0, 1).
    pub threshold: f32,
}

impl Default for YinParams {
    fn default() -> Self {
        Self {
            f_min: 50.0,
            f_max: 2000.0,
            threshold: 0.1,
        }
    }
}

/// Averages interleaved multi-channel samples down to mono.
///
/// # Arguments
/// * `interleaved` - Samples ordered frame by frame
/// * `channels` - Number of channels per frame; 0 and 1 return a copy
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
        .collect()
}

/// A YIN estimator that keeps its FFT plans between frames.
///
/// Use one per stream (or per worker thread) when estimating many frames of
/// the same size; [`detect_pitch`] plans from scratch on every call.
#[derive(Debug, Clone, Default)]
pub struct YinEstimator {
    params: YinParams,
    difference: DifferenceFunction,
}

impl YinEstimator {
    pub fn new(params: YinParams) -> Self {
        Self {
            params,
            difference: DifferenceFunction::new(),
        }
    }

    pub fn params(&self) -> &YinParams {
        &self.params
    }

    /// Detects the pitch of one analysis frame.
    ///
    /// 1. Removes the DC offset
    /// 2. Applies a Hann window of the frame's length
    /// 3. Runs YIN over the prepared frame
    ///
    /// # Arguments
    /// * `frame` - Mono samples
    /// * `sample_rate` - Sample rate in Hz
    pub fn estimate(&mut self, frame: &[f32], sample_rate: u32) -> PitchResult {
        let prepared = prepare_frame(frame);
        let params = self.params;
        yin(
            &prepared,
            sample_rate,
            params.f_min,
            params.f_max,
            params.threshold,
            &mut self.difference,
        )
    }

    /// Detects the pitch of a captured frame at its own sample rate.
    pub fn estimate_frame(&mut self, frame: &AudioFrame) -> PitchResult {
        self.estimate(frame.samples(), frame.sample_rate())
    }
}

/// Detects the pitch of one analysis frame.
///
/// This is the one-shot entry point: de-mean, Hann window, then YIN. See
/// [`YinEstimator::estimate`] for repeated calls.
///
/// # Arguments
/// * `frame` - Mono samples
/// * `sample_rate` - Sample rate in Hz
/// * `params` - Search range and threshold
pub fn detect_pitch(frame: &[f32], sample_rate: u32, params: &YinParams) -> PitchResult {
    YinEstimator::new(*params).estimate(frame, sample_rate)
}

/// Runs YIN on a frame without windowing it.
///
/// The frame is still de-meaned. Use [`detect_pitch`] for raw audio.
///
/// # Returns
/// * `PitchResult` - `UNDETECTED` when the frame is shorter than 2 samples,
///   the sample rate is 0, the bounds are invalid or the lag range is empty
pub fn detect_pitch_yin(
    signal: &[f32],
    sample_rate: u32,
    f_min: f32,
    f_max: f32,
    threshold: f32,
) -> PitchResult {
    let mut x: Vec<f64> = signal.iter().map(|&s| f64::from(s)).collect();
    remove_dc_offset(&mut x);
    yin(
        &x,
        sample_rate,
        f_min,
        f_max,
        threshold,
        &mut DifferenceFunction::new(),
    )
}

fn yin(
    x: &[f64],
    sample_rate: u32,
    f_min: f32,
    f_max: f32,
    threshold: f32,
    difference: &mut DifferenceFunction,
) -> PitchResult {
    let frame_size = x.len();
    let bounds_valid = f_min.is_finite() && f_max.is_finite() && f_min > 0.0 && f_min < f_max;
    if frame_size < 2 || sample_rate == 0 || !bounds_valid || !threshold.is_finite() {
        return PitchResult::UNDETECTED;
    }
    if x.iter().any(|s| !s.is_finite()) {
        return PitchResult::UNDETECTED;
    }
    // A constant frame has an all-zero CMND, which would read as a perfect match.
    if x.iter().all(|&s| s == 0.0) {
        return PitchResult::UNDETECTED;
    }

    let sr = f64::from(sample_rate);
    let max_lag = ((sr / f64::from(f_min)).floor() as usize).min(frame_size - 2);
    let min_lag = ((sr / f64::from(f_max)).floor() as usize).max(2);
    if max_lag < min_lag {
        return PitchResult::UNDETECTED;
    }

    // --- Step 1: Difference function ---
    let diff = difference.compute(x, max_lag);

    // --- Step 2: Cumulative mean normalized difference ---
    let mut cmnd = vec![1.0; max_lag + 1];
    let mut running_sum = 0.0;
    for lag in 1..=max_lag {
        running_sum += diff[lag];
        cmnd[lag] = diff[lag] * lag as f64 / (running_sum + CMND_EPSILON);
    }

    // --- Step 3: Absolute threshold, first dip wins ---
    let threshold = f64::from(threshold);
    let crossing = (min_lag..max_lag).find(|&lag| cmnd[lag] < threshold);

    let best_lag = match crossing {
        Some(lag) => refine_lag(&cmnd, lag, max_lag),
        // --- Step 4: Nothing crossed, take the global minimum ---
        None => match global_minimum(&cmnd, min_lag, max_lag) {
            Some(lag) => lag as f64,
            None => return PitchResult::UNDETECTED,
        },
    };

    let frequency = sr / best_lag;
    let score_index = (best_lag.round() as usize).min(max_lag);
    let confidence = ((CONFIDENCE_CEILING - cmnd[score_index]) / CONFIDENCE_CEILING).clamp(0.0, 1.0);

    log::trace!("yin: lag={best_lag:.3} f0={frequency:.2} conf={confidence:.3}");

    PitchResult {
        frequency: frequency as f32,
        confidence: confidence as f32,
    }
}

/// Parabolic interpolation around an interior lag.
///
/// Falls back to the integer lag when the lag sits on the edge, the
/// parabola is flat, or the vertex would not be a usable period.
fn refine_lag(cmnd: &[f64], lag: usize, max_lag: usize) -> f64 {
    if lag < 1 || lag >= max_lag {
        return lag as f64;
    }
    let a = cmnd[lag - 1];
    let b = cmnd[lag];
    let c = cmnd[lag + 1];
    let denominator = 2.0 * (2.0 * b - a - c);
    if denominator.abs() <= PARABOLA_EPSILON {
        return lag as f64;
    }
    let refined = lag as f64 + (c - a) / denominator;
    if refined.is_finite() && refined >= 1.0 {
        refined
    } else {
        lag as f64
    }
}

/// First index of the smallest CMND value in `[min_lag, max_lag)`.
fn global_minimum(cmnd: &[f64], min_lag: usize, max_lag: usize) -> Option<usize> {
    let mut best: Option<usize> = None;
    for lag in min_lag..max_lag {
        match best {
            Some(current) if cmnd[lag] >= cmnd[current] => {}
            _ => best = Some(lag),
        }
    }
    best
}
