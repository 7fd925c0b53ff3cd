//! # Configuration Module
//!
//! `TunerConfig` gathers every estimator, segmenter, smoother and capture
//! parameter in one TOML-serializable struct with defaults, and hands out the
//! typed parameter structs each module takes.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisConfig;
use crate::audio::CaptureConfig;
use crate::error::ConfigError;
use crate::pitch::YinParams;
use crate::segment::SegmentParams;
use crate::smoothing::SmootherParams;
use crate::tuning::TuningReference;

/// Every tunable parameter of the pitch tracker.
///
/// Serializable in TOML. Each field has a sane default, so a config file
/// only needs the values it changes.
///
/// # Example
/// ```
/// use yintune_core::config::TunerConfig;
/// let config = TunerConfig::from_toml_str("a4 = 442.0").unwrap();
/// assert_eq!(config.a4, 442.0);
/// assert_eq!(config.frame_size, 2048);
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TunerConfig {
    // === Framing ===
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per analysis frame (live block size).
    pub frame_size: usize,
    /// Samples between offline frame starts.
    pub hop_size: usize,

    // === Estimator ===
    /// Lowest detectable frequency in Hz.
    pub f_min: f32,
    /// Highest detectable frequency in Hz.
    pub f_max: f32,
    /// YIN absolute threshold, in (0, 1).
    pub threshold: f32,

    // === Tuning ===
    /// A4 reference in Hz.
    pub a4: f32,

    // === Segmentation ===
    /// Shortest note segment kept, in seconds.
    pub min_seg_dur: f64,
    /// Longest bridged gap inside a segment, in seconds.
    pub gap: f64,
    /// Confidence below which a frame is ignored.
    pub conf_threshold: f32,

    // === Live display ===
    /// Rolling median window, in frames.
    pub median_window: usize,
    /// Note change hysteresis, in cents past the boundary.
    pub hysteresis_cents: f32,
}

impl Default for TunerConfig {
    fn default() -> Self {
        let yin = YinParams::default();
        let segment = SegmentParams::default();
        let smoother = SmootherParams::default();
        Self {
            sample_rate: 48_000,
            frame_size: 2048,
            hop_size: 1024,
            f_min: yin.f_min,
            f_max: yin.f_max,
            threshold: yin.threshold,
            a4: TuningReference::default().a4(),
            min_seg_dur: segment.min_seg_dur,
            gap: segment.gap,
            conf_threshold: segment.conf_threshold,
            median_window: smoother.median_window,
            hysteresis_cents: smoother.hysteresis_cents,
        }
    }
}

impl TunerConfig {
    /// Parses a TOML document; missing keys take their defaults.
    ///
    /// # Errors
    /// Returns an error if the TOML is malformed or a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("invalid tuner config")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML config file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let config = Self::from_toml_str(&text)
            .with_context(|| format!("in config {}", path.display()))?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Serializes the config as TOML.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("cannot serialize tuner config")
    }

    /// Checks every value against the estimator and segmenter preconditions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        for (name, value) in [
            ("frame_size", self.frame_size),
            ("hop_size", self.hop_size),
            ("median_window", self.median_window),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroSize { name });
            }
        }
        let bounds_valid = self.f_min.is_finite()
            && self.f_max.is_finite()
            && self.f_min > 0.0
            && self.f_min < self.f_max;
        if !bounds_valid {
            return Err(ConfigError::FrequencyBounds {
                f_min: self.f_min,
                f_max: self.f_max,
            });
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(ConfigError::Threshold(self.threshold));
        }
        if !(0.0..=1.0).contains(&self.conf_threshold) {
            return Err(ConfigError::ConfidenceThreshold(self.conf_threshold));
        }
        for (name, value) in [
            ("min_seg_dur", self.min_seg_dur),
            ("gap", self.gap),
            ("hysteresis_cents", f64::from(self.hysteresis_cents)),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Negative { name, value });
            }
        }
        TuningReference::new(self.a4)?;
        Ok(())
    }

    /// The tuning reference. Falls back to A440 if `a4` is invalid.
    pub fn tuning(&self) -> TuningReference {
        TuningReference::new(self.a4).unwrap_or_default()
    }

    pub fn yin_params(&self) -> YinParams {
        YinParams {
            f_min: self.f_min,
            f_max: self.f_max,
            threshold: self.threshold,
        }
    }

    pub fn segment_params(&self) -> SegmentParams {
        SegmentParams {
            min_seg_dur: self.min_seg_dur,
            gap: self.gap,
            conf_threshold: self.conf_threshold,
        }
    }

    pub fn smoother_params(&self) -> SmootherParams {
        SmootherParams {
            conf_threshold: self.conf_threshold,
            median_window: self.median_window,
            hysteresis_cents: self.hysteresis_cents,
        }
    }

    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            frame_size: self.frame_size,
            hop_size: self.hop_size,
            yin: self.yin_params(),
        }
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            device: None,
            sample_rate: self.sample_rate,
            block_size: self.frame_size,
        }
    }
}
