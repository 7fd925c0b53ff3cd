//! # Live Smoothing Module
//!
//! Turns the stream of per-block estimates into what a tuner display shows.
//!
//! ## Features
//! - Confidence gating: weak or missing estimates show "no pitch"
//! - Rolling median over the last accepted frequencies
//! - Note-change hysteresis measured past the semitone boundary

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::segment::median;
use crate::tuning::{cents_between, hz_to_note, NoteLabel, TuningReference};
use crate::PitchResult;

/// Cents between a note center and the boundary to its neighbour.
const HALF_SEMITONE_CENTS: f32 = 50.0;

/// Gating, median window and hysteresis for the live display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherParams {
    /// Frames below this confidence are shown as "no pitch".
    pub conf_threshold: f32,
    /// Number of accepted frequencies the median runs over (at least 1).
    pub median_window: usize,
    /// How far past a note boundary the median must move before the shown
    /// note changes, in cents.
    ///
    /// Measured from the boundary, not from the shown note's center: the
    /// switch needs `|cents from shown note| - 50 >= hysteresis_cents`. Any
    /// median whose nearest note differs from the shown one is already more
    /// than 50 cents from its center, so a center-based threshold below 50
    /// would never hold a note.
    pub hysteresis_cents: f32,
}

impl Default for SmootherParams {
    fn default() -> Self {
        Self {
            conf_threshold: 0.2,
            median_window: 5,
            hysteresis_cents: 10.0,
        }
    }
}

/// What the live display should show after one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LiveDisplayState {
    NoPitch,
    Pitch {
        /// Median of the recent accepted frequencies, in Hz.
        median_frequency: f32,
        /// The held note label.
        shown_note: NoteLabel,
        /// Deviation of the median from its nearest note, in cents.
        cents: f32,
        /// Confidence of the frame that produced this state.
        confidence: f32,
    },
}

/// Rolling-median smoothing with note-change hysteresis.
///
/// Keeps the last `median_window` accepted frequencies and the note that is
/// currently shown. Rejected frames leave both untouched.
///
/// # Example
/// ```
/// use yintune_core::{LiveDisplayState, LiveSmoother, PitchResult, SmootherParams, TuningReference};
/// let mut smoother = LiveSmoother::new(TuningReference::default(), SmootherParams::default());
/// let state = smoother.update(PitchResult { frequency: 440.0, confidence: 0.9 });
/// assert!(matches!(state, LiveDisplayState::Pitch { .. }));
/// ```
#[derive(Debug, Clone)]
pub struct LiveSmoother {
    tuning: TuningReference,
    params: SmootherParams,
    history: VecDeque<f32>,
    shown_note: Option<NoteLabel>,
}

impl LiveSmoother {
    pub fn new(tuning: TuningReference, params: SmootherParams) -> Self {
        let window = params.median_window.max(1);
        Self {
            tuning,
            params: SmootherParams {
                median_window: window,
                ..params
            },
            history: VecDeque::with_capacity(window),
            shown_note: None,
        }
    }

    /// The note currently held on the display, if any.
    pub fn shown_note(&self) -> Option<NoteLabel> {
        self.shown_note
    }

    /// Frequencies currently in the median window, oldest first.
    pub fn history(&self) -> impl Iterator<Item = f32> + '_ {
        self.history.iter().copied()
    }

    /// Forgets the history and the shown note.
    pub fn reset(&mut self) {
        self.history.clear();
        self.shown_note = None;
    }

    /// Feeds one estimate and returns the new display state.
    pub fn update(&mut self, result: PitchResult) -> LiveDisplayState {
        let accepted = result.is_detected() && result.confidence >= self.params.conf_threshold;
        if !accepted {
            return LiveDisplayState::NoPitch;
        }

        if self.history.len() == self.params.median_window {
            self.history.pop_front();
        }
        self.history.push_back(result.frequency);
        let median_frequency = median(self.history.iter().copied().collect());

        let pitch = hz_to_note(median_frequency, self.tuning);
        let candidate = pitch.label();

        let shown = match self.shown_note {
            Some(shown) if shown != candidate => {
                // Measured against the held note's center, not the candidate's.
                let offset = cents_between(median_frequency, shown.frequency(self.tuning));
                if offset.abs() - HALF_SEMITONE_CENTS >= self.params.hysteresis_cents {
                    log::debug!("note change {shown} -> {candidate} ({offset:+.1} cents)");
                    candidate
                } else {
                    shown
                }
            }
            Some(shown) => shown,
            None => candidate,
        };
        self.shown_note = Some(shown);

        LiveDisplayState::Pitch {
            median_frequency,
            shown_note: shown,
            cents: pitch.cents,
            confidence: result.confidence,
        }
    }
}
