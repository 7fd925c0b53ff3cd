//! # Musical Tuning Module
//!
//! This module provides the note calculations for the pitch tracker.
//! It converts between frequencies and equal-tempered note labels under an
//! explicit A4 tuning reference, and measures cent deviations.
//!
//! ## Features
//! - MIDI number conversions anchored on a configurable A4
//! - Frequency to (note, octave, cents) mapping
//! - Note name to frequency conversions
//! - Cent deviation calculations

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TuningError;

/// The twelve chromatic note names, starting at C.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// MIDI note number of A4.
const A4_MIDI: f32 = 69.0;

/// The A4 frequency every note conversion is anchored on.
///
/// Hold one value constant across an analysis or live session so that
/// note labels stay consistent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct TuningReference(f32);

impl TuningReference {
    /// Concert pitch, A4 = 440 Hz.
    pub const A440: TuningReference = TuningReference(440.0);

    pub fn new(a4_hz: f32) -> Result<Self, TuningError> {
        if a4_hz.is_finite() && a4_hz > 0.0 {
            Ok(Self(a4_hz))
        } else {
            Err(TuningError::InvalidReference(a4_hz))
        }
    }

    /// The A4 frequency in Hz.
    pub fn a4(self) -> f32 {
        self.0
    }
}

impl Default for TuningReference {
    fn default() -> Self {
        Self::A440
    }
}

impl TryFrom<f32> for TuningReference {
    type Error = TuningError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TuningReference> for f32 {
    fn from(value: TuningReference) -> Self {
        value.0
    }
}

/// One of the twelve equal-tempered pitch classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    #[serde(rename = "C#")]
    CSharp,
    D,
    #[serde(rename = "D#")]
    DSharp,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    #[serde(rename = "G#")]
    GSharp,
    A,
    #[serde(rename = "A#")]
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Position in the chromatic sequence, C = 0 .. B = 11.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Pitch class at `index mod 12`.
    pub fn from_index(index: i64) -> Self {
        Self::ALL[index.rem_euclid(12) as usize]
    }

    pub fn name(self) -> &'static str {
        NOTE_NAMES[self.index()]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PitchClass {
    type Err = TuningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NOTE_NAMES
            .iter()
            .position(|&name| name == s)
            .map(|i| Self::ALL[i])
            .ok_or_else(|| TuningError::InvalidNoteName(s.to_string()))
    }
}

/// A note without a tuning deviation, e.g. `A4` or `C#3`.
///
/// Serialized as its display string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NoteLabel {
    pub class: PitchClass,
    pub octave: i32,
}

impl NoteLabel {
    pub fn new(class: PitchClass, octave: i32) -> Self {
        Self { class, octave }
    }

    /// The MIDI note number of this label.
    pub fn midi(self) -> i64 {
        (i64::from(self.octave) + 1) * 12 + self.class.index() as i64
    }

    /// Center frequency of this note in Hz.
    pub fn frequency(self, tuning: TuningReference) -> f32 {
        midi_to_hz(self.midi() as f32, tuning)
    }
}

impl fmt::Display for NoteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.class, self.octave)
    }
}

impl FromStr for NoteLabel {
    type Err = TuningError;

    /// Parses labels such as `"A4"`, `"C#3"` or `"B-1"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| c == '-' || c.is_ascii_digit())
            .ok_or_else(|| TuningError::InvalidOctave(s.to_string()))?;
        let (name, octave) = s.split_at(split);
        let class = name.parse()?;
        let octave = octave
            .parse()
            .map_err(|_| TuningError::InvalidOctave(s.to_string()))?;
        Ok(Self { class, octave })
    }
}

impl From<NoteLabel> for String {
    fn from(label: NoteLabel) -> Self {
        label.to_string()
    }
}

impl TryFrom<String> for NoteLabel {
    type Error = TuningError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A note label together with its deviation in cents, in `(-50, 50]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PitchLabel {
    pub class: PitchClass,
    pub octave: i32,
    pub cents: f32,
}

impl PitchLabel {
    pub fn label(&self) -> NoteLabel {
        NoteLabel::new(self.class, self.octave)
    }
}

/// Converts a frequency to a fractional MIDI note number.
pub fn hz_to_midi(freq: f32, tuning: TuningReference) -> f32 {
    A4_MIDI + 12.0 * (freq / tuning.a4()).log2()
}

/// Converts a fractional MIDI note number to a frequency.
pub fn midi_to_hz(midi: f32, tuning: TuningReference) -> f32 {
    tuning.a4() * 2.0_f32.powf((midi - A4_MIDI) / 12.0)
}

/// Nearest integer MIDI note. Exact halves round down so that the
/// remaining deviation always lies in `(-0.5, 0.5]`.
fn nearest_midi(midi: f32) -> f32 {
    (midi - 0.5).ceil()
}

/// Rounds a fractional MIDI number to its note label.
pub fn midi_to_note(midi: f32) -> NoteLabel {
    let rounded = nearest_midi(midi) as i64;
    let octave = rounded.div_euclid(12) - 1;
    NoteLabel::new(PitchClass::from_index(rounded), octave as i32)
}

/// Maps a frequency to its nearest note and the deviation from it in cents.
///
/// # Arguments
/// * `freq` - Input frequency in Hz, must be positive
/// * `tuning` - A4 reference
///
/// # Returns
/// * `PitchLabel` - Nearest note, octave and cents in `(-50, 50]`
pub fn hz_to_note(freq: f32, tuning: TuningReference) -> PitchLabel {
    let midi = hz_to_midi(freq, tuning);
    let note = midi_to_note(midi);
    let cents = (midi - nearest_midi(midi)) * 100.0;
    PitchLabel {
        class: note.class,
        octave: note.octave,
        cents,
    }
}

/// Gets the center frequency of a named note.
///
/// # Arguments
/// * `name` - One of the chromatic names in [`NOTE_NAMES`] (e.g. "C#")
/// * `octave` - Scientific pitch octave (A4 is octave 4)
/// * `tuning` - A4 reference
///
/// # Errors
/// * `TuningError::InvalidNoteName` - `name` is not a chromatic note name
pub fn note_to_hz(name: &str, octave: i32, tuning: TuningReference) -> Result<f32, TuningError> {
    let class: PitchClass = name.parse()?;
    Ok(NoteLabel::new(class, octave).frequency(tuning))
}

/// Calculates the deviation of `freq` from `target_freq` in cents.
///
/// Positive values are sharp, negative values flat.
pub fn cents_between(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
