//! # Note Segmentation Module
//!
//! Groups a framewise pitch track into note segments. A segment is a run of
//! valid frames that all resolve to the same note label; it ends on a note
//! change, on a run of invalid frames longer than the allowed gap, or at the
//! end of the track.

use serde::{Deserialize, Serialize};

use crate::tuning::{hz_to_note, NoteLabel, TuningReference};

/// Thresholds controlling how frames are grouped into segments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentParams {
    /// Shortest segment kept, in seconds.
    pub min_seg_dur: f64,
    /// Longest run of invalid frames bridged inside a segment, in seconds.
    pub gap: f64,
    /// Frames below this confidence are ignored.
    pub conf_threshold: f32,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            min_seg_dur: 0.05,
            gap: 0.03,
            conf_threshold: 0.2,
        }
    }
}

/// A closed run of frames resolving to one note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteSegment {
    pub start_s: f64,
    pub end_s: f64,
    pub note: NoteLabel,
    pub median_cents: f32,
    pub mean_confidence: f32,
}

impl NoteSegment {
    pub fn duration(&self) -> f64 {
        self.end_s - self.start_s
    }
}

/// The segment currently being accumulated.
#[derive(Debug)]
struct OpenSegment {
    note: NoteLabel,
    start: f64,
    last_valid: f64,
    cents: Vec<f32>,
    confidences: Vec<f32>,
}

impl OpenSegment {
    fn new(note: NoteLabel, time: f64, cents: f32, confidence: f32) -> Self {
        Self {
            note,
            start: time,
            last_valid: time,
            cents: vec![cents],
            confidences: vec![confidence],
        }
    }

    fn push(&mut self, time: f64, cents: f32, confidence: f32) {
        self.last_valid = time;
        self.cents.push(cents);
        self.confidences.push(confidence);
    }

    /// Turns the run into a segment if it is long enough.
    fn close(self, min_seg_dur: f64) -> Option<NoteSegment> {
        let end = self.last_valid;
        let duration = end - self.start;
        if duration < min_seg_dur || end <= self.start || self.cents.is_empty() {
            log::trace!(
                "dropping {} segment at {:.3}s ({:.3}s)",
                self.note,
                self.start,
                duration
            );
            return None;
        }
        let mean_confidence =
            self.confidences.iter().sum::<f32>() / self.confidences.len() as f32;
        Some(NoteSegment {
            start_s: self.start,
            end_s: end,
            note: self.note,
            median_cents: median(self.cents),
            mean_confidence,
        })
    }
}

/// Incremental note segmenter.
///
/// Frames must be pushed in strictly ascending time order.
#[derive(Debug)]
pub struct NoteSegmenter {
    tuning: TuningReference,
    params: SegmentParams,
    current: Option<OpenSegment>,
    last_time: Option<f64>,
    segments: Vec<NoteSegment>,
}

impl NoteSegmenter {
    pub fn new(tuning: TuningReference, params: SegmentParams) -> Self {
        Self {
            tuning,
            params,
            current: None,
            last_time: None,
            segments: Vec::new(),
        }
    }

    /// Feeds one frame to the state machine.
    ///
    /// # Panics
    /// * If `time` is not strictly greater than the previous frame's time
    pub fn push(&mut self, time: f64, frequency: f32, confidence: f32) {
        if let Some(last) = self.last_time {
            assert!(
                time > last,
                "frame times must be strictly ascending ({time} after {last})"
            );
        }
        self.last_time = Some(time);

        let valid = frequency > 0.0 && confidence >= self.params.conf_threshold;
        if !valid {
            let gap_exceeded = self
                .current
                .as_ref()
                .is_some_and(|open| time - open.last_valid > self.params.gap);
            if gap_exceeded {
                self.close_current();
            }
            return;
        }

        let pitch = hz_to_note(frequency, self.tuning);
        let note = pitch.label();
        match self.current.as_mut() {
            Some(open) if open.note == note => open.push(time, pitch.cents, confidence),
            _ => {
                self.close_current();
                self.current = Some(OpenSegment::new(note, time, pitch.cents, confidence));
            }
        }
    }

    /// Segments closed so far.
    pub fn segments(&self) -> &[NoteSegment] {
        &self.segments
    }

    /// Closes any open segment and returns every segment in time order.
    pub fn finish(mut self) -> Vec<NoteSegment> {
        self.close_current();
        self.segments
    }

    fn close_current(&mut self) {
        if let Some(open) = self.current.take() {
            if let Some(segment) = open.close(self.params.min_seg_dur) {
                self.segments.push(segment);
            }
        }
    }
}

/// Groups a framewise pitch track into note segments.
///
/// # Arguments
/// * `times` - Frame times in seconds, strictly ascending
/// * `freqs` - Frame frequencies in Hz (0 = undetected)
/// * `confs` - Frame confidences
/// * `tuning` - A4 reference used to label notes
/// * `params` - Duration, gap and confidence thresholds
///
/// # Panics
/// * If the slices differ in length or `times` is not strictly ascending
pub fn segment_notes(
    times: &[f64],
    freqs: &[f32],
    confs: &[f32],
    tuning: TuningReference,
    params: &SegmentParams,
) -> Vec<NoteSegment> {
    assert!(
        times.len() == freqs.len() && times.len() == confs.len(),
        "times, freqs and confs must have the same length"
    );
    let mut segmenter = NoteSegmenter::new(tuning, *params);
    for ((&time, &frequency), &confidence) in times.iter().zip(freqs).zip(confs) {
        segmenter.push(time, frequency, confidence);
    }
    segmenter.finish()
}

/// Median of a non-empty set; the mean of the two middle values for even sizes.
pub(crate) fn median(mut values: Vec<f32>) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
