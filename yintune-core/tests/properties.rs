//! Property-based tests for note mapping, the estimator and the segmenter.

use proptest::prelude::*;
use yintune_core::tuning::{hz_to_midi, hz_to_note, midi_to_hz};
use yintune_core::{
    detect_pitch, segment_notes, NoteLabel, PitchClass, SegmentParams, TuningReference, YinParams,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every note center maps back to its own label with ~0 cents, for any
    /// reasonable A4 reference.
    #[test]
    fn note_center_round_trips(
        class in 0i64..12,
        octave in -1i32..9,
        a4 in 400.0f32..480.0f32,
    ) {
        let tuning = TuningReference::new(a4).unwrap();
        let note = NoteLabel::new(PitchClass::from_index(class), octave);
        let pitch = hz_to_note(note.frequency(tuning), tuning);
        prop_assert_eq!(pitch.label(), note);
        prop_assert!(pitch.cents.abs() < 0.01, "{} cents", pitch.cents);

        let reparsed: NoteLabel = note.to_string().parse().unwrap();
        prop_assert_eq!(reparsed, note);
    }

    /// Cents always lie in (-50, 50] and the label is the note they refer to.
    #[test]
    fn cents_stay_within_half_semitone(freq in 20.0f32..20000.0f32) {
        let tuning = TuningReference::default();
        let pitch = hz_to_note(freq, tuning);
        prop_assert!(pitch.cents > -50.0 && pitch.cents <= 50.0, "{} cents", pitch.cents);

        let rebuilt = pitch.label().midi() as f32 + pitch.cents / 100.0;
        prop_assert!((rebuilt - hz_to_midi(freq, tuning)).abs() < 1e-3);
    }

    /// MIDI conversion is invertible.
    #[test]
    fn midi_conversion_inverts(midi in 0.0f32..127.0f32) {
        let tuning = TuningReference::default();
        let back = hz_to_midi(midi_to_hz(midi, tuning), tuning);
        prop_assert!((back - midi).abs() < 1e-3, "{} -> {}", midi, back);
    }

    /// Arbitrary frames never produce out-of-range results.
    #[test]
    fn estimator_output_is_bounded(
        samples in prop::collection::vec(-1.0f32..=1.0f32, 0..1500),
        sample_rate in prop::sample::select(vec![8_000u32, 22_050, 44_100, 48_000]),
        f_min in 30.0f32..300.0f32,
        span in 10.0f32..3000.0f32,
        threshold in 0.01f32..0.99f32,
    ) {
        let params = YinParams { f_min, f_max: f_min + span, threshold };
        let result = detect_pitch(&samples, sample_rate, &params);
        prop_assert!(result.frequency.is_finite() && result.frequency >= 0.0);
        prop_assert!((0.0..=1.0).contains(&result.confidence));
        if samples.len() < 2 {
            prop_assert_eq!(result.frequency, 0.0);
        }
    }

    /// Segments come out in time order, never overlap and respect the
    /// minimum duration.
    #[test]
    fn segments_are_ordered_and_long_enough(
        frames in prop::collection::vec((0.0f32..1000.0f32, 0.0f32..=1.0f32), 1..200),
        min_seg_dur in 0.0f64..0.2,
    ) {
        let times: Vec<f64> = (0..frames.len()).map(|i| i as f64 * 0.01).collect();
        let freqs: Vec<f32> = frames.iter().map(|&(f, _)| if f < 50.0 { 0.0 } else { f }).collect();
        let confs: Vec<f32> = frames.iter().map(|&(_, c)| c).collect();
        let params = SegmentParams { min_seg_dur, ..SegmentParams::default() };

        let segments = segment_notes(&times, &freqs, &confs, TuningReference::default(), &params);
        for segment in &segments {
            prop_assert!(segment.end_s > segment.start_s);
            prop_assert!(segment.duration() >= min_seg_dur);
            prop_assert!(segment.median_cents > -50.0 && segment.median_cents <= 50.0);
            prop_assert!(segment.mean_confidence >= params.conf_threshold - 1e-6);
        }
        for pair in segments.windows(2) {
            prop_assert!(pair[0].end_s < pair[1].start_s);
        }
    }
}
