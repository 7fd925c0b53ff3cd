//! # Fast Fourier Transform (FFT) Module
//!
//! This module prepares analysis frames and computes the YIN difference
//! function through an FFT autocorrelation.
//!
//! ## Features
//! - DC offset removal
//! - Hann windowing for reduced spectral leakage
//! - O(N log N) difference function using RustFFT

use std::fmt;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Removes the DC offset from a signal by making its average value zero.
///
/// # Arguments
/// * `signal` - Audio signal to process (modified in-place)
pub fn remove_dc_offset(signal: &mut [f64]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f64>() / len as f64;
    for sample in signal.iter_mut() {
        *sample -= avg;
    }
}

/// Applies a Hann window of exactly `buffer.len()` points.
///
/// The window is symmetric, tapering to zero at both ends.
///
/// # Arguments
/// * `buffer` - Audio buffer to window (modified in-place)
pub fn apply_hann_window(buffer: &mut [f64]) {
    let n = buffer.len();
    if n < 2 {
        // A single-point Hann window is 1.0.
        return;
    }
    let n_minus_1 = (n - 1) as f64;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Converts a frame to `f64`, removes its mean and applies a Hann window.
pub fn prepare_frame(frame: &[f32]) -> Vec<f64> {
    let mut prepared: Vec<f64> = frame.iter().map(|&s| f64::from(s)).collect();
    remove_dc_offset(&mut prepared);
    apply_hann_window(&mut prepared);
    prepared
}

/// Forward/inverse plans for one FFT length.
#[derive(Clone)]
struct FftPlans {
    size: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

/// FFT-backed YIN difference function with cached plans and buffers.
///
/// Plans are rebuilt only when the padded FFT length changes, so a live
/// stream of equally sized blocks plans once.
#[derive(Clone, Default)]
pub struct DifferenceFunction {
    plans: Option<FftPlans>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    energy: Vec<f64>,
}

impl fmt::Debug for DifferenceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DifferenceFunction")
            .field("fft_size", &self.fft_size())
            .finish()
    }
}

impl DifferenceFunction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the currently planned FFT, if any.
    pub fn fft_size(&self) -> Option<usize> {
        self.plans.as_ref().map(|plans| plans.size)
    }

    fn plans_for(&mut self, size: usize) -> (Arc<dyn Fft<f64>>, Arc<dyn Fft<f64>>) {
        if let Some(plans) = self.plans.as_ref().filter(|plans| plans.size == size) {
            return (Arc::clone(&plans.forward), Arc::clone(&plans.inverse));
        }
        log::debug!("planning FFTs of length {size}");
        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        self.scratch.resize(scratch_len, Complex { re: 0.0, im: 0.0 });
        self.plans = Some(FftPlans {
            size,
            forward: Arc::clone(&forward),
            inverse: Arc::clone(&inverse),
        });
        (forward, inverse)
    }

    /// Computes `d[lag] = Σ (x[i] - x[i+lag])²` for `lag` in `0..=max_lag`.
    ///
    /// The sum is expanded as `E(head) + E(tail) - 2·r[lag]`, where `r` is the
    /// linear autocorrelation obtained from a zero-padded forward/inverse FFT
    /// and the energies come from a prefix sum of squares.
    ///
    /// # Arguments
    /// * `signal` - Prepared frame
    /// * `max_lag` - Largest lag to evaluate, clipped to `signal.len() - 1`
    ///
    /// # Returns
    /// * `Vec<f64>` - `max_lag + 1` values, `d[0] = 0`
    pub fn compute(&mut self, signal: &[f64], max_lag: usize) -> Vec<f64> {
        let n = signal.len();
        let max_lag = max_lag.min(n.saturating_sub(1));
        if n == 0 {
            return vec![0.0];
        }

        // Padding to n + max_lag keeps the circular correlation free of
        // wrap-around for every lag we read back.
        let fft_size = (n + max_lag).next_power_of_two();
        let (forward, inverse) = self.plans_for(fft_size);

        self.buffer.clear();
        self.buffer.extend(
            signal
                .iter()
                .map(|&sample| Complex { re: sample, im: 0.0 })
                .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }))
                .take(fft_size),
        );

        forward.process_with_scratch(&mut self.buffer, &mut self.scratch);
        for bin in self.buffer.iter_mut() {
            *bin = Complex {
                re: bin.norm_sqr(),
                im: 0.0,
            };
        }
        inverse.process_with_scratch(&mut self.buffer, &mut self.scratch);
        let scale = 1.0 / fft_size as f64;

        self.energy.clear();
        self.energy.push(0.0);
        let mut running = 0.0;
        for &sample in signal {
            running += sample * sample;
            self.energy.push(running);
        }
        let total = self.energy[n];

        let mut diff = vec![0.0; max_lag + 1];
        for lag in 1..=max_lag {
            let head = self.energy[n - lag];
            let tail = total - self.energy[lag];
            let autocorrelation = self.buffer[lag].re * scale;
            diff[lag] = (head + tail - 2.0 * autocorrelation).max(0.0);
        }
        diff
    }
}

/// One-shot [`DifferenceFunction::compute`] with freshly planned FFTs.
pub fn difference_function(signal: &[f64], max_lag: usize) -> Vec<f64> {
    DifferenceFunction::new().compute(signal, max_lag)
}

/// Direct O(N·max_lag) evaluation of the difference function.
///
/// Produces the same values as [`difference_function`] up to round-off.
pub fn difference_function_direct(signal: &[f64], max_lag: usize) -> Vec<f64> {
    let n = signal.len();
    let max_lag = max_lag.min(n.saturating_sub(1));
    let mut diff = vec![0.0; max_lag + 1];
    for lag in 1..=max_lag {
        diff[lag] = signal[..n - lag]
            .iter()
            .zip(&signal[lag..])
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sr: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sr).sin())
            .collect()
    }

    #[test]
    fn test_dc_offset_removed() {
        let mut signal = vec![1.0, 2.0, 3.0, 4.0];
        remove_dc_offset(&mut signal);
        assert!(signal.iter().sum::<f64>().abs() < 1e-12);
        assert_eq!(signal, vec![-1.5, -0.5, 0.5, 1.5]);
    }

    #[test]
    fn test_hann_window_shape() {
        let mut buffer = vec![1.0; 5];
        apply_hann_window(&mut buffer);
        let expected = [0.0, 0.5, 1.0, 0.5, 0.0];
        for (got, want) in buffer.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{got} != {want}");
        }
    }

    #[test]
    fn test_prepare_frame_handles_tiny_input() {
        assert!(prepare_frame(&[]).is_empty());
        assert_eq!(prepare_frame(&[3.0]), vec![0.0]);
    }

    #[test]
    fn test_fft_matches_direct_sum() {
        let mut signal = sine(440.0, 48_000.0, 1024);
        signal.iter_mut().enumerate().for_each(|(i, s)| *s += 0.01 * (i % 7) as f64);
        assert_close(&difference_function(&signal, 500), &difference_function_direct(&signal, 500));
    }

    #[test]
    fn test_difference_zero_at_period() {
        // 480 Hz at 48 kHz has an exact period of 100 samples.
        let signal = sine(480.0, 48_000.0, 2048);
        let diff = difference_function(&signal, 300);
        assert!(diff[100] < 1e-6);
        assert!(diff[50] > 1.0);
    }

    fn assert_close(fast: &[f64], direct: &[f64]) {
        assert_eq!(fast.len(), direct.len());
        for (lag, (a, b)) in fast.iter().zip(direct).enumerate() {
            assert!((a - b).abs() < 1e-8 * (1.0 + b.abs()), "lag {lag}: {a} != {b}");
        }
    }

    #[test]
    fn test_plans_are_reused_across_frames() {
        let mut difference = DifferenceFunction::new();
        assert_eq!(difference.fft_size(), None);

        let first = sine(440.0, 48_000.0, 1024);
        let second = sine(330.0, 48_000.0, 1024);
        assert_close(&difference.compute(&first, 500), &difference_function_direct(&first, 500));
        assert_eq!(difference.fft_size(), Some(2048));

        // Same length: cached plans, no state carried over from the last frame.
        assert_close(&difference.compute(&second, 500), &difference_function_direct(&second, 500));
        assert_eq!(difference.fft_size(), Some(2048));

        let longer = sine(440.0, 48_000.0, 4096);
        assert_close(&difference.compute(&longer, 900), &difference_function_direct(&longer, 900));
        assert_eq!(difference.fft_size(), Some(8192));
    }

    #[test]
    fn test_max_lag_is_clipped_to_signal() {
        let diff = difference_function(&[1.0, -1.0, 1.0], 10);
        assert_eq!(diff.len(), 3);
    }
}
