//! # Fast Fourier Transform (FFT) Module
//!
//! Frequency-domain helpers for the pitch estimator. The autocorrelation is
//! computed through RustFFT (power spectrum, then inverse transform), which
//! keeps per-frame cost at O(n log n) for one-second captures.

use rustfft::{FftPlanner, num_complex::Complex};

/// Removes the DC offset from a signal by making its average value zero.
pub fn remove_dc_offset(signal: &mut [f64]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f64>() / len as f64;
    if avg.abs() > 1e-9 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Raw autocorrelation `r(τ) = Σ x[i]·x[i+τ]` for `τ` in `0..=max_lag`.
///
/// The signal is zero-padded to at least twice its length so the circular
/// correlation of the FFT matches the linear one.
pub fn autocorrelation(signal: &[f64], max_lag: usize) -> Vec<f64> {
    let n = signal.len();
    let mut result = vec![0.0; max_lag + 1];
    if n == 0 {
        return result;
    }

    let fft_len = (n * 2).next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(fft_len);
    let ifft = planner.plan_fft_inverse(fft_len);

    let mut buffer = vec![Complex { re: 0.0, im: 0.0 }; fft_len];
    for (slot, &sample) in buffer.iter_mut().zip(signal) {
        slot.re = sample;
    }

    fft.process(&mut buffer);
    for value in buffer.iter_mut() {
        *value = Complex {
            re: value.norm_sqr(),
            im: 0.0,
        };
    }
    ifft.process(&mut buffer);

    let scale = 1.0 / fft_len as f64;
    for (lag, slot) in result.iter_mut().enumerate().take(n) {
        *slot = buffer[lag].re * scale;
    }
    result
}

/// Autocorrelation normalized per lag into [-1, 1].
///
/// Each lag is divided by the geometric mean of the energies of the two
/// overlapping segments, so a perfectly periodic signal scores 1.0 at its
/// period regardless of how much of the window overlaps.
pub fn normalized_autocorrelation(signal: &[f64], max_lag: usize) -> Vec<f64> {
    let n = signal.len();
    let raw = autocorrelation(signal, max_lag);

    let mut prefix_sq = vec![0.0; n + 1];
    for (idx, &sample) in signal.iter().enumerate() {
        prefix_sq[idx + 1] = prefix_sq[idx] + sample * sample;
    }

    raw.iter()
        .enumerate()
        .map(|(lag, &r)| {
            if lag >= n {
                return 0.0;
            }
            let head = prefix_sq[n - lag];
            let tail = prefix_sq[n] - prefix_sq[lag];
            let denom = (head * tail).sqrt();
            if denom > 1e-12 { r / denom } else { 0.0 }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(signal: &[f64], lag: usize) -> f64 {
        signal.iter().zip(&signal[lag..]).map(|(a, b)| a * b).sum()
    }

    #[test]
    fn matches_direct_sum() {
        let signal: Vec<f64> = (0..300).map(|i| ((i * 7 % 13) as f64 - 6.0) / 6.0).collect();
        let fast = autocorrelation(&signal, 40);
        for lag in [0, 1, 5, 17, 40] {
            assert!((fast[lag] - direct(&signal, lag)).abs() < 1e-9, "lag {}", lag);
        }
    }

    #[test]
    fn lags_past_the_signal_are_zero() {
        let fast = autocorrelation(&[1.0, 2.0, 3.0], 6);
        assert_eq!(fast.len(), 7);
        assert!(fast[3..].iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn zero_lag_normalizes_to_one() {
        let signal: Vec<f64> = (0..128).map(|i| (i as f64 * 0.3).sin()).collect();
        let norm = normalized_autocorrelation(&signal, 10);
        assert!((norm[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn removes_offset() {
        let mut signal = vec![1.5, 2.5, 0.5, 3.5];
        remove_dc_offset(&mut signal);
        assert!(signal.iter().sum::<f64>().abs() < 1e-12);
    }
}
