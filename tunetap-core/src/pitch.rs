//! # Pitch Detection Module
//!
//! Time-domain autocorrelation pitch estimation for a single plucked or
//! bowed note.
//!
//! ## Steps
//! 1. DC removal and an RMS noise gate
//! 2. Trimming to the region where the signal is above a fraction of its peak
//! 3. Normalized autocorrelation (FFT-backed, see [`crate::fft`])
//! 4. First strong peak after the zero-lag decay
//! 5. Parabolic interpolation for sub-sample lag accuracy
//! 6. Conversion to Hz and a band check
//!
//! Peak picking is a heuristic. On strongly harmonic tones it can still lock
//! onto an overtone or sub-octave; the confidence threshold only reduces this.

use crate::config::TunerConfig;
use crate::fft::{normalized_autocorrelation, remove_dc_offset};

/// Autocorrelation pitch estimator for a fixed band and sample rate.
#[derive(Debug, Clone)]
pub struct PitchEstimator {
    sample_rate: u32,
    min_freq: f32,
    max_freq: f32,
    rms_threshold: f32,
    trim_fraction: f32,
    confidence_threshold: f32,
    window: usize,
}

impl PitchEstimator {
    /// Creates an estimator with the default band and thresholds.
    pub fn new(sample_rate: u32) -> Self {
        let config = TunerConfig {
            sample_rate,
            ..TunerConfig::default()
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &TunerConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            min_freq: config.min_freq,
            max_freq: config.max_freq,
            rms_threshold: config.rms_threshold,
            trim_fraction: config.trim_fraction,
            confidence_threshold: config.confidence_threshold,
            window: config.analysis_window,
        }
    }

    /// Shortest lag worth considering, implied by the highest frequency.
    pub fn min_lag(&self) -> usize {
        ((self.sample_rate as f32 / self.max_freq).floor() as usize).max(2)
    }

    /// Longest lag worth considering, implied by the lowest frequency.
    pub fn max_lag(&self) -> usize {
        (self.sample_rate as f32 / self.min_freq).ceil() as usize
    }

    /// Band check with both edges excluded.
    fn in_band(&self, frequency: f32) -> bool {
        frequency.is_finite() && frequency > self.min_freq && frequency < self.max_freq
    }

    /// Estimates the fundamental frequency of `signal` in Hz.
    ///
    /// Only the trailing analysis window of a longer buffer is examined.
    ///
    /// # Returns
    /// * `Some(frequency)` - Confident estimate inside the accepted band
    /// * `None` - Silence, no clear periodicity, or a frequency out of band
    pub fn estimate(&self, signal: &[f32]) -> Option<f32> {
        let signal = &signal[signal.len().saturating_sub(self.window)..];
        let mut samples: Vec<f64> = signal.iter().map(|&s| s as f64).collect();
        remove_dc_offset(&mut samples);

        let rms = root_mean_square(&samples);
        if rms < self.rms_threshold as f64 {
            log::debug!(target: "analysis", "Below noise floor (rms {:.4})", rms);
            return None;
        }

        let (start, end) = active_region(&samples, self.trim_fraction as f64)?;
        let region = &samples[start..end];
        let max_lag = self.max_lag();
        if region.len() < 2 * max_lag {
            log::debug!(
                target: "analysis",
                "Active region of {} samples is shorter than two periods at {} Hz",
                region.len(),
                self.min_freq
            );
            return None;
        }

        let acf = normalized_autocorrelation(region, max_lag + 1);
        let Some(peak) = first_strong_peak(&acf, max_lag, self.confidence_threshold as f64)
        else {
            log::debug!(target: "analysis", "No correlation peak above confidence");
            return None;
        };

        if peak + 1 < self.min_lag() {
            log::debug!(target: "analysis", "Period of {} samples is above the band", peak);
            return None;
        }

        let lag = parabolic_interpolation(&acf, peak);
        let frequency = (self.sample_rate as f64 / lag) as f32;
        if self.in_band(frequency) {
            Some(frequency)
        } else {
            log::debug!(target: "analysis", "Estimate {:.2} Hz outside band", frequency);
            None
        }
    }
}

/// Estimates pitch with default thresholds.
pub fn detect_pitch(signal: &[f32], sample_rate: u32) -> Option<f32> {
    PitchEstimator::new(sample_rate).estimate(signal)
}

fn root_mean_square(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64).sqrt()
}

/// Bounds `[start, end)` of the samples louder than `fraction` of the peak.
fn active_region(samples: &[f64], fraction: f64) -> Option<(usize, usize)> {
    let peak = samples.iter().fold(0.0_f64, |acc, s| acc.max(s.abs()));
    if peak <= 0.0 {
        return None;
    }
    let threshold = peak * fraction;
    let start = samples.iter().position(|s| s.abs() > threshold)?;
    let end = samples.iter().rposition(|s| s.abs() > threshold)? + 1;
    Some((start, end))
}

/// Lag of the first local maximum at or above `threshold` once the
/// correlation has stopped falling away from zero lag.
///
/// `acf` must hold at least `max_lag + 2` values.
fn first_strong_peak(acf: &[f64], max_lag: usize, threshold: f64) -> Option<usize> {
    let mut lag = 1;
    while lag <= max_lag && acf[lag] > acf[lag + 1] {
        lag += 1;
    }

    (lag..=max_lag).find(|&tau| {
        acf[tau] >= threshold && acf[tau] >= acf[tau - 1] && acf[tau] > acf[tau + 1]
    })
}

/// Refines an extremum at `tau` to sub-sample precision by fitting a
/// parabola through it and its two neighbours.
pub fn parabolic_interpolation(values: &[f64], tau: usize) -> f64 {
    if tau == 0 || tau + 1 >= values.len() {
        return tau as f64;
    }
    let y1 = values[tau - 1];
    let y2 = values[tau];
    let y3 = values[tau + 1];
    let denom = y1 - 2.0 * y2 + y3;
    if denom.abs() < 1e-12 {
        return tau as f64;
    }
    tau as f64 + 0.5 * (y1 - y3) / denom
}
