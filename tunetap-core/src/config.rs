//! # Settings Module
//!
//! Tunable constants for the pitch pipeline and the tempo tools, with
//! JSON load/save so a front end can persist user adjustments.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

/// Parameters for capture, decoding, pitch estimation and display smoothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Sample rate of the captured PCM in Hz.
    pub sample_rate: u32,
    /// Length of the opaque container header in bytes.
    pub header_len: usize,
    /// Segments with fewer decoded samples than this are skipped.
    pub min_samples: usize,
    /// Silence gate: at least one sample must exceed this magnitude.
    pub silence_threshold: f32,
    /// RMS noise floor below which the estimator reports no pitch.
    pub rms_threshold: f32,
    /// Fraction of peak amplitude used to trim quiet edges.
    pub trim_fraction: f32,
    /// Minimum normalized autocorrelation for a peak to count.
    pub confidence_threshold: f32,
    /// Lowest accepted fundamental in Hz.
    pub min_freq: f32,
    /// Highest accepted fundamental in Hz.
    pub max_freq: f32,
    /// Maximum number of trailing samples handed to the estimator.
    pub analysis_window: usize,
    /// Largest cents change the smoother lets through per frame.
    pub max_cents_jump: i32,
    /// Readouts within this many cents count as in tune.
    pub in_tune_cents: i32,
    /// Recorded duration required before a segment is analyzed.
    pub capture_ms: u64,
    /// Pause between two capture/analysis cycles.
    pub cycle_delay_ms: u64,
    /// Back-off after a failed cycle.
    pub retry_delay_ms: u64,
    /// Back-off after capture failed to start.
    pub restart_delay_ms: u64,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            header_len: 44,
            min_samples: 512,
            silence_threshold: 0.03,
            rms_threshold: 0.01,
            trim_fraction: 0.2,
            confidence_threshold: 0.8,
            min_freq: 80.0,
            max_freq: 1000.0,
            analysis_window: 8192,
            max_cents_jump: 8,
            in_tune_cents: 5,
            capture_ms: 1000,
            cycle_delay_ms: 200,
            retry_delay_ms: 1000,
            restart_delay_ms: 2000,
        }
    }
}

impl TunerConfig {
    /// Checks the values a pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            bail!("sample rate must be positive");
        }
        if !(self.min_freq > 0.0 && self.min_freq < self.max_freq) {
            bail!(
                "invalid frequency band {} - {} Hz",
                self.min_freq,
                self.max_freq
            );
        }
        if self.max_freq >= self.sample_rate as f32 / 2.0 {
            bail!(
                "max frequency {} Hz is above Nyquist for {} Hz",
                self.max_freq,
                self.sample_rate
            );
        }
        if self.max_cents_jump <= 0 {
            bail!("max cents jump must be positive");
        }
        Ok(())
    }

    pub fn capture_duration(&self) -> Duration {
        Duration::from_millis(self.capture_ms)
    }

    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

/// Parameters for the tap tempo finder and the metronome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// Inactivity after which the tap series is discarded.
    pub timeout_ms: u64,
    pub min_bpm: u32,
    pub max_bpm: u32,
    pub default_bpm: u32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            min_bpm: 20,
            max_bpm: 300,
            default_bpm: 100,
        }
    }
}

impl TempoConfig {
    /// Checks the bounds a metronome and tapper cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.min_bpm == 0 {
            bail!("minimum BPM must be positive");
        }
        if self.min_bpm > self.max_bpm {
            bail!("invalid BPM range {} - {}", self.min_bpm, self.max_bpm);
        }
        if self.timeout_ms == 0 {
            bail!("tap timeout must be positive");
        }
        Ok(())
    }
}

/// Everything a front end persists between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tuner: TunerConfig,
    pub tempo: TempoConfig,
}

impl Settings {
    /// Loads settings from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file =
            File::open(path).with_context(|| format!("opening settings {}", path.display()))?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        let settings: Settings = serde_json::from_str(&data)
            .with_context(|| format!("parsing settings {}", path.display()))?;
        settings
            .tuner
            .validate()
            .with_context(|| format!("tuner settings in {}", path.display()))?;
        settings
            .tempo
            .validate()
            .with_context(|| format!("tempo settings in {}", path.display()))?;
        log::info!(target: "config", "Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Saves settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json_string = serde_json::to_string_pretty(self)?;
        let mut file =
            File::create(path).with_context(|| format!("creating settings {}", path.display()))?;
        file.write_all(json_string.as_bytes())?;
        log::info!(target: "config", "Saved settings to {}", path.display());
        Ok(())
    }
}
