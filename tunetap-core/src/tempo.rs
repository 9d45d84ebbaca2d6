//! # Tempo Module
//!
//! Tap tempo estimation and the metronome tempo it feeds.
//!
//! The tapper averages every interval of the current series, so the
//! estimate settles as more taps arrive. A series is discarded after a
//! period of inactivity.

use crate::config::TempoConfig;
use std::time::{Duration, Instant};
use thiserror::Error;

const MS_PER_MINUTE: f64 = 60_000.0;

/// Rejected tempo input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TempoError {
    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("BPM must be between {min} and {max}, got {bpm}")]
    OutOfRange { bpm: i64, min: u32, max: u32 },
}

/// Whether the tapper is collecting a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapState {
    Idle,
    Counting,
}

/// Running BPM estimate from tap timestamps.
#[derive(Debug, Clone)]
pub struct TapTempo {
    timeout_ms: u64,
    taps: Vec<u64>,
    bpm: u32,
    origin: Instant,
}

impl Default for TapTempo {
    fn default() -> Self {
        Self::from_config(&TempoConfig::default())
    }
}

impl TapTempo {
    /// Create a tapper that forgets its series after `timeout` without taps.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout_ms: timeout.as_millis() as u64,
            taps: Vec::new(),
            bpm: 0,
            origin: Instant::now(),
        }
    }

    pub fn from_config(config: &TempoConfig) -> Self {
        Self::new(Duration::from_millis(config.timeout_ms))
    }

    /// Register a tap at `timestamp_ms` (milliseconds on any monotonic clock).
    ///
    /// Returns the current BPM, which stays 0 until two taps are recorded.
    pub fn tap_at(&mut self, timestamp_ms: u64) -> u32 {
        self.expire(timestamp_ms);
        self.taps.push(timestamp_ms);

        if self.taps.len() >= 2 {
            let total: u64 = self
                .taps
                .windows(2)
                .map(|pair| pair[1].saturating_sub(pair[0]))
                .sum();
            let mean_interval = total as f64 / (self.taps.len() - 1) as f64;
            if mean_interval > 0.0 {
                self.bpm = (MS_PER_MINUTE / mean_interval).round() as u32;
            }
            log::debug!(target: "tempo", "Tap {}: {} BPM", self.taps.len(), self.bpm);
        } else {
            log::debug!(target: "tempo", "First tap");
        }
        self.bpm
    }

    /// Register a tap now.
    pub fn tap(&mut self) -> u32 {
        let now = self.now_ms();
        self.tap_at(now)
    }

    /// BPM as of now on the tapper's own clock, 0 once the series has timed
    /// out.
    pub fn bpm(&self) -> u32 {
        if self.timed_out(self.now_ms()) {
            0
        } else {
            self.bpm
        }
    }

    /// BPM as of `now_ms`, discarding the series if it has timed out.
    pub fn bpm_at(&mut self, now_ms: u64) -> u32 {
        self.expire(now_ms);
        self.bpm
    }

    /// BPM as of now.
    pub fn current_bpm(&mut self) -> u32 {
        let now = self.now_ms();
        self.bpm_at(now)
    }

    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }

    pub fn state(&self) -> TapState {
        if self.taps.is_empty() || self.timed_out(self.now_ms()) {
            TapState::Idle
        } else {
            TapState::Counting
        }
    }

    /// Clears the series and BPM.
    pub fn reset(&mut self) {
        self.taps.clear();
        self.bpm = 0;
    }

    /// Hands the current BPM to a metronome. Does nothing while BPM is 0,
    /// including after the series has timed out.
    pub fn send_to(&mut self, metronome: &mut Metronome) -> bool {
        let now = self.now_ms();
        self.send_to_at(now, metronome)
    }

    /// [`TapTempo::send_to`] as of `now_ms`, on the clock used by `tap_at`.
    pub fn send_to_at(&mut self, now_ms: u64, metronome: &mut Metronome) -> bool {
        self.expire(now_ms);
        if self.bpm == 0 {
            return false;
        }
        let applied = metronome.set_bpm(self.bpm);
        log::info!(target: "tempo", "Sent {} BPM to metronome (applied {})", self.bpm, applied);
        true
    }

    fn timed_out(&self, now_ms: u64) -> bool {
        self.taps
            .last()
            .is_some_and(|&last| now_ms.saturating_sub(last) >= self.timeout_ms)
    }

    fn expire(&mut self, now_ms: u64) {
        if self.timed_out(now_ms) {
            log::debug!(target: "tempo", "Tap series timed out, resetting");
            self.reset();
        }
    }

    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Parses a user-entered BPM and checks it against `[min, max]`.
pub fn parse_bpm(input: &str, min: u32, max: u32) -> Result<u32, TempoError> {
    let trimmed = input.trim();
    let bpm: i64 = trimmed
        .parse()
        .map_err(|_| TempoError::NotANumber(trimmed.to_string()))?;
    if bpm < min as i64 || bpm > max as i64 {
        return Err(TempoError::OutOfRange { bpm, min, max });
    }
    Ok(bpm as u32)
}

/// Metronome tempo state. Every change is clamped into the configured range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metronome {
    bpm: u32,
    min_bpm: u32,
    max_bpm: u32,
    playing: bool,
}

impl Default for Metronome {
    fn default() -> Self {
        Self::new(&TempoConfig::default())
    }
}

impl Metronome {
    /// Zero or inverted bounds in `config` are repaired, never trusted.
    pub fn new(config: &TempoConfig) -> Self {
        let min_bpm = config.min_bpm.max(1);
        let max_bpm = config.max_bpm.max(min_bpm);
        Self {
            bpm: config.default_bpm.clamp(min_bpm, max_bpm),
            min_bpm,
            max_bpm,
            playing: false,
        }
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// Sets the tempo, clamped into range. Returns the applied value.
    pub fn set_bpm(&mut self, bpm: u32) -> u32 {
        self.bpm = bpm.clamp(self.min_bpm, self.max_bpm);
        self.bpm
    }

    pub fn increment(&mut self) -> u32 {
        self.set_bpm(self.bpm.saturating_add(1))
    }

    pub fn decrement(&mut self) -> u32 {
        self.set_bpm(self.bpm.saturating_sub(1))
    }

    /// Applies a typed tempo entry. Invalid input leaves the tempo unchanged.
    pub fn submit_input(&mut self, input: &str) -> Result<u32, TempoError> {
        let bpm = parse_bpm(input, self.min_bpm, self.max_bpm).inspect_err(|e| {
            log::warn!(target: "tempo", "Rejected tempo input: {}", e);
        })?;
        Ok(self.set_bpm(bpm))
    }

    /// Time between two ticks at the current tempo.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(60_000_000 / self.bpm as u64)
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Starts or stops the metronome, returning the new state.
    pub fn toggle(&mut self) -> bool {
        self.playing = !self.playing;
        self.playing
    }
}
