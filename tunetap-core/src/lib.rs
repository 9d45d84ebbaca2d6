// tunetap-core/src/lib.rs

//! Core logic for a string-instrument tuner with tap tempo.
//! This crate is responsible for decoding captured audio, pitch detection,
//! note mapping and cents smoothing, plus the tempo tools. It is completely
//! headless and contains no GUI code.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod fft;
pub mod pcm;
pub mod pitch;
pub mod smoothing;
pub mod tempo;
pub mod tuning;
pub mod worker;

pub use analysis::{TunerReadout, TuningSession};
pub use config::{Settings, TempoConfig, TunerConfig};
pub use tempo::{Metronome, TapTempo, TempoError};
pub use worker::AnalysisWorker;

/// Represents the result of a single audio analysis frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    /// The detected fundamental frequency in Hz.
    pub detected_frequency: f32,
    /// The nearest equal-tempered note.
    pub note: tuning::Note,
    /// Unsmoothed deviation from the note in cents.
    pub cents_deviation: i32,
}
