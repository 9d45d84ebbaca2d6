//! # Frame Analysis Module
//!
//! Runs one captured segment through the pipeline
//! (decode → silence gate → pitch → note → cents) and folds the result into
//! a per-recording [`TuningSession`] that rate-limits the displayed cents.

use crate::config::TunerConfig;
use crate::pcm;
use crate::pitch::PitchEstimator;
use crate::smoothing::Smoother;
use crate::tuning;
use crate::AnalysisResult;
use anyhow::Result;

/// Readouts are clamped to this range when placed on a gauge.
const GAUGE_RANGE_CENTS: i32 = 50;

/// Decodes and analyzes container bytes with a fixed configuration.
#[derive(Debug, Clone)]
pub struct FrameAnalyzer {
    config: TunerConfig,
    estimator: PitchEstimator,
}

impl FrameAnalyzer {
    pub fn new(config: TunerConfig) -> Self {
        let estimator = PitchEstimator::from_config(&config);
        Self { config, estimator }
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Performs a full analysis on a captured container.
    ///
    /// # Returns
    /// * `Some(result)` - A pitch was found inside the accepted band
    /// * `None` - Malformed container, too few samples, silence or no pitch
    pub fn analyze(&self, bytes: &[u8]) -> Option<AnalysisResult> {
        let Some(samples) = pcm::decode_container(bytes, self.config.header_len) else {
            log::debug!(target: "analysis", "Container of {} bytes has no data", bytes.len());
            return None;
        };
        if samples.len() <= self.config.min_samples {
            log::debug!(target: "analysis", "Skipping segment of {} samples", samples.len());
            return None;
        }
        self.analyze_samples(&samples)
    }

    /// Analyzes an already decoded sample buffer.
    pub fn analyze_samples(&self, samples: &[f32]) -> Option<AnalysisResult> {
        if !pcm::is_audible(samples, self.config.silence_threshold) {
            log::debug!(target: "analysis", "Segment is silent");
            return None;
        }
        let frequency = self.estimator.estimate(samples)?;
        let result = result_for_frequency(frequency)?;
        log::debug!(
            target: "analysis",
            "Detected {:.2} Hz -> {} ({:+} cents)",
            frequency,
            result.note.label(),
            result.cents_deviation
        );
        Some(result)
    }
}

/// Analyzes one container with the given configuration.
pub fn analyze_frame(bytes: &[u8], config: &TunerConfig) -> Option<AnalysisResult> {
    FrameAnalyzer::new(config.clone()).analyze(bytes)
}

/// What the display layer shows.
#[derive(Debug, Clone, PartialEq)]
pub struct TunerReadout {
    /// Nearest note name, `None` until a pitch has been detected.
    pub note_name: Option<&'static str>,
    pub frequency: f32,
    /// Smoothed deviation from the nearest note.
    pub cents: i32,
    /// True while a recording session is running.
    pub active: bool,
}

impl TunerReadout {
    /// Neutral readout shown when no session is running.
    pub fn inactive() -> Self {
        Self {
            note_name: None,
            frequency: 0.0,
            cents: 0,
            active: false,
        }
    }

    fn listening() -> Self {
        Self {
            active: true,
            ..Self::inactive()
        }
    }

    /// True when a note is showing and sits within `tolerance` cents.
    pub fn is_in_tune(&self, tolerance: i32) -> bool {
        self.active && self.note_name.is_some() && self.cents.abs() <= tolerance
    }

    /// Needle position on a ±50 cent gauge, 0.0 (flat) to 1.0 (sharp).
    pub fn needle_position(&self) -> f32 {
        let clamped = self.cents.clamp(-GAUGE_RANGE_CENTS, GAUGE_RANGE_CENTS);
        0.5 + clamped as f32 / (2 * GAUGE_RANGE_CENTS) as f32
    }
}

impl Default for TunerReadout {
    fn default() -> Self {
        Self::inactive()
    }
}

/// State of one recording session: created when recording starts and
/// dropped (or reset) when it stops.
#[derive(Debug, Clone)]
pub struct TuningSession {
    analyzer: FrameAnalyzer,
    smoother: Smoother,
    readout: TunerReadout,
}

impl TuningSession {
    /// Starts a session, rejecting a configuration the pipeline cannot run
    /// with (see [`TunerConfig::validate`]).
    pub fn new(config: TunerConfig) -> Result<Self> {
        config.validate()?;
        let smoother = Smoother::new(config.max_cents_jump);
        Ok(Self {
            analyzer: FrameAnalyzer::new(config),
            smoother,
            readout: TunerReadout::listening(),
        })
    }

    pub fn config(&self) -> &TunerConfig {
        self.analyzer.config()
    }

    pub fn readout(&self) -> &TunerReadout {
        &self.readout
    }

    /// Analyzes a captured container and updates the readout.
    ///
    /// Returns the new readout, or `None` when the frame was skipped and the
    /// previous readout still stands.
    pub fn process(&mut self, bytes: &[u8]) -> Option<&TunerReadout> {
        let result = self.analyzer.analyze(bytes)?;
        Some(self.apply(&result))
    }

    /// Folds an analysis result into the readout through the smoother.
    pub fn apply(&mut self, result: &AnalysisResult) -> &TunerReadout {
        let cents = self.smoother.smooth(result.cents_deviation);
        self.readout = TunerReadout {
            note_name: Some(result.note.name),
            frequency: result.detected_frequency,
            cents,
            active: true,
        };
        &self.readout
    }

    pub fn is_in_tune(&self) -> bool {
        self.readout.is_in_tune(self.config().in_tune_cents)
    }

    /// Clears the smoother and readout, as on a recording restart.
    pub fn reset(&mut self) {
        self.smoother.reset();
        self.readout = TunerReadout::listening();
    }
}

/// Maps a detected frequency onto its nearest note and raw cents offset.
pub fn result_for_frequency(frequency: f32) -> Option<AnalysisResult> {
    let note = tuning::find_nearest_note(frequency)?;
    let cents_deviation = tuning::calculate_cents_deviation(frequency, note.frequency);
    Some(AnalysisResult {
        detected_frequency: frequency,
        note,
        cents_deviation,
    })
}
