use rand::{Rng, SeedableRng, rngs::StdRng};
use tunetap_core::analysis::{FrameAnalyzer, analyze_frame};
use tunetap_core::pitch::detect_pitch;
use tunetap_core::{TuningSession, TunerConfig, pcm, tuning};

const RATE: u32 = 22050;

/// Decaying plucked-string-like tone with a few harmonics.
fn plucked(freq: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / RATE as f32;
            let envelope = (-t * 1.5).exp();
            let w = 2.0 * std::f32::consts::PI * freq * t;
            envelope * (0.5 * w.sin() + 0.2 * (2.0 * w).sin() + 0.1 * (3.0 * w).sin())
        })
        .collect()
}

#[test]
fn guitar_strings_resolve_to_their_notes() {
    let config = TunerConfig::default();
    let strings = [
        (82.41, "E2"),
        (110.0, "A2"),
        (146.83, "D3"),
        (196.0, "G3"),
        (246.94, "B3"),
        (329.63, "E4"),
    ];
    for (freq, label) in strings {
        let bytes = pcm::encode_wav(&plucked(freq, RATE as usize), RATE).unwrap();
        let result =
            analyze_frame(&bytes, &config).unwrap_or_else(|| panic!("no pitch for {}", label));
        assert_eq!(result.note.label(), label);
        assert!(
            result.cents_deviation.abs() <= 10,
            "{}: {} cents",
            label,
            result.cents_deviation
        );
    }
}

#[test]
fn violin_open_e_is_detected() {
    let bytes = pcm::encode_wav(&plucked(659.25, 8192), RATE).unwrap();
    let result = analyze_frame(&bytes, &TunerConfig::default()).unwrap();
    assert_eq!(result.note.label(), "E5");
}

#[test]
fn noisy_tone_still_detected() {
    let mut rng = StdRng::seed_from_u64(7);
    let signal: Vec<f32> = plucked(220.0, 8192)
        .into_iter()
        .map(|s| s + rng.gen_range(-0.03..0.03))
        .collect();
    let freq = detect_pitch(&signal, RATE).unwrap();
    assert!((freq - 220.0).abs() < 2.2, "{} Hz", freq);
}

#[test]
fn silent_capture_changes_nothing() {
    let mut session = TuningSession::new(TunerConfig::default()).unwrap();
    let silence = pcm::encode_wav(&vec![0.0; 8192], RATE).unwrap();
    assert!(session.process(&silence).is_none());
    assert_eq!(session.readout().note_name, None);
}

#[test]
fn detuned_string_converges_on_gauge() {
    let config = TunerConfig::default();
    let analyzer = FrameAnalyzer::new(config.clone());
    let mut session = TuningSession::new(config).unwrap();
    // 25 cents flat of G3
    let freq = tuning::note_index_to_frequency(55) * 2f32.powf(-25.0 / 1200.0);
    let bytes = pcm::encode_wav(&plucked(freq, 8192), RATE).unwrap();
    let raw = analyzer.analyze(&bytes).unwrap().cents_deviation;
    assert!((-28..=-23).contains(&raw), "raw {}", raw);

    let steps: Vec<i32> = (0..5).map(|_| session.process(&bytes).unwrap().cents).collect();
    assert_eq!(&steps[..3], &[-8, -16, -24]);
    assert_eq!(steps[4], raw);
    assert!(session.readout().needle_position() < 0.5);
}
