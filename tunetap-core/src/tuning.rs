//! # Musical Tuning Module
//!
//! Equal-tempered note mapping and cent deviation.
//!
//! Notes are identified by their MIDI-style index: semitone distance from
//! A4 (440 Hz) offset so that A4 is 69. Names come from a fixed 12-entry
//! table starting at C.

/// Reference pitch for equal temperament.
pub const A4_FREQUENCY: f32 = 440.0;

/// Note index assigned to the reference pitch.
pub const A4_NOTE_INDEX: i32 = 69;

/// Note names, indexed by `note_index mod 12`.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A single equal-tempered note.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub index: i32,
    /// Pitch class name (e.g., "A", "C#")
    pub name: &'static str,
    /// Ideal frequency in Hz
    pub frequency: f32,
}

impl Note {
    pub fn from_index(index: i32) -> Self {
        Self {
            index,
            name: note_name(index),
            frequency: note_index_to_frequency(index),
        }
    }

    /// Octave-qualified label such as "A4" or "C#3".
    pub fn label(&self) -> String {
        format!("{}{}", self.name, octave(self.index))
    }
}

/// Maps a frequency to the index of the nearest equal-tempered note.
///
/// # Arguments
/// * `freq` - Frequency in Hz
///
/// # Returns
/// * `Some(index)` - `round(12 * log2(freq / 440)) + 69`
/// * `None` - Frequency is not a positive finite number
pub fn frequency_to_note_index(freq: f32) -> Option<i32> {
    if !(freq.is_finite() && freq > 0.0) {
        return None;
    }
    let semitones = 12.0 * (freq as f64 / A4_FREQUENCY as f64).log2();
    Some(semitones.round() as i32 + A4_NOTE_INDEX)
}

/// Ideal frequency of a note index: `440 * 2^((index - 69) / 12)`.
pub fn note_index_to_frequency(index: i32) -> f32 {
    (A4_FREQUENCY as f64 * 2.0_f64.powf((index - A4_NOTE_INDEX) as f64 / 12.0)) as f32
}

/// Pitch class name for any note index, negative ones included.
pub fn note_name(index: i32) -> &'static str {
    NOTE_NAMES[index.rem_euclid(12) as usize]
}

/// Scientific octave number; index 60 is C4.
pub fn octave(index: i32) -> i32 {
    index.div_euclid(12) - 1
}

/// Finds the closest equal-tempered note to a given frequency.
pub fn find_nearest_note(freq: f32) -> Option<Note> {
    frequency_to_note_index(freq).map(Note::from_index)
}

/// Calculates the deviation from a target frequency in cents.
///
/// The result is `floor(1200 * log2(freq / target_freq))`. Flooring rather
/// than rounding biases readings slightly flat; display compatibility
/// depends on it.
///
/// # Arguments
/// * `freq` - Measured frequency in Hz
/// * `target_freq` - Target frequency in Hz
///
/// # Returns
/// * Cent deviation (positive = sharp, negative = flat)
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> i32 {
    (1200.0 * (freq as f64 / target_freq as f64).log2()).floor() as i32
}
