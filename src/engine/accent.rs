//! Per-beat sample selection.

use crate::audio::sample::SampleVariant;

/// Default number of beats in a bar
pub const DEFAULT_BEATS_PER_BAR: u32 = 4;

/// Static accent decision: with accents on, the first beat of every bar
/// plays the accent click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccentPattern {
    pub enabled: bool,
    pub beats_per_bar: u32,
}

impl AccentPattern {
    pub fn new(enabled: bool, beats_per_bar: u32) -> Self {
        Self {
            enabled,
            beats_per_bar: beats_per_bar.max(1),
        }
    }

    /// Variant played on beat `beat_index` (0-based).
    pub fn select(&self, beat_index: u64) -> SampleVariant {
        if self.enabled && beat_index % self.beats_per_bar as u64 == 0 {
            SampleVariant::Accent
        } else {
            SampleVariant::Normal
        }
    }
}

impl Default for AccentPattern {
    fn default() -> Self {
        Self::new(false, DEFAULT_BEATS_PER_BAR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_is_always_normal() {
        let pattern = AccentPattern::default();
        assert!((0..16).all(|beat| pattern.select(beat) == SampleVariant::Normal));
    }

    #[test]
    fn test_downbeats_accented() {
        let pattern = AccentPattern::new(true, 4);
        let variants: Vec<_> = (0..8).map(|beat| pattern.select(beat)).collect();
        assert_eq!(
            variants,
            vec![
                SampleVariant::Accent,
                SampleVariant::Normal,
                SampleVariant::Normal,
                SampleVariant::Normal,
                SampleVariant::Accent,
                SampleVariant::Normal,
                SampleVariant::Normal,
                SampleVariant::Normal,
            ]
        );
    }

    #[test]
    fn test_single_beat_bar_accents_everything() {
        let pattern = AccentPattern::new(true, 0);
        assert_eq!(pattern.beats_per_bar, 1);
        assert!((0..5).all(|beat| pattern.select(beat) == SampleVariant::Accent));
    }
}
