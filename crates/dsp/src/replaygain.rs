// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! ReplayGain track normalisation plugin.

use aurocast_core::input_stream::InputStream;
use aurocast_core::plugin::Plugin;

const MAX_SCALE: f64 = 15.0;

/// Configuration for the ReplayGain plugin.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ReplayGainConfig {
    /// Extra gain applied on top of the tag value, in linear scale (not dB).
    pub preamp: f64,
}

impl Default for ReplayGainConfig {
    fn default() -> Self {
        Self { preamp: 1.0 }
    }
}

/// Scales every sample in a track by a factor derived from its tagged
/// ReplayGain value, clamped to avoid excessive amplification and to keep
/// a known peak from clipping.
pub struct ReplayGainPlugin {
    config: ReplayGainConfig,
    track_gain_db: f64,
    track_peak: f64,
}

impl ReplayGainPlugin {
    #[must_use]
    pub fn new(config: ReplayGainConfig) -> Self {
        Self {
            config,
            track_gain_db: 0.0,
            track_peak: 0.0,
        }
    }

    /// Sets the tagged gain (dB) for the upcoming track; resets the peak,
    /// mirroring how a freshly-set gain supersedes any stale peak value.
    pub fn set_track_gain(&mut self, gain_db: f64) {
        self.track_gain_db = gain_db;
        self.track_peak = 0.0;
    }

    /// Sets a known track peak (linear, 0.0-1.0+) used to avoid clipping
    /// when the gain-derived scale would otherwise push samples over range.
    pub fn set_track_peak(&mut self, peak: f64) {
        self.track_peak = peak;
    }

    fn scale(&self) -> f64 {
        if self.track_gain_db == 0.0 {
            return 1.0;
        }
        let mut scale = 10f64.powf(self.track_gain_db / 20.0) * self.config.preamp;
        if scale > MAX_SCALE {
            scale = MAX_SCALE;
        }
        if self.track_peak != 0.0 && scale * self.track_peak > 1.0 {
            scale = 1.0 / self.track_peak;
        }
        scale
    }
}

fn apply_scale(scale: f64, samples: &mut [i16]) {
    for sample in samples {
        let scaled = f64::from(*sample) * scale;
        *sample = scaled.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
    }
}

impl Plugin for ReplayGainPlugin {
    fn name(&self) -> &str {
        "replaygain"
    }

    fn new_track(&mut self, source: &InputStream) {
        self.set_track_gain(source.replaygain_track_gain_db);
    }

    fn process(&mut self, n_frames: usize, left: &mut Vec<i16>, right: &mut Vec<i16>) -> usize {
        let scale = self.scale();
        if scale != 1.0 {
            apply_scale(scale, &mut left[..n_frames]);
            apply_scale(scale, &mut right[..n_frames]);
        }
        n_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_gain_is_a_no_op() {
        let mut plugin = ReplayGainPlugin::new(ReplayGainConfig::default());
        let mut left = vec![1000i16, -1000];
        let mut right = left.clone();
        let n = plugin.process(2, &mut left, &mut right);
        assert_eq!(n, 2);
        assert_eq!(left, vec![1000, -1000]);
    }

    #[test]
    fn positive_gain_amplifies_samples() {
        let mut plugin = ReplayGainPlugin::new(ReplayGainConfig::default());
        plugin.set_track_gain(6.0); // roughly 2x linear
        let mut left = vec![1000i16];
        let mut right = vec![1000i16];
        plugin.process(1, &mut left, &mut right);
        assert!(left[0] > 1800 && left[0] < 2200);
    }

    #[test]
    fn scale_never_exceeds_max_scale() {
        let mut plugin = ReplayGainPlugin::new(ReplayGainConfig::default());
        plugin.set_track_gain(1000.0); // absurd gain, should clamp at 15x
        let mut left = vec![1000i16];
        let mut right = vec![1000i16];
        plugin.process(1, &mut left, &mut right);
        assert_eq!(left[0], 15_000); // scale clamps to 15.0, not 10^50
    }

    #[test]
    fn clamped_scale_still_saturates_to_sample_range() {
        let mut plugin = ReplayGainPlugin::new(ReplayGainConfig::default());
        plugin.set_track_gain(1000.0);
        let mut left = vec![30_000i16];
        let mut right = vec![30_000i16];
        plugin.process(1, &mut left, &mut right);
        assert_eq!(left[0], i16::MAX); // 15 * 30000 overflows i16, must saturate
    }

    #[test]
    fn known_peak_prevents_clipping() {
        let mut plugin = ReplayGainPlugin::new(ReplayGainConfig::default());
        plugin.set_track_gain(6.0);
        plugin.set_track_peak(0.9); // scale*peak > 1.0 forces scale = 1/peak
        let mut left = vec![10_000i16];
        let mut right = vec![10_000i16];
        plugin.process(1, &mut left, &mut right);
        let expected = (10_000.0 / 0.9) as i16;
        assert_eq!(left[0], expected);
    }
}
