// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Crossfade/crossmix ring buffer: blends the tail of the previous track
//! into the head of the next one.
//!
//! The ring holds `fade_seconds * sample_rate` frames of the outgoing
//! track. A new track first mixes against the ring's oldest frames, then
//! (once the ring has drained) starts filling the ring with its own
//! frames, then (once the ring is full again) swaps ring contents back out
//! frame-for-frame. The net effect is a fixed lookahead delay line with a
//! blended seam at each track boundary.

use aurocast_core::input_stream::InputStream;
use aurocast_core::plugin::Plugin;

/// Saturating add used only in crossmix mode. Differs from a plain clamp:
/// a same-sign sum landing within 1 of full scale snaps to the limit
/// rather than passing the literal (still in-range) sum through.
#[must_use]
pub fn crossmix_add(a: i16, b: i16) -> i16 {
    const VMAX: i32 = i16::MAX as i32;
    const VMIN: i32 = i16::MIN as i32;
    let sum = i32::from(a) + i32::from(b);
    if a >= 0 && b >= 0 && sum >= VMAX - 1 {
        i16::MAX
    } else if a <= 0 && b <= 0 && sum <= VMIN + 1 {
        i16::MIN
    } else {
        sum as i16
    }
}

/// Configuration for a `CrossfadeRing`.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct CrossfadeConfig {
    /// Length of the blended region, in seconds.
    pub fade_seconds: u32,
    /// Tracks shorter than this (or shorter than twice `fade_seconds`)
    /// aren't faded at all.
    pub fade_min_len_secs: u32,
    /// `true` for crossmix (both tracks at full volume, summed); `false`
    /// for a linear-weighted crossfade.
    pub crossmix: bool,
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self { fade_seconds: 3, fade_min_len_secs: 10, crossmix: false }
    }
}

/// The crossfade/crossmix ring buffer, implemented as a `Plugin`.
pub struct CrossfadeRing {
    config: CrossfadeConfig,
    fade_samples: usize,
    left: Vec<i16>,
    right: Vec<i16>,
    fpos: usize,
    flen: usize,
    new_track_remaining: usize,
    last_sample_rate: Option<u32>,
    skip_next: bool,
}

impl CrossfadeRing {
    /// `initial_sample_rate_hz` sizes the ring before the first track is
    /// seen; it's resized to match each track's actual rate thereafter.
    #[must_use]
    pub fn new(config: CrossfadeConfig, initial_sample_rate_hz: u32) -> Self {
        let fade_samples = (config.fade_seconds as usize) * (initial_sample_rate_hz as usize);
        Self {
            config,
            fade_samples,
            left: vec![0; fade_samples],
            right: vec![0; fade_samples],
            fpos: 0,
            flen: 0,
            new_track_remaining: 0,
            last_sample_rate: None,
            skip_next: false,
        }
    }

    /// Resamples the ring's buffered content to `new_rate`, preserving its
    /// oldest-to-newest frame order. Uses Bresenham's algorithm to avoid
    /// floating point drift across a long buffer.
    fn resample(&mut self, old_rate: u32, new_rate: u32) {
        if old_rate == 0 || new_rate == 0 || self.fade_samples == 0 {
            return;
        }
        let new_size = (self.config.fade_seconds as usize) * (new_rate as usize);
        if new_size == 0 {
            return;
        }

        let new_len = ((self.flen as u64 * u64::from(new_rate)) / u64::from(old_rate)) as usize;
        let new_len = new_len.min(new_size);

        let mut new_left = vec![0i16; new_size];
        let mut new_right = vec![0i16; new_size];
        let mut off = (self.fpos + self.fade_samples - self.flen) % self.fade_samples;
        let mut eps: i64 = 0;

        for slot in new_left.iter_mut().zip(new_right.iter_mut()).take(new_len) {
            *slot.0 = self.left[off];
            *slot.1 = self.right[off];
            eps += i64::from(old_rate);
            while eps * 2 >= i64::from(new_rate) {
                off = (off + 1) % self.fade_samples;
                eps -= i64::from(new_rate);
            }
        }

        self.left = new_left;
        self.right = new_right;
        self.fade_samples = new_size;
        self.flen = new_len;
        self.fpos = new_len % new_size;
    }
}

impl Plugin for CrossfadeRing {
    fn name(&self) -> &str {
        "crossfade"
    }

    fn new_track(&mut self, source: &InputStream) {
        if let Some(last_rate) = self.last_sample_rate {
            if last_rate != source.sample_rate_hz {
                self.resample(last_rate, source.sample_rate_hz);
            }
        }
        self.last_sample_rate = Some(source.sample_rate_hz);

        if self.skip_next {
            self.skip_next = false;
            return;
        }

        if let Some(secs) = source.crossfade_duration_estimate_secs() {
            let fade_secs = u64::from(self.config.fade_seconds);
            if secs < u64::from(self.config.fade_min_len_secs) || secs <= fade_secs * 2 {
                self.skip_next = true;
                return;
            }
        }

        self.new_track_remaining = self.fade_samples;
    }

    fn process(&mut self, n_frames: usize, left: &mut Vec<i16>, right: &mut Vec<i16>) -> usize {
        if self.fade_samples == 0 {
            return n_frames;
        }
        if self.flen < self.fade_samples {
            self.new_track_remaining = 0;
        }

        let mut i = 0usize;
        let mut remaining = n_frames;

        while remaining > 0 && self.new_track_remaining > 0 {
            if self.config.crossmix {
                left[i] = crossmix_add(self.left[self.fpos], left[i]);
                right[i] = crossmix_add(self.right[self.fpos], right[i]);
            } else {
                let weight = self.new_track_remaining as f32 / self.fade_samples as f32;
                left[i] = (f32::from(self.left[self.fpos]) * weight
                    + f32::from(left[i]) * (1.0 - weight)) as i16;
                right[i] = (f32::from(self.right[self.fpos]) * weight
                    + f32::from(right[i]) * (1.0 - weight)) as i16;
            }
            i += 1;
            self.fpos = (self.fpos + 1) % self.fade_samples;
            remaining -= 1;
            self.new_track_remaining -= 1;
            if self.new_track_remaining == 0 {
                self.flen = 0;
            }
        }

        let mut j = i;
        while remaining > 0 && self.flen < self.fade_samples {
            let mut clen = remaining.min(self.fade_samples - self.flen);
            clen = clen.min(self.fade_samples - self.fpos);
            self.left[self.fpos..self.fpos + clen].copy_from_slice(&left[j..j + clen]);
            self.right[self.fpos..self.fpos + clen].copy_from_slice(&right[j..j + clen]);
            self.fpos = (self.fpos + clen) % self.fade_samples;
            j += clen;
            self.flen += clen;
            remaining -= clen;
        }

        while remaining > 0 {
            let clen = remaining.min(self.fade_samples - self.fpos);
            for k in 0..clen {
                let swap_l = left[j + k];
                left[i + k] = self.left[self.fpos + k];
                self.left[self.fpos + k] = swap_l;

                let swap_r = right[j + k];
                right[i + k] = self.right[self.fpos + k];
                self.right[self.fpos + k] = swap_r;
            }
            self.fpos = (self.fpos + clen) % self.fade_samples;
            i += clen;
            j += clen;
            remaining -= clen;
        }

        i
    }

    fn shutdown(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurocast_core::input_stream::{DecodeCapability, InputKind};

    fn input_stream(file_size: u64, bitrate_kbps: u32, sample_rate_hz: u32) -> InputStream {
        struct NoopCompressed;
        impl aurocast_core::input_stream::CompressedSource for NoopCompressed {
            fn read_compressed(&mut self, _buf: &mut [u8]) -> aurocast_core::error::Result<usize> {
                Ok(0)
            }
        }
        InputStream::new(
            InputKind::Mp3,
            "t.mp3".into(),
            file_size,
            bitrate_kbps,
            sample_rate_hz,
            2,
            DecodeCapability::Compressed(Box::new(NoopCompressed)),
        )
    }

    fn config(fade_seconds: u32, crossmix: bool) -> CrossfadeConfig {
        CrossfadeConfig {
            fade_seconds,
            fade_min_len_secs: 10,
            crossmix,
        }
    }

    #[test]
    fn short_track_is_not_faded() {
        let mut ring = CrossfadeRing::new(config(3, false), 44100);
        // 1 second track at 128kbps: well under fade_min_len and 2*fade_seconds
        let short = input_stream(128 * 128, 128, 44100);
        ring.new_track(&short);
        assert_eq!(ring.new_track_remaining, 0);
    }

    #[test]
    fn long_track_arms_the_fade() {
        let mut ring = CrossfadeRing::new(config(3, false), 44100);
        let long = input_stream(60 * 128 * 128, 128, 44100);
        ring.new_track(&long);
        assert_eq!(ring.new_track_remaining, ring.fade_samples);
    }

    #[test]
    fn fill_then_drain_round_trips_samples() {
        let mut ring = CrossfadeRing::new(config(1, false), 10); // 10 frames of ring
        // No active fade (new_track_remaining == 0): first call fills the ring.
        let mut left: Vec<i16> = (0..10).collect();
        let mut right: Vec<i16> = (100..110).collect();
        let produced = ring.process(10, &mut left, &mut right);
        assert_eq!(produced, 0); // everything absorbed into the empty ring

        // Second call: ring is full, so this call swaps new input for old.
        let mut left2: Vec<i16> = (200..210).collect();
        let mut right2: Vec<i16> = (300..310).collect();
        let produced2 = ring.process(10, &mut left2, &mut right2);
        assert_eq!(produced2, 10);
        assert_eq!(left2, (0..10).collect::<Vec<_>>());
        assert_eq!(right2, (100..110).collect::<Vec<_>>());
    }

    #[test]
    fn crossmix_add_snaps_near_positive_saturation() {
        assert_eq!(crossmix_add(20000, 20000), i16::MAX);
        assert_eq!(crossmix_add(100, 100), 200);
    }

    #[test]
    fn crossmix_add_snaps_near_negative_saturation() {
        assert_eq!(crossmix_add(-20000, -20000), i16::MIN);
        assert_eq!(crossmix_add(-100, -100), -200);
    }

    #[test]
    fn crossmix_add_passes_through_mixed_sign_sums() {
        assert_eq!(crossmix_add(32767, -1), 32766);
    }
}
