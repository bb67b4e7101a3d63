// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `InputStream`: the opened, demultiplexed view of one track.
//!
//! Decode capability is a tagged variant over trait objects rather than a
//! pair of nullable function pointers, so callers match on a closed set of
//! capabilities instead of probing for null.

use crate::error::Result;
use std::time::Instant;

/// Container kind detected by the demultiplexer's format probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Mp3,
    Vorbis,
    Mp4,
    Flac,
}

/// Source of compressed bytes suitable for pass-through to an output stream.
pub trait CompressedSource: Send {
    /// Reads up to `buf.len()` raw bytes. Returns `0` at end of stream.
    ///
    /// Must never return bytes beyond the stream's advertised `file_size`
    /// when `file_size > 0` (this is how a trailing ID3v1 tag is hidden).
    fn read_compressed(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Source of decoded PCM frames.
pub trait PcmSource: Send {
    /// Decodes up to `max_frames` frames into `left`/`right` (which are
    /// resized to the number of frames produced). Returns the frame count;
    /// `0` signals end of stream.
    ///
    /// Implementations must expand mono input to stereo by duplicating
    /// `left` into `right` before returning.
    fn read_pcm(&mut self, max_frames: usize, left: &mut Vec<i16>, right: &mut Vec<i16>)
        -> Result<usize>;
}

/// The capability union for an opened `InputStream`.
///
/// At least one of `Compressed`/`Pcm` is always present.
pub enum DecodeCapability {
    Compressed(Box<dyn CompressedSource>),
    Pcm(Box<dyn PcmSource>),
    Both(Box<dyn CompressedSource>, Box<dyn PcmSource>),
}

impl DecodeCapability {
    #[must_use]
    pub fn has_compressed(&self) -> bool {
        matches!(self, Self::Compressed(_) | Self::Both(_, _))
    }

    #[must_use]
    pub fn has_pcm(&self) -> bool {
        matches!(self, Self::Pcm(_) | Self::Both(_, _))
    }

    /// Borrows the compressed reader, if this capability carries one.
    pub fn compressed_mut(&mut self) -> Option<&mut dyn CompressedSource> {
        match self {
            Self::Compressed(c) | Self::Both(c, _) => Some(c.as_mut()),
            Self::Pcm(_) => None,
        }
    }

    /// Borrows the PCM reader, if this capability carries one.
    pub fn pcm_mut(&mut self) -> Option<&mut dyn PcmSource> {
        match self {
            Self::Pcm(p) | Self::Both(_, p) => Some(p.as_mut()),
            Self::Compressed(_) => None,
        }
    }
}

/// A single opened, demultiplexed file being streamed.
pub struct InputStream {
    pub kind: InputKind,
    pub path: String,
    /// `0` means unknown/unseekable (e.g. stdin).
    pub file_size: u64,
    pub bytes_read: u64,
    /// `0` means VBR or unknown.
    pub bitrate_kbps: u32,
    pub sample_rate_hz: u32,
    pub channels: u8,
    /// Wall-clock time after which the orchestrator finishes the track early.
    /// `None` means no limit.
    pub interrupt_deadline: Option<Instant>,
    /// Tagged ReplayGain track gain in dB (`0.0` if untagged), set by the
    /// demultiplexer after parsing container tags so the ReplayGain plugin
    /// can pick it up from `new_track` without a separate setter call.
    pub replaygain_track_gain_db: f64,
    pub capability: DecodeCapability,
}

impl InputStream {
    #[must_use]
    pub fn new(
        kind: InputKind,
        path: String,
        file_size: u64,
        bitrate_kbps: u32,
        sample_rate_hz: u32,
        channels: u8,
        capability: DecodeCapability,
    ) -> Self {
        debug_assert!(channels > 0, "channels must be > 0");
        Self {
            kind,
            path,
            file_size,
            bytes_read: 0,
            bitrate_kbps,
            sample_rate_hz,
            channels,
            interrupt_deadline: None,
            replaygain_track_gain_db: 0.0,
            capability,
        }
    }

    /// Estimated track duration in seconds from `file_size`/`bitrate_kbps`,
    /// or `None` when either is unknown (VBR, stdin, ...). Feeds the
    /// crossfade short-track-skip decision only; the cue file's displayed
    /// duration uses its own `*125` formula.
    ///
    /// `filesize / (bitrate * 128)`, matching the crossfade arm/skip
    /// estimate (bitrate in kbps).
    #[must_use]
    pub fn crossfade_duration_estimate_secs(&self) -> Option<u64> {
        if self.file_size > 0 && self.bitrate_kbps > 0 {
            Some(self.file_size / (u64::from(self.bitrate_kbps) * 128))
        } else {
            None
        }
    }

    #[must_use]
    pub fn deadline_exceeded(&self, now: Instant) -> bool {
        self.interrupt_deadline.is_some_and(|deadline| now >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeCompressed;
    impl CompressedSource for FakeCompressed {
        fn read_compressed(&mut self, _buf: &mut [u8]) -> Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn duration_estimate_matches_original_formula() {
        let stream = InputStream::new(
            InputKind::Mp3,
            "t.mp3".into(),
            163_840, // 10s @ 128kbps (bitrate * 128 bytes/sec)
            128,
            44100,
            2,
            DecodeCapability::Compressed(Box::new(FakeCompressed)),
        );
        assert_eq!(stream.crossfade_duration_estimate_secs(), Some(10));
    }

    #[test]
    fn unknown_bitrate_yields_no_estimate() {
        let stream = InputStream::new(
            InputKind::Vorbis,
            "t.ogg".into(),
            0,
            0,
            44100,
            2,
            DecodeCapability::Compressed(Box::new(FakeCompressed)),
        );
        assert_eq!(stream.crossfade_duration_estimate_secs(), None);
    }
}
