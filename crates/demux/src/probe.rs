// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Container format sniffing over a file's leading bytes.
//!
//! Probe order is fixed (FLAC, MP4, MP3, Vorbis) rather than content-type
//! or extension driven: cheap, unambiguous magic checks go first, and MP3
//! — whose "sync word" can false-positive inside other formats — goes
//! last before the Ogg/Vorbis check.

use aurocast_core::input_stream::InputKind;

const MIN_PROLOGUE: usize = 12;

/// Identifies the container format from a file's first ~4KiB.
///
/// Returns `None` if no probe recognizes the prologue, or if it's too
/// short to contain any supported format's magic bytes.
#[must_use]
pub fn detect_format(prologue: &[u8]) -> Option<InputKind> {
    if prologue.len() < MIN_PROLOGUE {
        return None;
    }
    probe_flac(prologue)
        .or_else(|| probe_mp4(prologue))
        .or_else(|| probe_mp3(prologue))
        .or_else(|| probe_vorbis(prologue))
}

fn probe_flac(buf: &[u8]) -> Option<InputKind> {
    (buf.starts_with(b"fLaC")).then_some(InputKind::Flac)
}

fn probe_mp4(buf: &[u8]) -> Option<InputKind> {
    (buf.len() >= 8 && &buf[4..8] == b"ftyp").then_some(InputKind::Mp4)
}

fn probe_mp3(buf: &[u8]) -> Option<InputKind> {
    if buf.starts_with(b"ID3") {
        return Some(InputKind::Mp3);
    }
    aurocast_mp3::synchronise(buf).map(|_| InputKind::Mp3)
}

fn probe_vorbis(buf: &[u8]) -> Option<InputKind> {
    (buf.starts_with(b"OggS")).then_some(InputKind::Vorbis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_flac_magic() {
        let mut buf = b"fLaC".to_vec();
        buf.resize(MIN_PROLOGUE, 0);
        assert_eq!(detect_format(&buf), Some(InputKind::Flac));
    }

    #[test]
    fn recognizes_mp4_ftyp_box() {
        let mut buf = vec![0u8; 4]; // box size, unused by the probe
        buf.extend_from_slice(b"ftyp");
        buf.extend_from_slice(b"isom");
        assert_eq!(detect_format(&buf), Some(InputKind::Mp4));
    }

    #[test]
    fn recognizes_ogg_vorbis_magic() {
        let mut buf = b"OggS".to_vec();
        buf.resize(MIN_PROLOGUE, 0);
        assert_eq!(detect_format(&buf), Some(InputKind::Vorbis));
    }

    #[test]
    fn recognizes_id3v2_prefixed_mp3() {
        let mut buf = b"ID3".to_vec();
        buf.resize(MIN_PROLOGUE, 0);
        assert_eq!(detect_format(&buf), Some(InputKind::Mp3));
    }

    #[test]
    fn rejects_short_prologue() {
        assert_eq!(detect_format(b"fLaC"), None);
    }

    #[test]
    fn unrecognized_bytes_yield_none() {
        let buf = vec![0xAAu8; MIN_PROLOGUE];
        assert_eq!(detect_format(&buf), None);
    }
}
