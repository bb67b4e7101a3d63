// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! MPEG audio frame header parsing and stream synchronisation.
//!
//! Reference: <http://mpgedit.org/mpgedit/mpeg_format/mpeghdr.htm>

/// MPEG version as encoded in the frame header's version bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

/// Layer I/II/III.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    I,
    II,
    III,
}

#[rustfmt::skip]
const BITRATES_MPEG1: [[u32; 15]; 3] = [
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
    [0, 32, 48, 56, 64,  80,  96,  112, 128, 160, 192, 224, 256, 320, 384],
    [0, 32, 40, 48, 56,  64,  80,  96,  112, 128, 160, 192, 224, 256, 320],
];

#[rustfmt::skip]
const BITRATES_MPEG2: [[u32; 15]; 3] = [
    [0, 32, 48, 56, 64, 80, 96,  112, 128, 144, 160, 176, 192, 224, 256],
    [0, 8,  16, 24, 32, 40, 48,  56,  64,  80,  96,  112, 128, 144, 160],
    [0, 8,  16, 24, 32, 40, 48,  56,  64,  80,  96,  112, 128, 144, 160],
];

const SAMPLE_RATES: [[u32; 4]; 3] = [
    [44100, 48000, 32000, 0],
    [22050, 24000, 16000, 0],
    [11025, 8000, 8000, 0],
];

const MODE_MONO: u8 = 3;

/// A decoded MPEG frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: Layer,
    pub bitrate_kbps: u32,
    pub sample_rate_hz: u32,
    pub padding: bool,
    pub mode: u8,
    pub channels: u8,
}

/// Parses a 4-byte MPEG frame header at the start of `buf`.
///
/// Returns `None` on a bad sync word or a reserved/free field, matching the
/// original decoder's conservative "don't bother with free bitrate" policy.
#[must_use]
pub fn parse_frame(buf: &[u8]) -> Option<FrameHeader> {
    if buf.len() < 4 {
        return None;
    }
    if (u16::from(buf[0]) << 4) | (u16::from(buf[1] >> 4) & 0xE) != 0xFFE {
        return None;
    }

    let version = match (buf[1] >> 3) & 0x3 {
        3 => MpegVersion::Mpeg1,
        2 => MpegVersion::Mpeg2,
        0 => MpegVersion::Mpeg25,
        _ => return None,
    };

    let layer_bits = 4 - ((buf[1] >> 1) & 0x3);
    let layer = match layer_bits {
        1 => Layer::III,
        2 => Layer::II,
        3 => Layer::I,
        _ => return None,
    };

    let bitrate_idx = usize::from((buf[2] >> 4) & 0xF);
    let samplerate_idx = usize::from((buf[2] >> 2) & 0x3);
    let mode = (buf[3] >> 6) & 0x3;
    let emphasis = buf[3] & 0x3;

    if bitrate_idx == 0xF || samplerate_idx == 0x3 || emphasis == 2 {
        return None;
    }

    let layer_row = match layer {
        Layer::I => 0,
        Layer::II => 1,
        Layer::III => 2,
    };
    let bitrate_kbps = match version {
        MpegVersion::Mpeg1 => BITRATES_MPEG1[layer_row][bitrate_idx],
        MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => BITRATES_MPEG2[layer_row][bitrate_idx],
    };
    let version_row = match version {
        MpegVersion::Mpeg1 => 0,
        MpegVersion::Mpeg2 => 1,
        MpegVersion::Mpeg25 => 2,
    };
    let sample_rate_hz = SAMPLE_RATES[version_row][samplerate_idx];
    let padding = ((buf[2] >> 1) & 0x01) != 0;
    let channels = if mode == MODE_MONO { 1 } else { 2 };

    Some(FrameHeader {
        version,
        layer,
        bitrate_kbps,
        sample_rate_hz,
        padding,
        mode,
        channels,
    })
}

/// Length in bytes of the frame described by `header`, or `None` for a free
/// bitrate header (bitrate index 0) whose length can't be predicted.
#[must_use]
pub fn frame_length(header: &FrameHeader) -> Option<usize> {
    if header.bitrate_kbps == 0 {
        return None;
    }
    let pad = u32::from(header.padding);
    let len = match (header.layer, header.version) {
        (Layer::I, _) => (12000 * header.bitrate_kbps / header.sample_rate_hz + pad) * 4,
        (Layer::III, MpegVersion::Mpeg2 | MpegVersion::Mpeg25) => {
            72_000 * header.bitrate_kbps / header.sample_rate_hz + pad
        }
        _ => 144_000 * header.bitrate_kbps / header.sample_rate_hz + pad,
    };
    Some(len as usize)
}

/// Byte offset (from the frame's first byte) at which a VBR tag (`Xing`,
/// `Info`, or `VBRI`) would begin, per the format's fixed side-information
/// layout. Only `Xing`/`Info`/`VBRI` need be checked there; the tag offset
/// itself does not depend on which of the three is present.
#[must_use]
pub fn vbr_tag_offset(header: &FrameHeader) -> usize {
    match (header.version, header.channels) {
        (MpegVersion::Mpeg1, 1) => 21,
        (MpegVersion::Mpeg1, _) => 36,
        (_, 1) => 13,
        (_, _) => 21,
    }
}

/// Returns `true` if a VBR tag magic string sits at `vbr_tag_offset(header)`
/// within `frame`, which must contain at least that many bytes plus 4.
#[must_use]
pub fn has_vbr_tag(frame: &[u8], header: &FrameHeader) -> bool {
    let offset = vbr_tag_offset(header);
    match frame.get(offset..offset + 4) {
        Some(tag) => tag == b"VBRI" || tag == b"Xing" || tag == b"Info",
        None => false,
    }
}

/// Outcome of locking onto a stream's bitrate mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitrateMode {
    /// Constant bitrate; carries the locked kbps value.
    Constant(u32),
    /// Variable bitrate (VBR tag found, or first two frames disagree).
    Variable,
}

/// Incrementally scans a byte stream for the first valid MPEG frame and
/// classifies it as CBR or VBR by comparing it against the following frame.
///
/// `buf` must contain the remainder of the stream read so far, starting at
/// the position to resume scanning from. Returns the byte offset of the
/// sync word, the header found there, and the bitrate mode, or `None` if no
/// sync was found and more data is required.
#[must_use]
pub fn synchronise(buf: &[u8]) -> Option<(usize, FrameHeader, BitrateMode)> {
    let mut pos = 0;
    while pos + 4 <= buf.len() {
        let Some(header) = parse_frame(&buf[pos..]) else {
            pos += 1;
            continue;
        };
        let Some(framelen) = frame_length(&header) else {
            pos += 1;
            continue;
        };

        if has_vbr_tag(&buf[pos..], &header) {
            return Some((pos, header, BitrateMode::Variable));
        }

        let next_start = pos + framelen;
        match buf.get(next_start..).and_then(parse_frame) {
            None => {
                // Not enough data yet to confirm; caller should buffer more
                // and retry, but if the tail is simply short we treat this
                // frame as junk and keep scanning.
                if next_start + 4 > buf.len() {
                    return None;
                }
                pos += 1;
            }
            Some(next_header) => {
                if next_header.version != header.version
                    || next_header.layer != header.layer
                    || next_header.sample_rate_hz != header.sample_rate_hz
                {
                    pos += 1;
                    continue;
                }
                let mode = if next_header.bitrate_kbps != header.bitrate_kbps {
                    BitrateMode::Variable
                } else {
                    BitrateMode::Constant(header.bitrate_kbps)
                };
                return Some((pos, header, mode));
            }
        }
    }
    None
}

/// Scans `tail` (the last bytes of a file, ending at `file_end`) backwards
/// for the last frame consistent with `header`, returning the corrected
/// file length. `tail_start` is the file offset of `tail[0]`.
///
/// Mirrors the original trimmer: a short final frame truncates the file,
/// while a frame promising bytes past EOF also gets dropped.
#[must_use]
pub fn trim_trailing_frame(tail: &[u8], tail_start: u64, file_end: u64, header: &FrameHeader) -> u64 {
    if tail.len() < 4 {
        return file_end;
    }
    for pos in (0..=tail.len() - 4).rev() {
        let Some(candidate) = parse_frame(&tail[pos..]) else {
            continue;
        };
        let Some(framelen) = frame_length(&candidate) else {
            continue;
        };
        if candidate.version != header.version
            || candidate.layer != header.layer
            || candidate.sample_rate_hz != header.sample_rate_hz
        {
            continue;
        }
        if header.bitrate_kbps != 0 && header.bitrate_kbps != candidate.bitrate_kbps {
            continue;
        }
        let frame_start = tail_start + pos as u64;
        let frame_end = frame_start + framelen as u64;
        return if frame_end > file_end {
            // incomplete trailing frame: drop it entirely
            frame_start
        } else {
            // frame_end <= file_end: trims any trailing garbage after it
            frame_end
        };
    }
    file_end
}
