// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! MPEG frame synchronisation and ID3 tag parsing for Aurocast.

pub mod id3;
pub mod sync;

pub use id3::{parse_id3v1, parse_id3v2, Id3Tags, Id3v2Version};
pub use sync::{
    frame_length, has_vbr_tag, parse_frame, synchronise, trim_trailing_frame, vbr_tag_offset,
    BitrateMode, FrameHeader, Layer, MpegVersion,
};
