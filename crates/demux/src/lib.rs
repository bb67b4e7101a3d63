// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Container format probing and the re-encoder adapter for Aurocast.

pub mod decode;
pub mod probe;
pub mod reencoder;
pub mod source;

pub use decode::{open_pcm_source, open_pcm_source_from_bytes, ContainerTags, SymphoniaPcmSource};
pub use probe::detect_format;
pub use reencoder::{needs_reencoding, LameEncoder, ReencoderAdapter, SampleEncoder};
pub use source::{open_track, ProbedTrack};
