// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Aurocast Core - fundamental traits and data structures for the Aurocast
//! streaming pipeline.
//!
//! ## Core Modules
//!
//! - [`error`]: Structured error type shared across the workspace.
//! - [`sample`]: 16-bit PCM sample math and the `PcmBuffer` pair.
//! - [`input_stream`]: `InputStream` and its decode capability union.
//! - [`metadata`]: Per-track metadata resolution.
//! - [`plugin`]: The `Plugin` chain stage trait.
//! - [`output_stream`]: `OutputStream` configuration and runtime state.
//! - [`playlist`]: The `PlaylistSource` external-collaborator trait.

pub mod error;
pub mod input_stream;
pub mod metadata;
pub mod output_stream;
pub mod playlist;
pub mod plugin;
pub mod sample;

pub use error::{AurocastError, Result};
pub use input_stream::{CompressedSource, DecodeCapability, InputKind, InputStream, PcmSource};
pub use metadata::MetadataUpdate;
pub use output_stream::{
    EncoderSettings, OutputStreamConfig, Protocol, StreamInfo, StreamRuntimeState,
};
pub use playlist::PlaylistSource;
pub use plugin::Plugin;
pub use sample::{expand_mono_to_stereo, sat_add, PcmBuffer};
