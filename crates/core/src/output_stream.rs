// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `OutputStream` data model: one destination server's configuration and
//! connection bookkeeping. The live connect/send state machine itself
//! lives in `aurocast-transport`, which owns a value of this shape.

use std::time::Instant;

/// Wire protocol used to talk to the destination server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Xaudiocast,
    Icy,
}

/// Display metadata advertised to the server at connect time.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct StreamInfo {
    pub name: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub public: bool,
}

/// Desired encoder settings for a reencoding stream. `<= 0` (represented
/// here as `None`) means "match the source".
#[derive(Debug, Clone, Copy)]
pub struct EncoderSettings {
    pub bitrate_kbps: u32,
    pub out_sample_rate: Option<u32>,
    pub out_channels: Option<u8>,
}

/// Static configuration for one destination server, read once at startup.
#[derive(Debug, Clone)]
pub struct OutputStreamConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub protocol: Protocol,
    pub mount: String,
    pub dump_file: Option<String>,
    pub info: StreamInfo,
    pub encoder: EncoderSettings,
    pub reencode: bool,
}

/// Per-track and per-connection bookkeeping that lives for the process
/// lifetime on an `OutputStream`.
#[derive(Debug, Default)]
pub struct StreamRuntimeState {
    /// Consecutive send errors since the start of the current track.
    pub errs: u32,
    /// Earliest wall-clock time at which a reconnect attempt is allowed.
    pub connect_delay: Option<Instant>,
    /// Sample rate the (re)encoder was last configured for; `None` before
    /// the first reset. Used to detect samplerate changes across tracks.
    pub encoder_sample_rate: Option<u32>,
}

impl StreamRuntimeState {
    #[must_use]
    pub fn can_connect(&self, now: Instant) -> bool {
        self.connect_delay.is_none_or(|delay| now >= delay)
    }

    /// More than 10 consecutive errors within a track is process-fatal for
    /// this stream.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.errs > 10
    }
}
