// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Root configuration, layered from defaults, a TOML file, and
//! `AUROCAST_`-prefixed environment variables.

use aurocast_core::output_stream::{EncoderSettings, OutputStreamConfig, Protocol, StreamInfo};
use aurocast_dsp::{CrossfadeConfig, ReplayGainConfig};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// General process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory used for the playlist shuffle scratch file and the cue
    /// file when `cue_file` is relative.
    pub base_directory: String,
    #[serde(default)]
    pub daemon: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Path to the log file; empty disables file logging.
    #[serde(default)]
    pub log_path: String,
    /// Path to the cue file; empty disables cue writing.
    #[serde(default)]
    pub cue_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            base_directory: ".".to_string(),
            daemon: false,
            log_level: default_log_level(),
            log_path: String::new(),
            cue_file: String::new(),
        }
    }
}

/// Built-in text-file playlist settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    pub playlist_file: String,
    #[serde(default)]
    pub randomize: bool,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self { playlist_file: "playlist.txt".to_string(), randomize: false }
    }
}

fn default_protocol() -> Protocol {
    Protocol::Http
}

fn default_mount() -> String {
    "/stream".to_string()
}

fn default_bitrate() -> u32 {
    128
}

/// One destination server, as read from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,
    #[serde(default = "default_mount")]
    pub mount: String,
    pub dump_file: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub public: bool,
    #[serde(default = "default_bitrate")]
    pub bitrate_kbps: u32,
    /// `0` means "match the source".
    #[serde(default)]
    pub out_sample_rate: u32,
    /// `0` means "match the source".
    #[serde(default)]
    pub out_channels: u8,
    #[serde(default = "default_true")]
    pub reencode: bool,
}

impl From<StreamConfig> for OutputStreamConfig {
    fn from(stream: StreamConfig) -> Self {
        Self {
            host: stream.host,
            port: stream.port,
            password: stream.password,
            protocol: stream.protocol,
            mount: stream.mount,
            dump_file: stream.dump_file,
            info: StreamInfo {
                name: stream.name,
                genre: stream.genre,
                description: stream.description,
                url: stream.url,
                public: stream.public,
            },
            encoder: EncoderSettings {
                bitrate_kbps: stream.bitrate_kbps,
                out_sample_rate: (stream.out_sample_rate > 0).then_some(stream.out_sample_rate),
                out_channels: (stream.out_channels > 0).then_some(stream.out_channels),
            },
            reencode: stream.reencode,
        }
    }
}

/// Root configuration for the `aurocast` process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub playlist: PlaylistConfig,
    #[serde(default)]
    pub crossfade: CrossfadeConfig,
    #[serde(default)]
    pub replaygain: ReplayGainConfig,
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
}

#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    pub file_missing: Option<String>,
}

/// Loads configuration from defaults, `config_path` (if present), and
/// `AUROCAST_`-prefixed environment variables (double underscore splits
/// nested keys, e.g. `AUROCAST_GENERAL__LOG_LEVEL`).
///
/// # Errors
///
/// Returns an error if the config file contains invalid TOML, or if any
/// merged value fails to deserialize into `Config`.
pub fn load(config_path: &str) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let mut figment = Figment::new().merge(figment::providers::Serialized::defaults(Config::default()));

    let mut file_missing = None;
    if std::path::Path::new(config_path).exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }

    let config: Config =
        figment.merge(Env::prefixed("AUROCAST_").split("__")).extract().map_err(Box::new)?;

    Ok(ConfigLoadResult { config, file_missing })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let result = load("/nonexistent/aurocast.toml").unwrap();
        assert!(result.file_missing.is_some());
        assert_eq!(result.config.general.base_directory, ".");
        assert_eq!(result.config.crossfade.fade_seconds, 3);
    }

    #[test]
    fn zero_out_sample_rate_means_match_source() {
        let stream = StreamConfig {
            host: "localhost".into(),
            port: 8000,
            password: "hackme".into(),
            protocol: Protocol::Http,
            mount: "/live".into(),
            dump_file: None,
            name: None,
            genre: None,
            description: None,
            url: None,
            public: true,
            bitrate_kbps: 128,
            out_sample_rate: 0,
            out_channels: 0,
            reencode: true,
        };
        let output: OutputStreamConfig = stream.into();
        assert!(output.encoder.out_sample_rate.is_none());
        assert!(output.encoder.out_channels.is_none());
    }
}
