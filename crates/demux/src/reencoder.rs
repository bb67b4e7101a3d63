// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Re-encoder adapter: turns PCM back into compressed bytes for output
//! streams that can't take the source's compressed form as-is.

use aurocast_core::error::{AurocastError, Result};
use aurocast_core::input_stream::InputStream;
use aurocast_core::output_stream::OutputStreamConfig;
use lame::Lame;

/// Initial/step size for the encoded-output buffer, matching a
/// conservative single-call LAME output.
const OUTPUT_STEP: usize = 32_768;
/// Fixed overhead LAME reserves regardless of input size.
const ENCODER_OVERHEAD: usize = 7200;

/// Returns `true` if `stream` cannot simply relay `source`'s compressed
/// bytes and must go through the re-encoder instead.
///
/// A nonzero ReplayGain adjustment always forces reencoding (gain can only
/// be applied to PCM), independent of format/bitrate matching.
#[must_use]
pub fn needs_reencoding(source: &InputStream, stream: &OutputStreamConfig, track_gain_db: f64) -> bool {
    if track_gain_db != 0.0 {
        return true;
    }
    if !source.capability.has_compressed() {
        return true;
    }
    if source.bitrate_kbps != stream.encoder.bitrate_kbps {
        return true;
    }
    if let Some(out_rate) = stream.encoder.out_sample_rate {
        if source.sample_rate_hz != out_rate {
            return true;
        }
    }
    if let Some(out_channels) = stream.encoder.out_channels {
        if source.channels != out_channels {
            return true;
        }
    }
    false
}

/// A pluggable compressed-output encoder. `Lame` is the only production
/// implementation; the trait exists so tests can substitute a fake one.
pub trait SampleEncoder: Send {
    /// (Re)configures the encoder for a new sample rate/channel count.
    fn reset(&mut self, sample_rate_hz: u32, channels: u8, bitrate_kbps: u32) -> Result<()>;

    /// Encodes one buffer of PCM, writing compressed bytes into `out`.
    /// Returns `Err(AurocastError::Resource(_))` if `out` is too small;
    /// the caller is expected to grow the buffer and retry.
    fn encode(&mut self, left: &[i16], right: &[i16], out: &mut [u8]) -> Result<usize>;

    /// Flushes any buffered encoder state at end of stream.
    fn flush(&mut self, out: &mut [u8]) -> Result<usize>;
}

/// LAME-backed MP3 encoder.
pub struct LameEncoder {
    lame: Option<Lame>,
}

impl LameEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self { lame: None }
    }
}

impl Default for LameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleEncoder for LameEncoder {
    fn reset(&mut self, sample_rate_hz: u32, channels: u8, bitrate_kbps: u32) -> Result<()> {
        let mut lame = Lame::new()
            .ok_or_else(|| AurocastError::Codec("failed to initialize LAME encoder".into()))?;
        lame.set_sample_rate(sample_rate_hz)
            .map_err(|e| AurocastError::Codec(format!("lame set_sample_rate: {e:?}")))?;
        lame.set_channels(channels)
            .map_err(|e| AurocastError::Codec(format!("lame set_channels: {e:?}")))?;
        lame.set_kilobitrate(bitrate_kbps as i32)
            .map_err(|e| AurocastError::Codec(format!("lame set_kilobitrate: {e:?}")))?;
        lame.set_quality(2)
            .map_err(|e| AurocastError::Codec(format!("lame set_quality: {e:?}")))?;
        lame.init_params()
            .map_err(|e| AurocastError::Codec(format!("lame init_params: {e:?}")))?;
        self.lame = Some(lame);
        Ok(())
    }

    fn encode(&mut self, left: &[i16], right: &[i16], out: &mut [u8]) -> Result<usize> {
        let lame = self
            .lame
            .as_mut()
            .ok_or_else(|| AurocastError::Runtime("encoder used before reset".into()))?;
        match lame.encode(left, right, out) {
            Ok(n) => Ok(n),
            Err(_) => Err(AurocastError::Resource("encode buffer too small".into())),
        }
    }

    fn flush(&mut self, out: &mut [u8]) -> Result<usize> {
        let lame = self
            .lame
            .as_mut()
            .ok_or_else(|| AurocastError::Runtime("encoder used before reset".into()))?;
        lame.encode(&[], &[], out)
            .map_err(|_| AurocastError::Resource("flush buffer too small".into()))
    }
}

/// Drives a `SampleEncoder` with a growable output buffer, resetting the
/// encoder whenever the track's sample rate changes underneath it.
pub struct ReencoderAdapter<E: SampleEncoder> {
    encoder: E,
    buffer: Vec<u8>,
    configured_sample_rate: Option<u32>,
}

impl<E: SampleEncoder> ReencoderAdapter<E> {
    #[must_use]
    pub fn new(encoder: E) -> Self {
        Self {
            encoder,
            buffer: vec![0u8; OUTPUT_STEP],
            configured_sample_rate: None,
        }
    }

    /// Resets the encoder if `sample_rate_hz` differs from its last
    /// configuration (a no-op on the first call and on unchanged rate).
    pub fn ensure_configured(&mut self, sample_rate_hz: u32, channels: u8, bitrate_kbps: u32) -> Result<()> {
        if self.configured_sample_rate != Some(sample_rate_hz) {
            self.encoder.reset(sample_rate_hz, channels, bitrate_kbps)?;
            self.configured_sample_rate = Some(sample_rate_hz);
        }
        Ok(())
    }

    /// Encodes `left`/`right` (equal length), growing the internal buffer
    /// as needed, and returns the encoded bytes.
    pub fn encode(&mut self, left: &[i16], right: &[i16]) -> Result<&[u8]> {
        let samples = left.len();
        let needed = ENCODER_OVERHEAD + samples + samples / 4;
        if self.buffer.len() < needed {
            self.buffer.resize(ENCODER_OVERHEAD + 5 * samples / 2, 0);
        }

        loop {
            match self.encoder.encode(left, right, &mut self.buffer) {
                Ok(n) => return Ok(&self.buffer[..n]),
                Err(AurocastError::Resource(_)) => {
                    let grown = self.buffer.len() + OUTPUT_STEP;
                    tracing::debug!(bytes = grown, "growing reencoder output buffer");
                    self.buffer.resize(grown, 0);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Flushes any buffered samples at end of track.
    pub fn flush(&mut self) -> Result<&[u8]> {
        loop {
            match self.encoder.flush(&mut self.buffer) {
                Ok(n) => return Ok(&self.buffer[..n]),
                Err(AurocastError::Resource(_)) => {
                    let grown = self.buffer.len() + OUTPUT_STEP;
                    self.buffer.resize(grown, 0);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurocast_core::input_stream::{CompressedSource, DecodeCapability, InputKind};
    use aurocast_core::output_stream::{EncoderSettings, OutputStreamConfig, Protocol, StreamInfo};

    struct NoopCompressed;
    impl CompressedSource for NoopCompressed {
        fn read_compressed(&mut self, _buf: &mut [u8]) -> Result<usize> {
            Ok(0)
        }
    }

    fn source(bitrate_kbps: u32, sample_rate_hz: u32, channels: u8, compressed: bool) -> InputStream {
        let capability = if compressed {
            DecodeCapability::Compressed(Box::new(NoopCompressed))
        } else {
            DecodeCapability::Pcm(Box::new(FakePcm))
        };
        InputStream::new(
            InputKind::Mp3,
            "t.mp3".into(),
            0,
            bitrate_kbps,
            sample_rate_hz,
            channels,
            capability,
        )
    }

    struct FakePcm;
    impl aurocast_core::input_stream::PcmSource for FakePcm {
        fn read_pcm(&mut self, _max: usize, _l: &mut Vec<i16>, _r: &mut Vec<i16>) -> Result<usize> {
            Ok(0)
        }
    }

    fn stream(bitrate_kbps: u32, out_sample_rate: Option<u32>, out_channels: Option<u8>) -> OutputStreamConfig {
        OutputStreamConfig {
            host: "localhost".into(),
            port: 8000,
            password: "hackme".into(),
            protocol: Protocol::Http,
            mount: "/live".into(),
            dump_file: None,
            info: StreamInfo::default(),
            encoder: EncoderSettings {
                bitrate_kbps,
                out_sample_rate,
                out_channels,
            },
            reencode: true,
        }
    }

    #[test]
    fn matching_compressed_stream_skips_reencoding() {
        let src = source(128, 44100, 2, true);
        let out = stream(128, None, None);
        assert!(!needs_reencoding(&src, &out, 0.0));
    }

    #[test]
    fn bitrate_mismatch_forces_reencoding() {
        let src = source(128, 44100, 2, true);
        let out = stream(192, None, None);
        assert!(needs_reencoding(&src, &out, 0.0));
    }

    #[test]
    fn nonzero_gain_always_forces_reencoding() {
        let src = source(128, 44100, 2, true);
        let out = stream(128, None, None);
        assert!(needs_reencoding(&src, &out, -3.0));
    }

    #[test]
    fn pcm_only_source_always_needs_reencoding() {
        let src = source(128, 44100, 2, false);
        let out = stream(128, None, None);
        assert!(needs_reencoding(&src, &out, 0.0));
    }

    #[test]
    fn samplerate_target_mismatch_forces_reencoding() {
        let src = source(128, 44100, 2, true);
        let out = stream(128, Some(48000), None);
        assert!(needs_reencoding(&src, &out, 0.0));
    }

    struct FakeEncoder {
        min_buffer: usize,
        configured: bool,
    }

    impl SampleEncoder for FakeEncoder {
        fn reset(&mut self, _sample_rate_hz: u32, _channels: u8, _bitrate_kbps: u32) -> Result<()> {
            self.configured = true;
            Ok(())
        }
        fn encode(&mut self, left: &[i16], _right: &[i16], out: &mut [u8]) -> Result<usize> {
            if out.len() < self.min_buffer {
                return Err(AurocastError::Resource("too small".into()));
            }
            Ok(left.len().min(out.len()))
        }
        fn flush(&mut self, out: &mut [u8]) -> Result<usize> {
            Ok(out.len().min(1))
        }
    }

    #[test]
    fn adapter_grows_buffer_until_encode_succeeds() {
        let mut adapter = ReencoderAdapter::new(FakeEncoder {
            min_buffer: OUTPUT_STEP + 100,
            configured: false,
        });
        adapter.ensure_configured(44100, 2, 128).unwrap();
        let left = vec![0i16; 10];
        let right = vec![0i16; 10];
        let encoded = adapter.encode(&left, &right).unwrap();
        assert_eq!(encoded.len(), 10);
    }

    #[test]
    fn adapter_only_resets_encoder_on_samplerate_change() {
        let mut adapter = ReencoderAdapter::new(FakeEncoder {
            min_buffer: 0,
            configured: false,
        });
        adapter.ensure_configured(44100, 2, 128).unwrap();
        assert!(adapter.encoder.configured);
        adapter.encoder.configured = false;
        adapter.ensure_configured(44100, 2, 128).unwrap();
        assert!(!adapter.encoder.configured); // unchanged rate: no reset
        adapter.ensure_configured(48000, 2, 128).unwrap();
        assert!(adapter.encoder.configured); // rate changed: reset
    }
}
