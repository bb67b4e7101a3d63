// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! PCM decode via `symphonia`, shared across every container this crate
//! probes: packet → `Decoder::decode` → `SampleBuffer` → interleaved
//! samples, pulled synchronously since the pipeline here is the
//! single-threaded cooperative loop the orchestrator drives.

use aurocast_core::error::{AurocastError, Result};
use aurocast_core::input_stream::PcmSource;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::{MetadataOptions, StandardTagKey};
use symphonia::core::probe::Hint;

/// Artist/title read from a container's native tags (Vorbis comments, MP4
/// iTunes atoms, FLAC `VORBIS_COMMENT`), if symphonia surfaced any.
#[derive(Debug, Clone, Default)]
pub struct ContainerTags {
    pub artist: Option<String>,
    pub title: Option<String>,
}

/// Opens `path` for symphonia decode, returning the PCM source alongside
/// its sample rate, channel count, and any native container tags.
///
/// # Errors
///
/// Returns `AurocastError::Codec` if the container can't be probed, has no
/// default audio track, or no codec is registered for it.
pub fn open_pcm_source(path: &Path) -> Result<(SymphoniaPcmSource, u32, u8, ContainerTags)> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    build_pcm_source(mss, hint)
}

/// Same as [`open_pcm_source`] but over an in-memory buffer, used for the
/// stdin (`-`) playlist entry: stdin isn't seekable, and symphonia's format
/// readers need to be, so the whole track is buffered up front instead of
/// streamed incrementally.
pub fn open_pcm_source_from_bytes(
    data: Vec<u8>,
) -> Result<(SymphoniaPcmSource, u32, u8, ContainerTags)> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), MediaSourceStreamOptions::default());
    build_pcm_source(mss, Hint::new())
}

fn build_pcm_source(
    mss: MediaSourceStream,
    hint: Hint,
) -> Result<(SymphoniaPcmSource, u32, u8, ContainerTags)> {
    let mut probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AurocastError::Codec(format!("symphonia probe failed: {e}")))?;

    let tags = read_container_tags(&mut probed.format);

    let track = probed
        .format
        .default_track()
        .ok_or_else(|| AurocastError::Codec("no default audio track".into()))?;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| AurocastError::Codec("unknown sample rate".into()))?;
    let channel_count = codec_params
        .channels
        .ok_or_else(|| AurocastError::Codec("unknown channel layout".into()))?
        .count();
    let channels = u8::try_from(channel_count).unwrap_or(2);
    let track_id = track.id;

    let decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AurocastError::Codec(format!("failed to create decoder: {e}")))?;

    let source = SymphoniaPcmSource {
        format: probed.format,
        decoder,
        track_id,
        channels: channel_count,
        left: VecDeque::new(),
        right: VecDeque::new(),
        sample_buf: None,
    };

    Ok((source, sample_rate, channels, tags))
}

fn read_container_tags(format: &mut Box<dyn FormatReader>) -> ContainerTags {
    let mut tags = ContainerTags::default();
    let Some(rev) = format.metadata().skip_to_latest().cloned() else {
        return tags;
    };
    for tag in rev.tags() {
        match tag.std_key {
            Some(StandardTagKey::Artist) => tags.artist = Some(tag.value.to_string()),
            Some(StandardTagKey::TrackTitle) => tags.title = Some(tag.value.to_string()),
            _ => {}
        }
    }
    tags
}

/// Decodes packets from a probed container into parallel `i16` frame
/// queues, handing out `max_frames` at a time.
pub struct SymphoniaPcmSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: usize,
    left: VecDeque<i16>,
    right: VecDeque<i16>,
    sample_buf: Option<SampleBuffer<i16>>,
}

impl SymphoniaPcmSource {
    /// Decodes one more packet into the internal frame queues. Returns
    /// `false` at end of stream.
    fn decode_next_packet(&mut self) -> Result<bool> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false)
                }
                Err(e) => return Err(AurocastError::Codec(format!("demux error: {e}"))),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(audio_buf) => {
                    if self.sample_buf.is_none() {
                        let spec = *audio_buf.spec();
                        let duration = audio_buf.capacity() as u64;
                        self.sample_buf = Some(SampleBuffer::<i16>::new(duration, spec));
                    }
                    let buf = self.sample_buf.as_mut().expect("just initialized");
                    buf.copy_interleaved_ref(audio_buf);
                    let samples = buf.samples();

                    if self.channels >= 2 {
                        for frame in samples.chunks_exact(self.channels) {
                            self.left.push_back(frame[0]);
                            self.right.push_back(frame[1]);
                        }
                    } else {
                        for &s in samples {
                            self.left.push_back(s);
                            self.right.push_back(s);
                        }
                    }
                    return Ok(true);
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    tracing::warn!(error = %err, "skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(AurocastError::Codec(format!("decode failed: {e}"))),
            }
        }
    }
}

impl PcmSource for SymphoniaPcmSource {
    fn read_pcm(
        &mut self,
        max_frames: usize,
        left: &mut Vec<i16>,
        right: &mut Vec<i16>,
    ) -> Result<usize> {
        while self.left.len() < max_frames {
            if !self.decode_next_packet()? {
                break;
            }
        }
        let n = max_frames.min(self.left.len());
        left.clear();
        right.clear();
        left.extend(self.left.drain(..n));
        right.extend(self.right.drain(..n));
        Ok(n)
    }
}
