// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The top-level track pipeline: pull a path from the playlist, open it,
//! decide how each output stream wants its bytes, and pump audio until the
//! track ends, is skipped, or hits its time limit.
//!
//! `InputStream` models compressed and PCM access as two independently
//! positioned readers rather than one shared byte buffer a decoder also
//! consumes. When a track needs both (some streams reencoding, others on
//! passthrough) the raw-byte read size is paced from the PCM chunk just
//! decoded via the track's advertised bitrate, so the two readers drift by
//! at most one chunk's worth of audio rather than by unbounded amounts.

use crate::config::Config;
use crate::cue::CueWriter;
use crate::logging::ReopenableFileWriter;
use crate::signals::SignalFlags;
use aurocast_core::error::{AurocastError, Result};
use aurocast_core::metadata::MetadataUpdate;
use aurocast_core::output_stream::OutputStreamConfig;
use aurocast_core::playlist::PlaylistSource;
use aurocast_core::plugin::Plugin;
use aurocast_core::sample::PcmBuffer;
use aurocast_demux::reencoder::{needs_reencoding, LameEncoder, ReencoderAdapter};
use aurocast_demux::{open_track, ProbedTrack};
use aurocast_dsp::{CrossfadeRing, PluginChain, ReplayGainPlugin};
use aurocast_transport::{Connection, ConnectionState, ERROR_DELAY};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Frames of PCM decoded per buffer-loop iteration.
const CHUNK_FRAMES: usize = 4608;
/// Raw bytes read per iteration when no stream needs decoded PCM at all.
const RAW_CHUNK_BYTES: usize = 4096;
/// More than this many consecutive track-open failures is process-fatal.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// One configured output stream plus the reencoder it lazily spins up the
/// first time a track actually needs it.
struct StreamSlot {
    connection: Connection,
    encoder: Option<ReencoderAdapter<LameEncoder>>,
}

/// Per-stream decision for one track: whether it sends reencoded bytes or
/// relays the source's compressed bytes as-is.
struct StreamPlan {
    use_reencoded: bool,
}

/// Result of attempting to play one track, distinguishing failures that
/// never got audio out from failures partway through a track already
/// sending buffers. Only the former counts toward `consecutive_errors`.
enum TrackOutcome {
    Played,
    FailedBeforeSend(AurocastError),
    FailedAfterSend(AurocastError),
}

/// Approximates the raw byte span a PCM chunk of `frames` occupied in the
/// compressed source, from the track's advertised average bitrate.
/// `bitrate_kbps == 0` (VBR/unknown) falls back to reading nothing, since
/// there's no way to pace a passthrough read against an unknown rate.
fn compressed_bytes_for_frames(frames: usize, bitrate_kbps: u32, sample_rate_hz: u32) -> usize {
    if bitrate_kbps == 0 || sample_rate_hz == 0 {
        return 0;
    }
    let bytes_per_sec = u64::from(bitrate_kbps) * 125;
    ((frames as u64 * bytes_per_sec) / u64::from(sample_rate_hz)) as usize
}

fn filename_fallback(path: &str) -> String {
    Path::new(path).file_stem().and_then(|s| s.to_str()).unwrap_or(path).to_string()
}

/// Drives the playlist-to-output-streams pipeline until the playlist is
/// exhausted or every output stream is fatally erroring.
pub struct Orchestrator {
    playlist: Box<dyn PlaylistSource>,
    streams: Vec<StreamSlot>,
    chain: PluginChain,
    crossfade_enabled: bool,
    cue: Option<CueWriter>,
    signals: SignalFlags,
    log_writer: Option<Arc<ReopenableFileWriter>>,
    consecutive_errors: u32,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        config: &Config,
        playlist: Box<dyn PlaylistSource>,
        signals: SignalFlags,
        log_writer: Option<Arc<ReopenableFileWriter>>,
    ) -> Self {
        let streams = config
            .streams
            .iter()
            .cloned()
            .map(|stream_config| StreamSlot {
                connection: Connection::new(OutputStreamConfig::from(stream_config)),
                encoder: None,
            })
            .collect();

        let crossfade_enabled = config.crossfade.fade_seconds > 0;
        let mut candidates: Vec<Box<dyn Plugin>> = vec![Box::new(ReplayGainPlugin::new(config.replaygain))];
        if crossfade_enabled {
            candidates.push(Box::new(CrossfadeRing::new(config.crossfade, 44_100)));
        }
        let chain = PluginChain::build(candidates);

        let cue = (!config.general.cue_file.is_empty())
            .then(|| CueWriter::new(config.general.cue_file.clone()));

        Self {
            playlist,
            streams,
            chain,
            crossfade_enabled,
            cue,
            signals,
            log_writer,
            consecutive_errors: 0,
        }
    }

    /// Runs until the playlist is exhausted or every stream is fatal.
    pub async fn run(mut self) {
        loop {
            if self.signals.take_reload_playlist() {
                self.playlist.reload();
            }
            if let Some(writer) = &self.log_writer {
                if self.signals.take_reopen_log() {
                    if let Err(err) = writer.reopen() {
                        tracing::warn!(%err, "failed to reopen log file");
                    }
                }
            }

            let Some(path) = self.playlist.next() else {
                tracing::info!("playlist exhausted, shutting down");
                break;
            };

            if self.consecutive_errors > MAX_CONSECUTIVE_ERRORS {
                tracing::error!("too many consecutive track errors, shutting down");
                break;
            }

            match self.play_track(&path).await {
                TrackOutcome::Played => self.consecutive_errors = 0,
                TrackOutcome::FailedBeforeSend(err) => {
                    tracing::warn!(path = %path, error = %err, "failed to open track");
                    self.consecutive_errors += 1;
                }
                TrackOutcome::FailedAfterSend(err) => {
                    tracing::warn!(path = %path, error = %err, "track aborted after sending audio");
                }
            }

            if !self.streams.is_empty() && self.streams.iter().all(|s| s.connection.is_fatal()) {
                tracing::error!("every output stream is fatally erroring, shutting down");
                break;
            }
        }
        self.shutdown().await;
    }

    async fn play_track(&mut self, path: &str) -> TrackOutcome {
        let mut probed = match open_track(path).and_then(|p| {
            self.validate_capability(&p)?;
            Ok(p)
        }) {
            Ok(probed) => probed,
            Err(err) => return TrackOutcome::FailedBeforeSend(err),
        };

        if self.playlist.timelimit_seconds() > 0 {
            probed.stream.interrupt_deadline =
                Some(Instant::now() + Duration::from_secs(self.playlist.timelimit_seconds()));
        }

        for slot in &mut self.streams {
            slot.connection.reset_errors();
        }

        self.chain.new_track(&probed.stream);

        let metadata = MetadataUpdate {
            artist: probed.artist.clone(),
            title: probed.title.clone(),
            playlist_override: self.playlist.metadata_override(),
            filename_fallback: filename_fallback(path),
        };
        let song = metadata.resolve_song();
        for slot in &mut self.streams {
            if let Err(err) = slot.connection.set_metadata(&song).await {
                tracing::debug!(error = %err, "metadata request failed this track");
            }
        }

        self.stream_buffers(&mut probed, &metadata).await
    }

    /// Rejects a PCM-only track (no compressed capability) if any
    /// configured stream is passthrough-only and so has no way to receive
    /// it, mirroring the original's "cannot play without reencoding" guard.
    fn validate_capability(&self, probed: &ProbedTrack) -> Result<()> {
        if probed.stream.capability.has_compressed() {
            return Ok(());
        }
        let has_passthrough_only = self.streams.iter().any(|s| !s.connection.config().reencode);
        if has_passthrough_only {
            return Err(format!(
                "cannot play {} without reencoding: no compressed source and a passthrough-only stream is configured",
                probed.stream.path
            )
            .into());
        }
        Ok(())
    }

    async fn stream_buffers(&mut self, probed: &mut ProbedTrack, metadata: &MetadataUpdate) -> TrackOutcome {
        let gain_db = probed.stream.replaygain_track_gain_db;
        let plans: Vec<StreamPlan> = self
            .streams
            .iter()
            .map(|s| {
                let reencode_needed = needs_reencoding(&probed.stream, s.connection.config(), gain_db);
                StreamPlan { use_reencoded: s.connection.config().reencode && (self.crossfade_enabled || reencode_needed) }
            })
            .collect();
        let decode_active = self.crossfade_enabled || plans.iter().any(|p| p.use_reencoded);
        let passthrough_needed = plans.iter().any(|p| !p.use_reencoded);

        let mut pcm_buf = PcmBuffer::with_capacity(CHUNK_FRAMES);
        let mut raw_buf = Vec::new();
        let mut sent_any = false;

        loop {
            if self.signals.take_skip_track() {
                tracing::debug!("skipping current track on request");
                break;
            }
            if probed.stream.deadline_exceeded(Instant::now()) {
                tracing::debug!("track time limit reached");
                break;
            }

            let frames = if decode_active {
                let pcm = probed
                    .stream
                    .capability
                    .pcm_mut()
                    .expect("decode_active implies a PCM reader is present");
                match pcm.read_pcm(CHUNK_FRAMES, &mut pcm_buf.left, &mut pcm_buf.right) {
                    Ok(n) => n,
                    Err(err) => return Self::abort_track(sent_any, err),
                }
            } else {
                0
            };

            if decode_active {
                if frames == 0 {
                    break;
                }
                let frames = self.chain.process(frames, &mut pcm_buf.left, &mut pcm_buf.right);
                if frames == 0 {
                    continue;
                }
                pcm_buf.truncate(frames);

                if passthrough_needed {
                    let want = compressed_bytes_for_frames(
                        frames,
                        probed.stream.bitrate_kbps,
                        probed.stream.sample_rate_hz,
                    );
                    raw_buf.resize(want.max(1), 0);
                    let compressed = probed
                        .stream
                        .capability
                        .compressed_mut()
                        .expect("a passthrough stream requires a compressed reader");
                    let n = match compressed.read_compressed(&mut raw_buf) {
                        Ok(n) => n,
                        Err(err) => return Self::abort_track(sent_any, err),
                    };
                    raw_buf.truncate(n);
                    probed.stream.bytes_read += n as u64;
                } else {
                    probed.stream.bytes_read += compressed_bytes_for_frames(
                        frames,
                        probed.stream.bitrate_kbps,
                        probed.stream.sample_rate_hz,
                    ) as u64;
                }

                let _ = self
                    .send_to_streams(&plans, &pcm_buf, &raw_buf, probed.stream.sample_rate_hz, probed.stream.channels)
                    .await;
                sent_any = true;
            } else {
                raw_buf.resize(RAW_CHUNK_BYTES, 0);
                let compressed = probed
                    .stream
                    .capability
                    .compressed_mut()
                    .expect("raw-only mode requires a compressed reader");
                let n = match compressed.read_compressed(&mut raw_buf) {
                    Ok(n) => n,
                    Err(err) => return Self::abort_track(sent_any, err),
                };
                if n == 0 {
                    break;
                }
                raw_buf.truncate(n);
                probed.stream.bytes_read += n as u64;
                for slot in &mut self.streams {
                    let _ = slot.connection.send(&raw_buf, Instant::now()).await;
                }
                sent_any = true;
            }

            if let Some(cue) = &self.cue {
                let lineno = self.playlist.lineno() as usize;
                if let Err(err) = cue.update(&probed.stream, metadata, lineno) {
                    tracing::debug!(%err, "failed to update cue file");
                }
            }

            if self.all_connections_errored() {
                tokio::time::sleep(ERROR_DELAY).await;
            }
        }

        // Flushing pads the encoder's internal buffer out to a full frame;
        // skip it while crossfading continuously reencodes across the track
        // boundary, or every flush injects an audible padding artifact.
        if !self.crossfade_enabled {
            self.flush_encoders().await;
        }
        TrackOutcome::Played
    }

    /// Builds the outcome for a mid-track read/decode failure, per the
    /// error taxonomy: it only counts toward `consecutive_errors` if the
    /// track never got any audio out.
    fn abort_track(sent_any: bool, err: AurocastError) -> TrackOutcome {
        if sent_any {
            TrackOutcome::FailedAfterSend(err)
        } else {
            TrackOutcome::FailedBeforeSend(err)
        }
    }

    async fn send_to_streams(
        &mut self,
        plans: &[StreamPlan],
        pcm_buf: &PcmBuffer,
        raw_buf: &[u8],
        sample_rate_hz: u32,
        channels: u8,
    ) -> Result<()> {
        for (slot, plan) in self.streams.iter_mut().zip(plans) {
            let now = Instant::now();
            let result = if plan.use_reencoded {
                let config = slot.connection.config();
                let rate = config.encoder.out_sample_rate.unwrap_or(sample_rate_hz);
                let out_channels = config.encoder.out_channels.unwrap_or(channels);
                let bitrate = config.encoder.bitrate_kbps;
                let adapter = slot.encoder.get_or_insert_with(|| ReencoderAdapter::new(LameEncoder::new()));
                match adapter.ensure_configured(rate, out_channels, bitrate) {
                    Ok(()) => match adapter.encode(&pcm_buf.left, &pcm_buf.right) {
                        Ok(bytes) => slot.connection.send(bytes, now).await,
                        Err(err) => Err(err),
                    },
                    Err(err) => Err(err),
                }
            } else {
                slot.connection.send(raw_buf, now).await
            };
            if let Err(err) = result {
                tracing::debug!(mount = %slot.connection.config().mount, error = %err, "send failed this iteration");
            }
        }
        Ok(())
    }

    /// `true` once every configured stream's last send attempt errored,
    /// gating the shared `ERROR_DELAY` sleep so a dead server farm doesn't
    /// spin the audio loop at full speed.
    fn all_connections_errored(&self) -> bool {
        !self.streams.is_empty()
            && self.streams.iter().all(|s| s.connection.state() != ConnectionState::Connected)
    }

    async fn flush_encoders(&mut self) {
        for slot in &mut self.streams {
            if let Some(adapter) = &mut slot.encoder {
                if let Ok(bytes) = adapter.flush() {
                    if !bytes.is_empty() {
                        let _ = slot.connection.send(bytes, Instant::now()).await;
                    }
                }
            }
        }
    }

    async fn shutdown(mut self) {
        for slot in &mut self.streams {
            slot.connection.close().await;
        }
        self.chain.shutdown();
        self.playlist.shutdown();
        if let Some(cue) = &self.cue {
            cue.remove();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacing_formula_matches_bitrate_at_one_second() {
        // 128kbps for a full second of 44100Hz audio is 16000 bytes.
        assert_eq!(compressed_bytes_for_frames(44_100, 128, 44_100), 16_000);
    }

    #[test]
    fn pacing_formula_is_zero_for_vbr() {
        assert_eq!(compressed_bytes_for_frames(4_608, 0, 44_100), 0);
    }

    #[test]
    fn filename_fallback_strips_directory_and_extension() {
        assert_eq!(filename_fallback("/music/Artist/01 - Track.mp3"), "01 - Track");
    }

    #[test]
    fn filename_fallback_handles_stdin_marker() {
        assert_eq!(filename_fallback("-"), "-");
    }
}
