// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `open_track`: the full `open(path) → InputStream` pipeline — prologue
//! sniffing, format dispatch, ID3/native-tag extraction, and wiring up
//! both the compressed-passthrough and PCM decode capabilities.

use crate::decode::{open_pcm_source, open_pcm_source_from_bytes};
use crate::probe::detect_format;
use aurocast_core::error::{AurocastError, Result};
use aurocast_core::input_stream::{CompressedSource, DecodeCapability, InputKind, InputStream};
use aurocast_mp3::id3::{decode_synchsafe4, parse_id3v1, parse_id3v2};
use aurocast_mp3::sync::{synchronise, trim_trailing_frame, BitrateMode};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const PROLOGUE_LEN: usize = 4096;
const ID3V1_LEN: u64 = 128;

/// Result of opening one playlist entry: the constructed `InputStream`
/// plus whatever metadata the container's native tags carried.
pub struct ProbedTrack {
    pub stream: InputStream,
    pub artist: Option<String>,
    pub title: Option<String>,
}

/// Opens `path` (or reads all of stdin if `path == "-"`), sniffs its
/// container format, and builds the matching `InputStream`.
///
/// # Errors
///
/// Returns an error if the file can't be opened, its prologue matches no
/// supported format, or (for MP3) no valid frame sync can be found.
pub fn open_track(path: &str) -> Result<ProbedTrack> {
    if path == "-" {
        return open_stdin_track();
    }
    open_file_track(Path::new(path))
}

fn open_stdin_track() -> Result<ProbedTrack> {
    let mut data = Vec::new();
    std::io::stdin().read_to_end(&mut data)?;
    if detect_format(&data).is_none() {
        return Err(AurocastError::Parse("unrecognized container on stdin".into()));
    }
    let (pcm, sample_rate, channels, tags) = open_pcm_source_from_bytes(data)?;
    let stream = InputStream::new(
        InputKind::Mp3,
        "-".to_string(),
        0,
        0,
        sample_rate,
        channels,
        DecodeCapability::Pcm(Box::new(pcm)),
    );
    Ok(ProbedTrack { stream, artist: tags.artist, title: tags.title })
}

fn open_file_track(path: &Path) -> Result<ProbedTrack> {
    let mut file = File::open(path)?;
    let file_size = file.metadata()?.len();

    let mut prologue = vec![0u8; PROLOGUE_LEN.min(file_size as usize)];
    file.read_exact(&mut prologue)?;

    let kind = detect_format(&prologue)
        .ok_or_else(|| AurocastError::Parse(format!("unrecognized container: {}", path.display())))?;

    match kind {
        InputKind::Mp3 => open_mp3_track(path, file, file_size, &prologue),
        _ => open_pcm_only_track(path, kind, file_size),
    }
}

fn open_pcm_only_track(path: &Path, kind: InputKind, file_size: u64) -> Result<ProbedTrack> {
    let (pcm, sample_rate, channels, tags) = open_pcm_source(path)?;
    let stream = InputStream::new(
        kind,
        path.display().to_string(),
        file_size,
        0,
        sample_rate,
        channels,
        DecodeCapability::Pcm(Box::new(pcm)),
    );
    Ok(ProbedTrack { stream, artist: tags.artist, title: tags.title })
}

fn open_mp3_track(
    path: &Path,
    mut file: File,
    mut file_size: u64,
    prologue: &[u8],
) -> Result<ProbedTrack> {
    let mut audio_start = 0usize;
    let mut artist = None;
    let mut title = None;
    let mut gain_db = 0.0;

    if prologue.starts_with(b"ID3") && prologue.len() >= 10 {
        let major_version = prologue[3];
        let flags = prologue[5];
        let tag_len = decode_synchsafe4(&[prologue[6], prologue[7], prologue[8], prologue[9]]);
        let body_start = 10usize;
        let body_end = (body_start + tag_len as usize).min(prologue.len());
        let tags = parse_id3v2(major_version, flags, tag_len, &prologue[body_start..body_end]);
        artist = tags.artist;
        title = tags.title;
        gain_db = tags.replaygain_track_gain_db.unwrap_or(0.0);
        audio_start = body_start + tag_len as usize;
    }

    if file_size >= ID3V1_LEN {
        let mut tail = [0u8; ID3V1_LEN as usize];
        file.seek(SeekFrom::Start(file_size - ID3V1_LEN))?;
        file.read_exact(&mut tail)?;
        if let Some(tags) = parse_id3v1(&tail) {
            if artist.is_none() {
                artist = tags.artist;
            }
            if title.is_none() {
                title = tags.title;
            }
            file_size -= ID3V1_LEN;
        }
    }

    let search_start = audio_start.min(prologue.len());
    let (offset, header, mode) = synchronise(&prologue[search_start..])
        .ok_or_else(|| AurocastError::Parse(format!("no MPEG frame sync found: {}", path.display())))?;
    audio_start += offset;

    if file_size > audio_start as u64 {
        let tail_len = 8192u64.min(file_size - audio_start as u64);
        let tail_start = file_size - tail_len;
        let mut tail = vec![0u8; tail_len as usize];
        file.seek(SeekFrom::Start(tail_start))?;
        file.read_exact(&mut tail)?;
        file_size = trim_trailing_frame(&tail, tail_start, file_size, &header);
    }

    let bitrate_kbps = match mode {
        BitrateMode::Constant(kbps) => kbps,
        BitrateMode::Variable => 0,
    };

    let audio_len = file_size.saturating_sub(audio_start as u64);
    let compressed = FileCompressedSource::new(path, audio_start as u64, audio_len)?;

    let (pcm, decoded_sample_rate, decoded_channels, _container_tags) = open_pcm_source(path)?;
    let _ = decoded_channels; // frame header's channel count is authoritative for the wire format

    let mut stream = InputStream::new(
        InputKind::Mp3,
        path.display().to_string(),
        file_size,
        bitrate_kbps,
        decoded_sample_rate.max(header.sample_rate_hz),
        header.channels,
        DecodeCapability::Both(Box::new(compressed), Box::new(pcm)),
    );
    stream.replaygain_track_gain_db = gain_db;

    Ok(ProbedTrack { stream, artist, title })
}

/// Serves raw bytes from `[start, start + len)` of a file, for
/// compressed-passthrough sends. Never reads past `len` bytes, which is
/// how a trimmed ID3v1 tag or trailing junk frame is hidden from the wire.
struct FileCompressedSource {
    file: File,
    served: u64,
    len: u64,
}

impl FileCompressedSource {
    fn new(path: &Path, start: u64, len: u64) -> Result<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(start))?;
        Ok(Self { file, served: 0, len })
    }
}

impl CompressedSource for FileCompressedSource {
    fn read_compressed(&mut self, buf: &mut [u8]) -> Result<usize> {
        let remaining = self.len.saturating_sub(self.served);
        if remaining == 0 {
            return Ok(0);
        }
        let cap = (buf.len() as u64).min(remaining) as usize;
        let n = self.file.read(&mut buf[..cap])?;
        self.served += n as u64;
        Ok(n)
    }
}
