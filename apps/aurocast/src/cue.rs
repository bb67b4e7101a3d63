// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The "now playing" cue file: a small plaintext status file rewritten on
//! every progress tick so an external tool (a now-playing display, a web
//! page generator) can poll it without talking to us directly.

use aurocast_core::input_stream::InputStream;
use aurocast_core::metadata::MetadataUpdate;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Writes the eight-line cue file format: path, size, bitrate, elapsed
/// time, percent played, playlist line number, artist, title.
pub struct CueWriter {
    path: PathBuf,
}

fn file_time(bitrate_kbps: u32, file_size: u64) -> String {
    if bitrate_kbps == 0 {
        return "0:0:0:0".to_string();
    }
    let seconds = file_size / (u64::from(bitrate_kbps) * 125);
    let days = seconds / 86400;
    let remains = seconds % 86400;
    let hours = remains / 3600;
    let remains = remains % 3600;
    let minutes = remains / 60;
    let seconds = remains % 60;
    format!("{days}:{hours}:{minutes}:{seconds}")
}

fn percent(bytes_read: u64, file_size: u64) -> f64 {
    if file_size == 0 {
        return 0.0;
    }
    (bytes_read as f64 / file_size as f64) * 100.0
}

impl CueWriter {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Derives the default cue path `<base_directory>/aurocast.cue`.
    #[must_use]
    pub fn default_path(base_directory: &str) -> PathBuf {
        Path::new(base_directory).join("aurocast.cue")
    }

    /// Rewrites the cue file from the current track and playlist position.
    ///
    /// Writes to a sibling `.tmp` file and renames it over the real path,
    /// so a reader never observes a half-written cue file.
    ///
    /// # Errors
    ///
    /// Returns an error if the tmp file cannot be written or the rename
    /// fails. Callers should log and continue rather than treat this as
    /// fatal, matching the original tool's behavior of skipping an update
    /// on open failure.
    pub fn update(
        &self,
        source: &InputStream,
        metadata: &MetadataUpdate,
        playlist_lineno: usize,
    ) -> io::Result<()> {
        let tmp_path = tmp_path_for(&self.path);
        let mut file = File::create(&tmp_path)?;
        write!(
            file,
            "{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n",
            source.path,
            source.file_size,
            source.bitrate_kbps,
            file_time(source.bitrate_kbps, source.file_size),
            percent(source.bytes_read, source.file_size),
            playlist_lineno,
            metadata.artist.as_deref().unwrap_or(""),
            metadata.title.as_deref().unwrap_or(""),
        )?;
        drop(file);
        std::fs::rename(&tmp_path, &self.path)
    }

    /// Removes the cue file. Failure is not an error: the file may simply
    /// never have been written (e.g. no track played before shutdown).
    pub fn remove(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurocast_core::input_stream::{CompressedSource, DecodeCapability, InputKind};
    use aurocast_core::error::Result;

    struct FakeCompressed;
    impl CompressedSource for FakeCompressed {
        fn read_compressed(&mut self, _buf: &mut [u8]) -> Result<usize> {
            Ok(0)
        }
    }

    fn source(file_size: u64, bytes_read: u64, bitrate_kbps: u32) -> InputStream {
        let mut s = InputStream::new(
            InputKind::Mp3,
            "/music/track.mp3".into(),
            file_size,
            bitrate_kbps,
            44100,
            2,
            DecodeCapability::Compressed(Box::new(FakeCompressed)),
        );
        s.bytes_read = bytes_read;
        s
    }

    #[test]
    fn writes_eight_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cue");
        let writer = CueWriter::new(&path);
        let src = source(160_000, 80_000, 128);
        let meta = MetadataUpdate {
            artist: Some("Artist".into()),
            title: Some("Title".into()),
            playlist_override: None,
            filename_fallback: "track".into(),
        };

        writer.update(&src, &meta, 7).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "/music/track.mp3");
        assert_eq!(lines[1], "160000");
        assert_eq!(lines[2], "128");
        assert_eq!(lines[3], "0:0:0:10");
        assert_eq!(lines[4], "50");
        assert_eq!(lines[5], "7");
        assert_eq!(lines[6], "Artist");
        assert_eq!(lines[7], "Title");
    }

    #[test]
    fn zero_bitrate_yields_zero_time() {
        assert_eq!(file_time(0, 1000), "0:0:0:0");
    }

    #[test]
    fn percent_of_empty_file_is_zero() {
        assert_eq!(percent(0, 0), 0.0);
    }

    #[test]
    fn missing_artist_and_title_write_empty_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cue");
        let writer = CueWriter::new(&path);
        let src = source(0, 0, 0);
        let meta = MetadataUpdate::default();

        writer.update(&src, &meta, 0).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[6], "");
        assert_eq!(lines[7], "");
    }

    #[test]
    fn remove_does_not_error_when_file_absent() {
        let writer = CueWriter::new("/nonexistent/path/does-not-exist.cue");
        writer.remove();
    }
}
