// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Built-in playlist source: a plain text file, one track path per line.

use aurocast_core::playlist::PlaylistSource;
use rand::seq::SliceRandom;
use std::fs;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;
use std::time::SystemTime;

/// Reads track paths sequentially from a text file, reloading it when its
/// mtime advances and rewinding to the top at end of file.
pub struct BuiltinPlaylist {
    path: PathBuf,
    randomize: bool,
    reader: Option<BufReader<fs::File>>,
    modtime: Option<SystemTime>,
    lineno: u64,
}

impl BuiltinPlaylist {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, randomize: bool) -> Self {
        let mut pl = Self { path: path.into(), randomize, reader: None, modtime: None, lineno: 0 };
        pl.open();
        pl
    }

    fn open(&mut self) {
        let Ok(file) = fs::File::open(&self.path) else {
            tracing::error!(path = %self.path.display(), "could not open playlist file");
            self.reader = None;
            return;
        };
        self.modtime = file.metadata().ok().and_then(|m| m.modified().ok());

        if self.randomize {
            match self.shuffled_tempfile() {
                Ok(shuffled) => {
                    self.reader = Some(BufReader::new(shuffled));
                    self.lineno = 0;
                    return;
                }
                Err(err) => {
                    tracing::error!(%err, "failed to build randomized playlist, using file as-is");
                }
            }
        }

        self.reader = Some(BufReader::new(file));
        self.lineno = 0;
    }

    /// Reads every line, shuffles in memory, and writes the result to an
    /// unlinked tempfile so sequential reads behave the same as the
    /// non-randomized path.
    fn shuffled_tempfile(&self) -> std::io::Result<fs::File> {
        let contents = fs::read_to_string(&self.path)?;
        let mut lines: Vec<&str> = contents.lines().collect();
        lines.shuffle(&mut rand::thread_rng());

        let tmp = tempfile::tempfile()?;
        let mut writer = std::io::BufWriter::new(tmp);
        for line in lines {
            use std::io::Write;
            writeln!(writer, "{line}")?;
        }
        let mut tmp = writer.into_inner()?;
        tmp.seek(SeekFrom::Start(0))?;
        Ok(tmp)
    }

    fn reload_if_changed(&mut self) -> bool {
        if self.randomize {
            return self.reader.is_some();
        }
        let changed = fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .is_ok_and(|mtime| self.modtime.is_none_or(|prev| mtime > prev));
        if self.reader.is_none() || changed {
            self.open();
        }
        self.reader.is_some()
    }

    fn read_line_retrying_once(&mut self) -> Option<String> {
        let mut retried = false;
        loop {
            let reader = self.reader.as_mut()?;
            let mut buf = String::new();
            let n = reader.read_line(&mut buf).ok()?;
            if n == 0 {
                self.lineno = 0;
                tracing::debug!("reached end of playlist, rewinding");
                let reader = self.reader.as_mut()?;
                if reader.seek(SeekFrom::Start(0)).is_err() {
                    return None;
                }
                continue;
            }
            let trimmed = buf.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() {
                if retried {
                    tracing::error!("unreadable or empty playlist");
                    return None;
                }
                retried = true;
                continue;
            }
            self.lineno += 1;
            return Some(trimmed.to_string());
        }
    }
}

impl PlaylistSource for BuiltinPlaylist {
    fn next(&mut self) -> Option<String> {
        if !self.reload_if_changed() {
            return None;
        }
        self.read_line_retrying_once()
    }

    fn lineno(&self) -> u64 {
        self.lineno
    }

    fn metadata_override(&self) -> Option<String> {
        None
    }

    fn timelimit_seconds(&self) -> u64 {
        0
    }

    fn reload(&mut self) {
        self.open();
    }

    fn shutdown(&mut self) {
        self.reader = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_playlist(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("playlist.txt");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_playlist(&dir, "a.mp3\nb.mp3\nc.mp3\n");
        let mut pl = BuiltinPlaylist::new(&path, false);

        assert_eq!(pl.next(), Some("a.mp3".to_string()));
        assert_eq!(pl.lineno(), 1);
        assert_eq!(pl.next(), Some("b.mp3".to_string()));
        assert_eq!(pl.next(), Some("c.mp3".to_string()));
        assert_eq!(pl.lineno(), 3);
    }

    #[test]
    fn rewinds_at_end_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_playlist(&dir, "a.mp3\nb.mp3\n");
        let mut pl = BuiltinPlaylist::new(&path, false);

        assert_eq!(pl.next(), Some("a.mp3".to_string()));
        assert_eq!(pl.next(), Some("b.mp3".to_string()));
        assert_eq!(pl.next(), Some("a.mp3".to_string()));
        assert_eq!(pl.lineno(), 1);
    }

    #[test]
    fn skips_a_single_blank_line_then_gives_up_if_still_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_playlist(&dir, "\n\na.mp3\n");
        let mut pl = BuiltinPlaylist::new(&path, false);

        assert_eq!(pl.next(), Some("a.mp3".to_string()));
    }

    #[test]
    fn strips_trailing_carriage_return() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_playlist(&dir, "a.mp3\r\nb.mp3\r\n");
        let mut pl = BuiltinPlaylist::new(&path, false);

        assert_eq!(pl.next(), Some("a.mp3".to_string()));
        assert_eq!(pl.next(), Some("b.mp3".to_string()));
    }

    #[test]
    fn missing_file_yields_no_tracks() {
        let mut pl = BuiltinPlaylist::new("/nonexistent/playlist.txt", false);
        assert_eq!(pl.next(), None);
    }

    #[test]
    fn randomized_playlist_contains_same_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_playlist(&dir, "a.mp3\nb.mp3\nc.mp3\nd.mp3\n");
        let mut pl = BuiltinPlaylist::new(&path, true);

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(pl.next().unwrap());
        }
        seen.sort();
        assert_eq!(seen, vec!["a.mp3", "b.mp3", "c.mp3", "d.mp3"]);
    }
}
