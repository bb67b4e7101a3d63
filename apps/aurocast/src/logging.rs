// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Console + file logging, with the file handle reopenable on SIGHUP so an
//! external log rotator can rename the old file out from under us.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// A file writer tracing can keep handing out clones of, whose underlying
/// fd can be swapped out via `reopen()` without restarting the process.
pub struct ReopenableFileWriter {
    path: PathBuf,
    file: Mutex<File>,
}

impl ReopenableFileWriter {
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;
        Ok(Self { path, file: Mutex::new(file) })
    }

    /// Closes the current handle and reopens `path`, picking up a file a
    /// rotator may have moved the old inode out from under.
    pub fn reopen(&self) -> io::Result<()> {
        let new_file = open_append(&self.path)?;
        *self.file.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = new_file;
        Ok(())
    }
}

#[derive(Clone)]
pub struct ArcFileWriter(pub Arc<ReopenableFileWriter>);

impl Write for ArcFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.file.lock().unwrap_or_else(std::sync::PoisonError::into_inner).write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.0.file.lock().unwrap_or_else(std::sync::PoisonError::into_inner).flush()
    }
}

impl<'a> MakeWriter<'a> for ArcFileWriter {
    type Writer = ArcFileWriter;
    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initializes console logging always, and file logging when `log_path` is
/// non-empty. Returns the file writer handle, which the caller must keep
/// alive and hand to `signals::install` so SIGHUP can reopen it.
///
/// # Errors
///
/// Returns an error if `log_path` is set but the file cannot be opened.
pub fn init_logging(
    log_level: &str,
    verbose: bool,
    log_path: &str,
) -> io::Result<Option<Arc<ReopenableFileWriter>>> {
    let effective_level = if verbose { "debug" } else { log_level };

    let console_layer =
        tracing_subscriber::fmt::layer().with_filter(level_filter(effective_level));

    let file_writer = if log_path.is_empty() {
        None
    } else {
        Some(Arc::new(ReopenableFileWriter::new(log_path)?))
    };

    match &file_writer {
        Some(writer) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(ArcFileWriter(writer.clone()))
                .with_ansi(false)
                .with_filter(level_filter(effective_level));
            tracing_subscriber::registry().with(console_layer).with(file_layer).init();
        }
        None => {
            tracing_subscriber::registry().with(console_layer).init();
        }
    }

    Ok(file_writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn reopen_picks_up_a_renamed_away_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aurocast.log");
        let writer = ReopenableFileWriter::new(&path).unwrap();

        {
            let mut f = writer.file.lock().unwrap();
            f.write_all(b"before rotate\n").unwrap();
        }

        std::fs::rename(&path, dir.path().join("aurocast.log.1")).unwrap();
        writer.reopen().unwrap();

        {
            let mut f = writer.file.lock().unwrap();
            f.write_all(b"after rotate\n").unwrap();
        }

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "after rotate\n");
    }
}
