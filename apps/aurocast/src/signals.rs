// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! SIGHUP ("reopen the log, reload the playlist") and SIGUSR1 ("skip the
//! current track") handling. Signal handlers here never touch anything but
//! these two volatile flags; the orchestrator samples them at safe points.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};

#[derive(Clone, Default)]
pub struct SignalFlags {
    reopen_log: Arc<AtomicBool>,
    reload_playlist: Arc<AtomicBool>,
    skip_track: Arc<AtomicBool>,
}

impl SignalFlags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples and clears the "reopen log" flag.
    pub fn take_reopen_log(&self) -> bool {
        self.reopen_log.swap(false, Ordering::AcqRel)
    }

    /// Samples and clears the "reload playlist" flag.
    pub fn take_reload_playlist(&self) -> bool {
        self.reload_playlist.swap(false, Ordering::AcqRel)
    }

    /// Samples and clears the "skip current track" flag.
    pub fn take_skip_track(&self) -> bool {
        self.skip_track.swap(false, Ordering::AcqRel)
    }
}

/// Spawns background tasks that translate SIGHUP/SIGUSR1 into the volatile
/// flags in `flags`. Runs until the process exits.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be installed (e.g. the
/// signal is already handled by another registration on this platform).
pub fn install(flags: SignalFlags) -> std::io::Result<()> {
    let mut hup = signal(SignalKind::hangup())?;
    let hup_flags = flags.clone();
    tokio::spawn(async move {
        loop {
            hup.recv().await;
            tracing::debug!("caught SIGHUP, cycling logfile and reloading playlist");
            hup_flags.reopen_log.store(true, Ordering::Release);
            hup_flags.reload_playlist.store(true, Ordering::Release);
        }
    });

    let mut usr1 = signal(SignalKind::user_defined1())?;
    tokio::spawn(async move {
        loop {
            usr1.recv().await;
            tracing::debug!("caught SIGUSR1, skipping to next track");
            flags.skip_track.store(true, Ordering::Release);
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_methods_clear_the_flag() {
        let flags = SignalFlags::new();
        flags.skip_track.store(true, Ordering::Release);
        assert!(flags.take_skip_track());
        assert!(!flags.take_skip_track());
    }
}
