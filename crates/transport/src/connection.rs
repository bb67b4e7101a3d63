// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Per-stream connect/send state machine.
//!
//! One `Connection` owns exactly one `OutputStreamConfig`'s live transport.
//! Reconnects are paced by a fixed per-stream backoff; the orchestrator
//! additionally sleeps a shared `ERROR_DELAY` once every stream in a buffer
//! iteration failed to send, so a dead server farm doesn't spin the audio
//! loop.

use crate::protocols::{build_transport, SourceTransport};
use aurocast_core::error::Result;
use aurocast_core::output_stream::{OutputStreamConfig, StreamRuntimeState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Fixed per-stream delay before a reconnect attempt after a failed open.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Sleep applied once when every stream errored within one buffer iteration.
pub const ERROR_DELAY: Duration = Duration::from_millis(999);

/// Delay between a successful connect and the first metadata push, giving
/// the server time to register the source before it receives metadata.
const INITIAL_METADATA_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connected,
    Backoff,
}

/// Live connect/send handle for one destination server.
///
/// `transport` is behind an `Arc<Mutex<_>>` so the initial post-connect
/// metadata push can run in a detached task without holding up `send()` on
/// the audio path; the worker only ever touches the transport through this
/// lock, never by reaching into `Connection` directly.
pub struct Connection {
    config: OutputStreamConfig,
    runtime: StreamRuntimeState,
    transport: Arc<Mutex<Box<dyn SourceTransport>>>,
    state: ConnectionState,
    /// Most recently requested "song" string, sent immediately when already
    /// connected, or snapshotted by the delayed worker on the next connect.
    pending_song: Option<String>,
}

impl Connection {
    #[must_use]
    pub fn new(config: OutputStreamConfig) -> Self {
        let transport = build_transport(&config);
        Self {
            config,
            runtime: StreamRuntimeState::default(),
            transport: Arc::new(Mutex::new(transport)),
            state: ConnectionState::Idle,
            pending_song: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &OutputStreamConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.runtime.is_fatal()
    }

    /// Clears the consecutive-error count. Called at the start of every
    /// track so errors from a previous, unrelated track never carry over.
    pub fn reset_errors(&mut self) {
        self.runtime.errs = 0;
    }

    /// Opens the transport if it isn't already connected and the backoff
    /// window has elapsed. A no-op, returning `Ok(())`, when already
    /// connected.
    async fn ensure_connected(&mut self, now: Instant) -> Result<()> {
        {
            let transport = self.transport.lock().await;
            if transport.is_connected() {
                self.state = ConnectionState::Connected;
                return Ok(());
            }
        }
        if !self.runtime.can_connect(now) {
            self.state = ConnectionState::Backoff;
            return Err("reconnect backoff still active".into());
        }
        self.state = ConnectionState::Idle;
        let open_result = { self.transport.lock().await.open().await };
        match open_result {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                self.spawn_initial_metadata_worker();
                Ok(())
            }
            Err(e) => {
                self.runtime.connect_delay = Some(now + RECONNECT_DELAY);
                self.state = ConnectionState::Backoff;
                Err(e)
            }
        }
    }

    /// Spawns a short-lived task that waits `INITIAL_METADATA_DELAY` and
    /// then pushes the current `pending_song` snapshot, if any. A no-op
    /// when no metadata has been requested yet.
    fn spawn_initial_metadata_worker(&self) {
        let Some(song) = self.pending_song.clone() else {
            return;
        };
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            tokio::time::sleep(INITIAL_METADATA_DELAY).await;
            if let Err(e) = transport.lock().await.set_metadata(&song).await {
                tracing::warn!(error = %e, "initial metadata push failed");
            }
        });
    }

    /// Sends one buffer, connecting first if necessary. On success, resets
    /// the stream's consecutive-error counter; on failure, closes the
    /// transport and increments it so the caller can check `is_fatal()`.
    pub async fn send(&mut self, buf: &[u8], now: Instant) -> Result<()> {
        if self.ensure_connected(now).await.is_err() {
            return Err("not connected".into());
        }

        let send_result = { self.transport.lock().await.send(buf).await };
        match send_result {
            Ok(()) => {
                self.runtime.errs = 0;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "send failed, disconnecting");
                self.transport.lock().await.close().await;
                self.runtime.errs += 1;
                self.state = ConnectionState::Idle;
                Err(e)
            }
        }
    }

    /// Requests a metadata update. Sent immediately if already connected;
    /// otherwise snapshotted so the next successful connect's delayed
    /// worker (see `spawn_initial_metadata_worker`) picks it up.
    pub async fn set_metadata(&mut self, song: &str) -> Result<()> {
        self.pending_song = Some(song.to_string());
        if self.state == ConnectionState::Connected {
            return self.transport.lock().await.set_metadata(song).await;
        }
        Ok(())
    }

    pub async fn close(&mut self) {
        self.transport.lock().await.close().await;
        self.state = ConnectionState::Idle;
    }
}

/// `true` once every connection's last send attempt this iteration failed,
/// gating the shared `ERROR_DELAY` sleep.
#[must_use]
pub fn all_streams_errored(connections: &[Connection]) -> bool {
    !connections.is_empty() && connections.iter().all(|c| c.state() != ConnectionState::Connected)
}
