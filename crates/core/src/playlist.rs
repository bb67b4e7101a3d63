// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `PlaylistSource`: the external-collaborator contract for track sources.
//!
//! The core never looks inside a path beyond handing it to the input
//! demultiplexer; concrete playlist sources (built-in text file, external
//! script, embedded interpreters) live outside this crate.

/// A pluggable source of track paths.
pub trait PlaylistSource: Send {
    /// Returns the next path to play, or `None` when the playlist is exhausted.
    fn next(&mut self) -> Option<String>;

    /// Current line number in the playlist (for the cue file).
    fn lineno(&self) -> u64;

    /// One-shot metadata override string for the track just returned by `next`.
    fn metadata_override(&self) -> Option<String>;

    /// Per-track time limit in seconds; `0` means no limit.
    fn timelimit_seconds(&self) -> u64;

    /// Reloads the playlist from its backing store (e.g. on SIGHUP).
    fn reload(&mut self);

    /// Releases any resources held by the playlist source.
    fn shutdown(&mut self) {}
}
