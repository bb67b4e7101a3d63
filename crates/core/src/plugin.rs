// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The `Plugin` chain stage trait.
//!
//! Mirrors the init/lifecycle shape of an async processor node, narrowed to
//! a synchronous per-buffer call since the pipeline here is a
//! single-threaded cooperative loop, not an actor graph.

use crate::error::Result;
use crate::input_stream::InputStream;

/// One stage of the per-sample-buffer processing chain.
///
/// Plugins run in declaration order. `process` may shrink the buffer (by
/// truncating `left`/`right` to a smaller, equal frame count) but must
/// never grow it.
pub trait Plugin: Send {
    /// Human-readable name, used in logs and error messages.
    fn name(&self) -> &str;

    /// One-time setup. Returning `Err` drops this plugin from the chain;
    /// the remaining plugins keep running.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once per track, before any `process` call for that track.
    fn new_track(&mut self, source: &InputStream);

    /// Processes `n_frames` frames in place, returning the (possibly
    /// smaller) output frame count.
    fn process(&mut self, n_frames: usize, left: &mut Vec<i16>, right: &mut Vec<i16>) -> usize;

    /// Releases any resources held by the plugin. Called once at shutdown.
    fn shutdown(&mut self) {}
}
