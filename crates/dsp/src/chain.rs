// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Runs an ordered sequence of `Plugin`s over each decoded buffer.

use aurocast_core::input_stream::InputStream;
use aurocast_core::plugin::Plugin;

/// An ordered, fallible-at-startup pipeline of processing plugins.
///
/// A plugin whose `init` fails is dropped from the chain; the rest keep
/// running. `process` only calls a plugin while the running sample count
/// is still positive, so an earlier plugin that fully consumes a buffer
/// (e.g. the crossfade ring during its fill phase) short-circuits the rest.
pub struct PluginChain {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginChain {
    #[must_use]
    pub fn new() -> Self {
        Self { plugins: Vec::new() }
    }

    /// Runs `init` on each plugin in `candidates`, keeping only those that
    /// succeed, in their original order.
    #[must_use]
    pub fn build(candidates: Vec<Box<dyn Plugin>>) -> Self {
        let mut plugins = Vec::with_capacity(candidates.len());
        for mut plugin in candidates {
            match plugin.init() {
                Ok(()) => plugins.push(plugin),
                Err(err) => {
                    tracing::warn!(plugin = plugin.name(), error = %err, "dropping plugin that failed to initialize");
                }
            }
        }
        Self { plugins }
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn new_track(&mut self, source: &InputStream) {
        for plugin in &mut self.plugins {
            plugin.new_track(source);
        }
    }

    /// Runs all plugins over `n_frames` frames, returning the final (never
    /// larger) frame count.
    pub fn process(&mut self, n_frames: usize, left: &mut Vec<i16>, right: &mut Vec<i16>) -> usize {
        let mut samples = n_frames;
        for plugin in &mut self.plugins {
            if samples == 0 {
                break;
            }
            samples = plugin.process(samples, left, right);
        }
        samples
    }

    pub fn shutdown(&mut self) {
        for plugin in &mut self.plugins {
            plugin.shutdown();
        }
    }
}

impl Default for PluginChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurocast_core::error::Result;
    use aurocast_core::input_stream::{CompressedSource, DecodeCapability, InputKind};

    struct NoopCompressed;
    impl CompressedSource for NoopCompressed {
        fn read_compressed(&mut self, _buf: &mut [u8]) -> Result<usize> {
            Ok(0)
        }
    }

    fn stream() -> InputStream {
        InputStream::new(
            InputKind::Mp3,
            "t.mp3".into(),
            0,
            128,
            44100,
            2,
            DecodeCapability::Compressed(Box::new(NoopCompressed)),
        )
    }

    struct DoublesGain;
    impl Plugin for DoublesGain {
        fn name(&self) -> &str {
            "doubles"
        }
        fn new_track(&mut self, _source: &InputStream) {}
        fn process(&mut self, n: usize, left: &mut Vec<i16>, right: &mut Vec<i16>) -> usize {
            for s in left.iter_mut().take(n) {
                *s = s.saturating_mul(2);
            }
            for s in right.iter_mut().take(n) {
                *s = s.saturating_mul(2);
            }
            n
        }
    }

    struct FailsInit;
    impl Plugin for FailsInit {
        fn name(&self) -> &str {
            "fails"
        }
        fn init(&mut self) -> Result<()> {
            Err("boom".into())
        }
        fn new_track(&mut self, _source: &InputStream) {}
        fn process(&mut self, n: usize, _left: &mut Vec<i16>, _right: &mut Vec<i16>) -> usize {
            n
        }
    }

    struct ShrinksToZero;
    impl Plugin for ShrinksToZero {
        fn name(&self) -> &str {
            "shrinks"
        }
        fn new_track(&mut self, _source: &InputStream) {}
        fn process(&mut self, _n: usize, _left: &mut Vec<i16>, _right: &mut Vec<i16>) -> usize {
            0
        }
    }

    #[test]
    fn failed_init_drops_plugin_but_keeps_others() {
        let chain = PluginChain::build(vec![Box::new(FailsInit), Box::new(DoublesGain)]);
        assert_eq!(chain.plugins.len(), 1);
    }

    #[test]
    fn process_runs_plugins_in_order() {
        let mut chain = PluginChain::build(vec![Box::new(DoublesGain), Box::new(DoublesGain)]);
        let mut left = vec![10i16];
        let mut right = vec![10i16];
        let n = chain.process(1, &mut left, &mut right);
        assert_eq!(n, 1);
        assert_eq!(left[0], 40);
    }

    #[test]
    fn zero_samples_short_circuits_remaining_plugins() {
        let mut chain = PluginChain::build(vec![Box::new(ShrinksToZero), Box::new(DoublesGain)]);
        let mut left = vec![10i16];
        let mut right = vec![10i16];
        let n = chain.process(1, &mut left, &mut right);
        assert_eq!(n, 0);
        assert_eq!(left[0], 10); // DoublesGain never ran
    }

    #[test]
    fn new_track_broadcasts_to_all_plugins() {
        let mut chain = PluginChain::build(vec![Box::new(DoublesGain)]);
        chain.new_track(&stream());
    }
}
