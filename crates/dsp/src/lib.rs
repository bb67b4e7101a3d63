// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Plugin chain runner and the built-in crossfade/ReplayGain plugins.

pub mod chain;
pub mod crossfade;
pub mod replaygain;

pub use chain::PluginChain;
pub use crossfade::{crossmix_add, CrossfadeConfig, CrossfadeRing};
pub use replaygain::{ReplayGainConfig, ReplayGainPlugin};
