// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "aurocast.toml")]
    pub config: String,

    /// Stay attached to the terminal instead of forking to the background
    #[arg(short, long)]
    pub foreground: bool,

    /// Increase log verbosity (overrides `general.log_level`)
    #[arg(short, long)]
    pub verbose: bool,
}
