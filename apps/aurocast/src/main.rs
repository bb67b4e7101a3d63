// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

use clap::Parser;

mod cli;
mod config;
mod cue;
mod logging;
mod orchestrator;
mod playlist;
mod signals;

use aurocast_core::playlist::PlaylistSource;
use orchestrator::Orchestrator;
use playlist::BuiltinPlaylist;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let load_result = match config::load(&cli.config) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("failed to load configuration from {}: {err}", cli.config);
            std::process::exit(1);
        }
    };
    let config = load_result.config;

    let log_writer =
        match logging::init_logging(&config.general.log_level, cli.verbose, &config.general.log_path) {
            Ok(writer) => writer,
            Err(err) => {
                eprintln!("failed to initialize logging: {err}");
                std::process::exit(1);
            }
        };

    if let Some(missing) = &load_result.file_missing {
        tracing::warn!(path = %missing, "config file not found, starting from defaults");
    }

    let signal_flags = signals::SignalFlags::new();
    if let Err(err) = signals::install(signal_flags.clone()) {
        tracing::error!(%err, "failed to install signal handlers");
        std::process::exit(1);
    }

    if config.general.daemon && !cli.foreground {
        tracing::warn!(
            "general.daemon is set, but this build always runs attached to its controlling process; \
             run it under your service manager's own backgrounding instead"
        );
    }

    let playlist: Box<dyn PlaylistSource> =
        Box::new(BuiltinPlaylist::new(&config.playlist.playlist_file, config.playlist.randomize));

    let orchestrator = Orchestrator::new(&config, playlist, signal_flags, log_writer);
    orchestrator.run().await;
}
