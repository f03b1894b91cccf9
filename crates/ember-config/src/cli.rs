//! Command-line argument parsing for the Ember server.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Ember server command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "ember-server", about = "Ember game-server front end")]
pub struct CliArgs {
    /// Bind address.
    #[arg(long)]
    pub bind: Option<String>,

    /// Listener port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum concurrent connections.
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Worker threads for the async runtime.
    #[arg(long)]
    pub worker_threads: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref bind) = args.bind {
            self.network.bind_address = bind.clone();
        }
        if let Some(port) = args.port {
            self.network.port = port;
        }
        if let Some(max) = args.max_connections {
            self.network.max_connections = max;
        }
        if let Some(threads) = args.worker_threads {
            self.network.worker_threads = threads;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            bind: Some("127.0.0.1".to_string()),
            port: Some(4000),
            max_connections: None,
            worker_threads: None,
            log_level: None,
            config: None,
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.network.bind_address, "127.0.0.1");
        assert_eq!(config.network.port, 4000);
        // Non-overridden fields retain defaults
        assert_eq!(config.network.max_connections, 256);
        assert_eq!(config.network.worker_threads, 8);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        let args = CliArgs {
            bind: None,
            port: None,
            max_connections: None,
            worker_threads: None,
            log_level: None,
            config: None,
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config, original);
    }
}
