//! Command Line Interface module
//!
//! Implements the CLI commands and argument parsing for GestureLink.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "gesturelink")]
#[command(about = "GestureLink gesture session client")]
#[command(long_about = "Connects to a hand-gesture recognition backend and shows its live status")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    #[arg(long, default_value = "config.toml")]
    pub config_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the backend WebSocket endpoint
    #[arg(long)]
    pub endpoint: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Interactive console: toggle the gesture session and watch its status
    Console {
        /// Send start as soon as the console opens
        #[arg(long)]
        autostart: bool,
    },

    /// Run a scripted gesture backend for local testing
    MockBackend {
        /// Listen address (overrides mock.bind_addr)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Console { autostart: false }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// Reset configuration to defaults
    Reset,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the actual command, using default if none provided
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or_default()
    }

    /// Resolve the log level: verbose flag, then explicit flag, then config
    pub fn effective_log_level(&self, configured: &str) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| configured.to_string())
        }
    }
}
