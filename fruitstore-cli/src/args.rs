//! CLI argument parsing

use clap::{ArgAction, Parser, ValueEnum};
use fruitstore_core::config::{AppConfig, TransportKind};
use std::path::PathBuf;

/// Transport selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
    /// HTTP server with an SSE event stream
    Sse,
}

impl From<Transport> for TransportKind {
    fn from(t: Transport) -> Self {
        match t {
            Transport::Stdio => TransportKind::Stdio,
            Transport::Sse => TransportKind::Sse,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "fruitstore")]
#[command(author, version, about = "Fruit store MCP server")]
pub struct Args {
    /// Transport to serve on (defaults to stdio)
    #[arg(short, long, value_enum)]
    pub transport: Option<Transport>,

    /// Host to bind to (sse transport)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (sse transport)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Load the config file, if any, and apply command-line overrides
    pub fn resolve_config(&self) -> fruitstore_core::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };
        if let Some(transport) = self.transport {
            config.transport = transport.into();
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        Ok(config)
    }

    /// Default tracing directive for the chosen verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
