// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! xferbench CLI
//!
//! Command-line front end for benchmarking a stream transport against a
//! fabric transport.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use xferbench_core::Transport;

mod commands;
mod console;

/// Default configuration file, optional when absent.
pub const DEFAULT_CONFIG: &str = "xferbench.yaml";

/// xferbench - Stream vs fabric file-transfer benchmark
#[derive(Parser)]
#[command(name = "xferbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Benchmark one transport
    Run {
        /// Transport to benchmark
        #[arg(short, long, value_enum)]
        transport: TransportArg,

        /// Target address (IP or host name)
        #[arg(long)]
        target: String,

        /// Payload file to transfer
        #[arg(short, long)]
        payload: PathBuf,

        /// Skip the payload-size sweep
        #[arg(long)]
        no_sweep: bool,

        /// Write a JSON comparison report into this directory
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },

    /// Benchmark both transports concurrently and compare them
    Compare {
        /// Target address (IP or host name)
        #[arg(long)]
        target: String,

        /// Payload file to transfer
        #[arg(short, long)]
        payload: PathBuf,

        /// Skip the payload-size sweep
        #[arg(long)]
        no_sweep: bool,

        /// Write a JSON comparison report into this directory
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },

    /// Start a local endpoint and keep it running until Ctrl+C
    Serve {
        #[arg(short, long, value_enum)]
        transport: TransportArg,
    },

    /// Inspect or provision the soft-RoCE fabric
    Fabric {
        #[command(subcommand)]
        action: FabricAction,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FabricAction {
    /// Probe kernel module and virtual device
    Check,
    /// Load the module and create the device where missing
    Provision,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportArg {
    /// Byte-stream socket transfer
    Stream,
    /// RDMA fabric transfer
    Fabric,
}

impl From<TransportArg> for Transport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Stream => Transport::Stream,
            TransportArg::Fabric => Transport::Fabric,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Run {
            transport,
            target,
            payload,
            no_sweep,
            report_dir,
        } => {
            commands::run::execute(
                &cli.config,
                &[transport.into()],
                &target,
                &payload,
                !no_sweep,
                report_dir.as_deref(),
            )
            .await
        }
        Commands::Compare {
            target,
            payload,
            no_sweep,
            report_dir,
        } => {
            commands::run::execute(
                &cli.config,
                &Transport::ALL,
                &target,
                &payload,
                !no_sweep,
                report_dir.as_deref(),
            )
            .await
        }
        Commands::Serve { transport } => {
            commands::serve::execute(&cli.config, transport.into()).await
        }
        Commands::Fabric { action } => commands::fabric::execute(&cli.config, action).await,
        Commands::Validate { file } => commands::validate::execute(&file).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "xferbench",
            "run",
            "--transport",
            "fabric",
            "--target",
            "10.0.0.2",
            "--payload",
            "data.bin",
            "--no-sweep",
        ])
        .unwrap();

        assert_eq!(cli.config, DEFAULT_CONFIG);
        match cli.command {
            Commands::Run {
                transport,
                target,
                payload,
                no_sweep,
                report_dir,
            } => {
                assert_eq!(Transport::from(transport), Transport::Fabric);
                assert_eq!(target, "10.0.0.2");
                assert_eq!(payload, PathBuf::from("data.bin"));
                assert!(no_sweep);
                assert!(report_dir.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_fabric_and_global_flags() {
        let cli =
            Cli::try_parse_from(["xferbench", "-v", "-c", "bench.yaml", "fabric", "provision"])
                .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, "bench.yaml");
        assert!(matches!(
            cli.command,
            Commands::Fabric {
                action: FabricAction::Provision
            }
        ));
    }

    #[test]
    fn test_rejects_unknown_transport() {
        assert!(Cli::try_parse_from([
            "xferbench",
            "run",
            "--transport",
            "udp",
            "--target",
            "x",
            "--payload",
            "y"
        ])
        .is_err());
    }
}
