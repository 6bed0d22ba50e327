// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `xferbench validate` command - Validate configuration file.

use xferbench_core::{ConfigLoader, Transport};

pub async fn execute(file: &str) -> anyhow::Result<()> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            let orchestrator = &config.orchestrator;
            println!("✓ Configuration is valid");
            println!();
            println!("Orchestrator Settings:");
            println!("  Base Directory:     {}", orchestrator.base_dir.display());
            println!("  Logs Directory:     {}", config.logs_dir().display());
            println!("  Payload Directory:  {}", orchestrator.payload_dir.display());
            println!("  Grace Period:       {}ms", orchestrator.grace_period_ms);
            println!(
                "  Startup Delay:      {}ms",
                orchestrator.server_startup_delay_ms
            );
            println!("  Sweep Sizes:        {:?} MB", orchestrator.sweep_sizes_mb);
            println!("  Probe Flag:         {}", orchestrator.probe_flag);
            println!();
            println!("Transports:");
            for transport in Transport::ALL {
                let section = config.transport(transport);
                let server = if config.has_server(transport) {
                    "found"
                } else {
                    "not found, remote endpoint assumed"
                };
                println!(
                    "  - {} (server: {} [{}], client: {})",
                    transport,
                    section.server.program.display(),
                    server,
                    section.client.program.display()
                );
            }
            println!();
            println!("Fabric:");
            println!(
                "  module: {}, device: {}, elevation: {}, require ready: {}",
                config.fabric.module,
                config.fabric.device,
                config.fabric.elevation,
                config.fabric.require_ready
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            Err(anyhow::Error::new(e).context(format!("Invalid configuration in {file}")))
        }
    }
}
