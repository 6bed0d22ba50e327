// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `xferbench fabric` command - Check or provision soft-RoCE readiness.

use xferbench_core::{EventSink, FabricReadinessManager, FabricReadinessState, FabricStatus};

use crate::console;
use crate::FabricAction;

pub async fn execute(config_path: &str, action: FabricAction) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    tracing::info!(action = ?action, module = %config.fabric.module, device = %config.fabric.device, "Fabric readiness");

    let (sink, events) = EventSink::channel();
    let printer = console::spawn_printer(events);

    let device = config.fabric.device.clone();
    // Probing shells out and may wait on privilege elevation.
    let (outcome, status, reason) = tokio::task::spawn_blocking(move || {
        let mut manager = FabricReadinessManager::from_config(&config.fabric).with_events(sink);
        let outcome = match action {
            FabricAction::Check => manager.check(),
            FabricAction::Provision => manager.provision(),
        };
        (
            outcome,
            manager.status().cloned(),
            manager.failure_reason().map(str::to_owned),
        )
    })
    .await?;
    printer.await?;

    if let Some(status) = &status {
        print_status(status, &device);
    }

    match outcome {
        Ok(FabricReadinessState::Ready) => {
            println!("✓ Fabric ready");
            Ok(())
        }
        Ok(state) => {
            println!("○ Fabric not ready: {}", state.name());
            if state.needs_provisioning() {
                println!("  Run `xferbench fabric provision` to set it up.");
            }
            Ok(())
        }
        Err(e) => match reason {
            Some(reason) => Err(anyhow::anyhow!("{e} ({reason})")),
            None => Err(e.into()),
        },
    }
}

fn print_status(status: &FabricStatus, device: &str) {
    let mark = |ok: bool| if ok { "●" } else { "○" };

    println!();
    println!("Fabric Status:");
    println!(
        "  {} Kernel module loaded",
        mark(status.kernel_module_loaded)
    );
    println!(
        "  {} Device {} present",
        mark(status.virtual_device_present),
        device
    );
    if status.enumerated_devices.is_empty() {
        println!("  ○ No verbs devices enumerated");
    } else {
        let devices: Vec<&str> = status.enumerated_devices.iter().map(String::as_str).collect();
        println!("  ● Verbs devices: {}", devices.join(", "));
    }
    println!();
}
