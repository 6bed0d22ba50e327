// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

use std::path::Path;

use anyhow::Context;
use xferbench_core::{Config, ConfigLoader};

use crate::DEFAULT_CONFIG;

pub mod fabric;
pub mod run;
pub mod serve;
pub mod validate;

/// Load the configuration for a command.
///
/// The default file is optional and falls back to built-in defaults; a file
/// named explicitly must exist.
pub fn load_config(path: &str) -> anyhow::Result<Config> {
    if path == DEFAULT_CONFIG && !Path::new(path).exists() {
        tracing::debug!(config = %path, "No configuration file, using defaults");
        return Ok(Config::default());
    }

    let config = ConfigLoader::load_file(path)
        .with_context(|| format!("Invalid configuration in {path}"))?;
    tracing::info!(config = %path, "Configuration loaded");
    Ok(config)
}
