// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration and its on-disk persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{LabelSize, PrinterModel};

/// File name of the persisted configuration inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Persistent bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Hard deadline for a single print job.
    pub print_deadline_secs: u64,
    /// Search duration used when the caller does not give one.
    pub default_discovery_timeout_secs: u32,
    /// Model assumed when the caller's model string is missing or unknown.
    pub default_model: PrinterModel,
    /// Media assumed when the caller's label string is missing or unknown.
    pub default_label: LabelSize,
    /// Where content locators are materialised and drivers keep work files.
    pub cache_dir: PathBuf,
    /// TCP port of the printer's raw data stream.
    pub raw_port: u16,
    /// Upper bound on establishing a channel.
    pub connect_timeout_secs: u64,
    /// Decode the image header before opening a channel.
    pub validate_images: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            print_deadline_secs: 30,
            default_discovery_timeout_secs: 15,
            default_model: PrinterModel::QL_820NWB,
            default_label: LabelSize::DieCutW17H54,
            cache_dir: std::env::temp_dir().join("etikett"),
            raw_port: 9100,
            connect_timeout_secs: 5,
            validate_images: true,
        }
    }
}

impl BridgeConfig {
    pub fn print_deadline(&self) -> Duration {
        Duration::from_secs(self.print_deadline_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Load `config.json` from `data_dir`, or defaults if it is absent or
    /// unreadable.
    pub fn load_or_default(data_dir: &Path) -> Self {
        let path = data_dir.join(CONFIG_FILE);
        match Self::load(&path) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded bridge config");
                config
            }
            Err(e) => {
                if path.exists() {
                    warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                }
                Self::default()
            }
        }
    }

    /// Load a config file from an explicit path.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write the config as pretty JSON into `data_dir`.
    pub fn persist(&self, data_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(data_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(data_dir.join(CONFIG_FILE), json)?;
        Ok(())
    }
}

/// Return the application data directory (not created).
pub fn data_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("etikett");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share").join("etikett");
    }
    std::env::temp_dir().join("etikett")
}
