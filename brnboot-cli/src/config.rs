//! Configuration file support for brnboot.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (BRNBOOT_*)
//! 3. Local config file (./brnboot.toml)
//! 4. Global config file (~/.config/brnboot/config.toml)
//!
//! `--config PATH` replaces both files.

use brnboot::BootConfig;
use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-directory config file.
pub const LOCAL_CONFIG: &str = "brnboot.toml";

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: Option<String>,
    /// Baud rate.
    pub baud: Option<u32>,
}

/// Dump defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DumpConfig {
    /// Bytes per read request.
    pub block_size: Option<usize>,
    /// Always run a verification pass.
    #[serde(default)]
    pub verify: bool,
}

/// Upload defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadConfig {
    /// RAM address to upload to.
    pub address: Option<u64>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Serial connection.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Dump defaults.
    #[serde(default)]
    pub dump: DumpConfig,
    /// Upload defaults.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Bootloader menu, prompt and timing overrides.
    pub bootloader: Option<BootConfig>,
}

impl Config {
    /// Load configuration from the global and local files.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG)) {
            debug!("Loaded local config from {LOCAL_CONFIG}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "brnboot").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one; values set in `other` win.
    fn merge(&mut self, other: Self) {
        if other.connection.port.is_some() {
            self.connection.port = other.connection.port;
        }
        if other.connection.baud.is_some() {
            self.connection.baud = other.connection.baud;
        }

        if other.dump.block_size.is_some() {
            self.dump.block_size = other.dump.block_size;
        }
        if other.dump.verify {
            self.dump.verify = true;
        }

        if other.upload.address.is_some() {
            self.upload.address = other.upload.address;
        }

        if other.bootloader.is_some() {
            self.bootloader = other.bootloader;
        }
    }

    /// Bootloader configuration with the baud rate applied.
    pub fn boot_config(&self, baud: u32) -> BootConfig {
        self.bootloader
            .clone()
            .unwrap_or_default()
            .with_baud_rate(baud)
    }
}
