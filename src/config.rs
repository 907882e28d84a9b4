// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::bluetooth::ble_constants::{
    DEFAULT_NAME_FILTER, DEFAULT_SCAN_TIMEOUT, UART_SERVICE_UUID, UART_TX_CHAR_UUID,
};
use crate::bluetooth::LinkConfig;
use crate::relay::{DEFAULT_PAGE, DEFAULT_PORT};

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Robot link settings.
    pub bluetooth: BluetoothConfig,

    /// Lock relay settings.
    pub relay: RelayConfig,

    /// Speech bridge settings.
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Case-insensitive fragment of the robot's advertised name.
    pub name_filter: String,

    /// How long a scan runs before reporting "not found".
    pub scan_timeout_secs: u64,

    pub service_uuid: Uuid,

    pub tx_characteristic_uuid: Uuid,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            name_filter: DEFAULT_NAME_FILTER.to_string(),
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT.as_secs(),
            service_uuid: UART_SERVICE_UUID,
            tx_characteristic_uuid: UART_TX_CHAR_UUID,
        }
    }
}

impl From<&BluetoothConfig> for LinkConfig {
    fn from(config: &BluetoothConfig) -> Self {
        Self {
            name_filter: config.name_filter.clone(),
            scan_timeout: Duration::from_secs(config.scan_timeout_secs),
            service_uuid: config.service_uuid,
            tx_characteristic_uuid: config.tx_characteristic_uuid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bind_address: IpAddr,

    pub port: u16,

    /// Remote control page, relative to the working directory.
    pub page_path: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            page_path: PathBuf::from(DEFAULT_PAGE),
        }
    }
}

impl RelayConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,

    /// Language passed to the synthesizer.
    pub language: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "en-US".to_string(),
        }
    }
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("avatar-robot")
            .join("config.toml")
    }

    /// Load configuration from the default file or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults there if it does
    /// not exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            return Ok(toml::from_str(&content)?);
        }

        let config = Self::default();
        config.save_to(path)?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }
}
