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

//! Hardware abstraction for the BLE central role.
//!
//! The link state machine only talks to these traits. The BlueZ backend
//! lives in [`super::bluez`]; tests drive the machine with a scripted radio.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::error::LinkError;

/// A single advertisement observed during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Opaque device address, as reported by the radio.
    pub address: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
}

impl Advertisement {
    pub fn new(address: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            address: address.into(),
            name: name.map(str::to_string),
            rssi: None,
        }
    }
}

/// Power state of the local adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    /// No adapter available.
    Absent,
    /// Adapter present but powered off.
    PoweredOff,
    /// Ready to scan.
    PoweredOn,
}

/// Local Bluetooth adapter acting as a GATT central.
#[async_trait]
pub trait Radio: Send + Sync + 'static {
    /// Backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Current adapter state.
    async fn state(&self) -> RadioState;

    /// Start discovery.
    ///
    /// Advertisements arrive on the returned receiver until it is dropped,
    /// which stops the scan.
    async fn start_scan(&self) -> Result<mpsc::Receiver<Advertisement>, LinkError>;

    /// Open a transport connection to the device with the given address.
    async fn connect(&self, address: &str) -> Result<Arc<dyn GattLink>, LinkError>;
}

/// An established transport connection to one peripheral.
#[async_trait]
pub trait GattLink: Send + Sync {
    fn address(&self) -> &str;

    /// Look up a writable characteristic inside a service.
    async fn resolve_endpoint(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Arc<dyn WriteEndpoint>, LinkError>;

    /// Resolves once when the peripheral drops the connection.
    async fn watch_disconnect(&self) -> Result<oneshot::Receiver<()>, LinkError>;

    /// Close the connection. Safe to call more than once.
    async fn close(&self);
}

/// The command-accepting characteristic of a ready link.
#[async_trait]
pub trait WriteEndpoint: Send + Sync {
    async fn write(&self, data: &[u8]) -> Result<(), LinkError>;
}

/// Radio used when the binary is built without a hardware backend.
pub struct NoRadio;

#[async_trait]
impl Radio for NoRadio {
    fn backend_name(&self) -> &'static str {
        "none"
    }

    async fn state(&self) -> RadioState {
        RadioState::Absent
    }

    async fn start_scan(&self) -> Result<mpsc::Receiver<Advertisement>, LinkError> {
        Err(LinkError::UnsupportedHardware)
    }

    async fn connect(&self, _address: &str) -> Result<Arc<dyn GattLink>, LinkError> {
        Err(LinkError::UnsupportedHardware)
    }
}
