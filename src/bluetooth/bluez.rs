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

//! BlueZ (bluer) implementation of the central-role radio.

use anyhow::Result;
use async_trait::async_trait;
use bluer::gatt::remote::Characteristic;
use bluer::{Adapter, AdapterEvent, Address, Device, DeviceEvent, DeviceProperty, Session};
use futures::{pin_mut, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ble_constants::SERVICE_RESOLVE_TIMEOUT;
use super::error::LinkError;
use super::radio::{Advertisement, GattLink, Radio, RadioState, WriteEndpoint};

/// Radio backed by the system's default BlueZ adapter.
pub struct BluezRadio {
    _session: Session,
    adapter: Option<Adapter>,
}

impl BluezRadio {
    /// Open a BlueZ session. A missing adapter is not an error here; it is
    /// reported as [`RadioState::Absent`] when a connection is requested.
    pub async fn new() -> Result<Self> {
        let session = bluer::Session::new().await?;
        info!("BlueZ session created");

        let adapter = match session.default_adapter().await {
            Ok(adapter) => {
                info!("Using Bluetooth adapter: {}", adapter.name());
                Some(adapter)
            }
            Err(e) => {
                warn!("No Bluetooth adapter available: {}", e);
                None
            }
        };

        Ok(Self {
            _session: session,
            adapter,
        })
    }

    fn adapter(&self) -> Result<Adapter, LinkError> {
        self.adapter.clone().ok_or(LinkError::UnsupportedHardware)
    }
}

#[async_trait]
impl Radio for BluezRadio {
    fn backend_name(&self) -> &'static str {
        "BlueZ"
    }

    async fn state(&self) -> RadioState {
        let Some(adapter) = &self.adapter else {
            return RadioState::Absent;
        };
        match adapter.is_powered().await {
            Ok(true) => RadioState::PoweredOn,
            Ok(false) => RadioState::PoweredOff,
            Err(e) => {
                warn!("Failed to query adapter power state: {}", e);
                RadioState::Absent
            }
        }
    }

    async fn start_scan(&self) -> Result<mpsc::Receiver<Advertisement>, LinkError> {
        let adapter = self.adapter()?;
        let events = adapter
            .discover_devices_with_changes()
            .await
            .map_err(|e| LinkError::ScanStartFailure(e.to_string()))?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            pin_mut!(events);
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    event = events.next() => match event {
                        Some(AdapterEvent::DeviceAdded(address)) => {
                            let Some(adv) = describe(&adapter, address).await else {
                                continue;
                            };
                            if tx.send(adv).await.is_err() {
                                break;
                            }
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
            // Dropping the event stream ends discovery.
            debug!("BLE discovery stopped");
        });

        Ok(rx)
    }

    async fn connect(&self, address: &str) -> Result<Arc<dyn GattLink>, LinkError> {
        let adapter = self.adapter()?;
        let parsed: Address = address
            .parse()
            .map_err(|_| LinkError::connect(address, "invalid address"))?;
        let device = adapter
            .device(parsed)
            .map_err(|e| LinkError::connect(address, e))?;

        device
            .connect()
            .await
            .map_err(|e| LinkError::connect(address, e))?;

        Ok(Arc::new(BluezLink {
            address: address.to_string(),
            device,
        }))
    }
}

/// Build an advertisement record for a discovered device.
async fn describe(adapter: &Adapter, address: Address) -> Option<Advertisement> {
    let device = match adapter.device(address) {
        Ok(device) => device,
        Err(e) => {
            debug!("Skipping {}: {}", address, e);
            return None;
        }
    };
    let name = device.name().await.ok().flatten();
    let rssi = device.rssi().await.ok().flatten();

    Some(Advertisement {
        address: address.to_string(),
        name,
        rssi,
    })
}

/// A connected BlueZ device.
struct BluezLink {
    address: String,
    device: Device,
}

impl BluezLink {
    async fn wait_services_resolved(&self) -> Result<(), LinkError> {
        let events = self
            .device
            .events()
            .await
            .map_err(|e| LinkError::connect(&self.address, e))?;

        if self.device.is_services_resolved().await.unwrap_or(false) {
            return Ok(());
        }

        pin_mut!(events);
        let resolved = async {
            while let Some(event) = events.next().await {
                if let DeviceEvent::PropertyChanged(DeviceProperty::ServicesResolved(true)) = event {
                    return true;
                }
            }
            false
        };

        match tokio::time::timeout(SERVICE_RESOLVE_TIMEOUT, resolved).await {
            Ok(true) => Ok(()),
            _ => Err(LinkError::connect(
                &self.address,
                "timed out waiting for GATT services",
            )),
        }
    }
}

#[async_trait]
impl GattLink for BluezLink {
    fn address(&self) -> &str {
        &self.address
    }

    async fn resolve_endpoint(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Arc<dyn WriteEndpoint>, LinkError> {
        self.wait_services_resolved().await?;

        let services = self
            .device
            .services()
            .await
            .map_err(|e| LinkError::connect(&self.address, e))?;

        for candidate in services {
            if candidate.uuid().await.ok() != Some(service) {
                continue;
            }
            let characteristics = candidate
                .characteristics()
                .await
                .map_err(|e| LinkError::connect(&self.address, e))?;
            for ch in characteristics {
                if ch.uuid().await.ok() == Some(characteristic) {
                    debug!("Found characteristic {} on {}", characteristic, self.address);
                    return Ok(Arc::new(BluezEndpoint { characteristic: ch }));
                }
            }
        }

        Err(LinkError::CapabilityNotFound {
            service,
            characteristic,
        })
    }

    async fn watch_disconnect(&self) -> Result<oneshot::Receiver<()>, LinkError> {
        let events = self
            .device
            .events()
            .await
            .map_err(|e| LinkError::connect(&self.address, e))?;

        let (mut tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            pin_mut!(events);
            loop {
                tokio::select! {
                    _ = tx.closed() => return,
                    event = events.next() => match event {
                        Some(DeviceEvent::PropertyChanged(DeviceProperty::Connected(false))) => break,
                        Some(_) => {}
                        None => return,
                    },
                }
            }
            let _ = tx.send(());
        });

        Ok(rx)
    }

    async fn close(&self) {
        if let Err(e) = self.device.disconnect().await {
            debug!("Disconnect of {} failed: {}", self.address, e);
        }
    }
}

struct BluezEndpoint {
    characteristic: Characteristic,
}

#[async_trait]
impl WriteEndpoint for BluezEndpoint {
    async fn write(&self, data: &[u8]) -> Result<(), LinkError> {
        self.characteristic
            .write(data)
            .await
            .map_err(|e| LinkError::WriteFailure(e.to_string()))
    }
}
