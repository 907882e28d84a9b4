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

//! Errors raised by the peripheral link.

use thiserror::Error;
use uuid::Uuid;

/// Everything that can end a connection attempt or fail a send.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    /// No Bluetooth adapter is present.
    #[error("Bluetooth not supported")]
    UnsupportedHardware,

    /// An adapter exists but is powered off.
    #[error("Bluetooth is disabled")]
    HardwareDisabled,

    /// The adapter rejected the discovery request.
    #[error("BLE scan failed: {0}")]
    ScanStartFailure(String),

    /// No advertisement matched before the scan deadline.
    #[error("no device matching '{0}' found")]
    ScanTimeout(String),

    /// The transport-level connection could not be established.
    #[error("failed to connect to {address}: {reason}")]
    TransportConnectFailure { address: String, reason: String },

    /// Connected, but the expected service or characteristic is missing.
    #[error("service {service} / characteristic {characteristic} not found")]
    CapabilityNotFound { service: Uuid, characteristic: Uuid },

    /// A command write failed while the link was ready.
    #[error("failed to send command: {0}")]
    WriteFailure(String),

    /// A command was sent while no link was ready.
    #[error("Not connected")]
    NotConnected,
}

impl LinkError {
    /// Wrap a transport connect error for the given device.
    pub fn connect(address: impl Into<String>, reason: impl ToString) -> Self {
        LinkError::TransportConnectFailure {
            address: address.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            LinkError::UnsupportedHardware.to_string(),
            "Bluetooth not supported"
        );
        assert_eq!(LinkError::NotConnected.to_string(), "Not connected");
        assert_eq!(
            LinkError::connect("AA:BB", "timed out").to_string(),
            "failed to connect to AA:BB: timed out"
        );
    }
}
