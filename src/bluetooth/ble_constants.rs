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

//! BLE service and characteristic UUIDs for the robot's UART link.

use std::time::Duration;
use uuid::Uuid;

/// Nordic UART service UUID exposed by the robot firmware.
pub const UART_SERVICE_UUID: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);

/// UART TX characteristic UUID (we write commands here).
/// Properties: Write, Write Without Response
pub const UART_TX_CHAR_UUID: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);

/// Advertised-name fragment identifying the robot.
pub const DEFAULT_NAME_FILTER: &str = "ESP32";

/// How long a discovery scan runs before giving up.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for BlueZ to resolve GATT services after connecting.
pub const SERVICE_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);
