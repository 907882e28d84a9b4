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

//! Bluetooth communication module.
//!
//! BLE central link to the robot: discovery by advertised name, a single
//! GATT connection, and command writes to the UART TX characteristic.

pub mod ble_constants;
#[cfg(feature = "bluez")]
mod bluez;
mod channel;
mod error;
mod link;
mod radio;
mod scanner;

#[cfg(feature = "bluez")]
pub use bluez::BluezRadio;
pub use channel::CommandChannel;
pub use error::LinkError;
pub use link::{LinkConfig, LinkState, Notice, Notification, PeripheralLink};
pub use radio::{Advertisement, GattLink, NoRadio, Radio, RadioState, WriteEndpoint};
pub use scanner::{NameFilter, ScanOutcome, ScanSession};
