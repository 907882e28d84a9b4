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

//! Avatar Robot native side.
//!
//! - [`bluetooth`]: BLE link to the robot (scan, connect, send commands).
//! - [`speech`]: text-to-speech bridge.
//! - [`bridge`]: routes page calls to both bridges.
//! - [`relay`]: standalone WebSocket relay for object-lock state.

pub mod bluetooth;
pub mod bridge;
pub mod config;
pub mod relay;
pub mod speech;
