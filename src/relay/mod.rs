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

//! Object-lock relay.
//!
//! Remote browser viewers connect over WebSocket and broadcast lock/unlock
//! state to each other. Every well-formed JSON payload is forwarded to all
//! other open viewers; the relay never looks inside it.

mod error;
mod message;
mod registry;
mod server;

pub use error::RelayError;
pub use message::RelayMessage;
pub use registry::{ClientId, ClientRegistry, RelayClient, CLIENT_QUEUE_CAPACITY};
pub use server::RelayServer;

/// Port the relay listens on by default.
pub const DEFAULT_PORT: u16 = 8080;

/// Control page served at `/` and `/remote.html`.
pub const DEFAULT_PAGE: &str = "remote-control.html";
