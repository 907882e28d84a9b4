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

//! Payload handling for relayed messages.
//!
//! The relay does not interpret payloads. It only checks that they parse
//! as JSON and forwards the re-serialized value, keeping key order.

use serde_json::Value;

use super::error::RelayError;

/// A parsed, content-agnostic relay payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayMessage {
    body: Value,
}

impl RelayMessage {
    /// Parse raw frame bytes (text or binary frame) as JSON.
    pub fn parse(raw: &[u8]) -> Result<Self, RelayError> {
        let body = serde_json::from_slice(raw)?;
        Ok(Self { body })
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Serialize back to compact JSON text for fan-out.
    pub fn to_json(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(&self.body)?)
    }
}
