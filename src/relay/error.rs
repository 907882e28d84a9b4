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

//! Relay-side errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Inbound payload was not well-formed JSON. Dropped, never forwarded.
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    #[error("failed to bind relay on {addr}: {reason}")]
    Bind { addr: String, reason: String },
}
