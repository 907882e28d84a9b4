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

//! Set of connected viewers.

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Opaque handle identifying one viewer connection.
pub type ClientId = u64;

/// Frames queued per viewer before further broadcasts skip it.
pub const CLIENT_QUEUE_CAPACITY: usize = 64;

/// One connected viewer.
#[derive(Debug)]
pub struct RelayClient {
    pub id: ClientId,
    pub joined_at: DateTime<Local>,
    outbound: mpsc::Sender<String>,
}

impl RelayClient {
    /// Whether the connection's writer is still accepting frames.
    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed()
    }
}

/// Concurrency-safe registry of viewers, keyed by [`ClientId`].
#[derive(Debug, Default)]
pub struct ClientRegistry {
    next_id: AtomicU64,
    clients: RwLock<HashMap<ClientId, RelayClient>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a viewer. Frames queued for it arrive on the returned
    /// receiver; dropping the receiver marks the viewer as closed.
    pub fn join(&self) -> (ClientId, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (outbound, rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        self.clients.write().insert(
            id,
            RelayClient {
                id,
                joined_at: Local::now(),
                outbound,
            },
        );
        (id, rx)
    }

    /// Remove a viewer. Returns `false` if it was already gone.
    pub fn leave(&self, id: ClientId) -> bool {
        self.clients.write().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.read().contains_key(&id)
    }

    /// Queue `payload` for every open viewer except `from`.
    ///
    /// Takes a snapshot of the registry first so joins and leaves during the
    /// fan-out never block on it. Closed viewers and viewers whose queue is
    /// full are skipped. Returns how many viewers the payload was queued for.
    pub fn broadcast(&self, from: ClientId, payload: &str) -> usize {
        let targets: Vec<(ClientId, mpsc::Sender<String>)> = self
            .clients
            .read()
            .values()
            .filter(|client| client.id != from && client.is_open())
            .map(|client| (client.id, client.outbound.clone()))
            .collect();

        targets
            .into_iter()
            .filter(|(id, outbound)| match outbound.try_send(payload.to_string()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!("Client {} is not reading, dropping message", id);
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Skipping closed client {}", id);
                    false
                }
            })
            .count()
    }
}
