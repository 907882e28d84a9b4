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

//! HTTP + WebSocket front end of the lock relay.

use futures::{SinkExt, StreamExt};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use warp::http::StatusCode;
use warp::ws::{Message, WebSocket, Ws};
use warp::{Filter, Reply};

use super::error::RelayError;
use super::message::RelayMessage;
use super::registry::{ClientId, ClientRegistry};

/// Relay server: fans every JSON payload out to all other viewers and
/// serves the remote-control page.
pub struct RelayServer {
    registry: Arc<ClientRegistry>,
    page_path: PathBuf,
}

impl RelayServer {
    pub fn new(page_path: impl Into<PathBuf>) -> Self {
        Self {
            registry: Arc::new(ClientRegistry::new()),
            page_path: page_path.into(),
        }
    }

    pub fn registry(&self) -> Arc<ClientRegistry> {
        self.registry.clone()
    }

    /// WebSocket upgrade on any path, then the control page, then 404.
    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
        let registry = self.registry.clone();
        let ws_route = warp::ws()
            .and(warp::any().map(move || registry.clone()))
            .map(|ws: Ws, registry: Arc<ClientRegistry>| {
                ws.on_upgrade(move |socket| handle_client(socket, registry))
            });

        let page_path = self.page_path.clone();
        let page_route = warp::get()
            .and(warp::path::end().or(warp::path!("remote.html")).unify())
            .and(warp::any().map(move || page_path.clone()))
            .and_then(serve_page);

        let not_found =
            warp::any().map(|| warp::reply::with_status("Not found", StatusCode::NOT_FOUND));

        ws_route.or(page_route).or(not_found)
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn run(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), RelayError> {
        let (bound, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .map_err(|e| RelayError::Bind {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;

        info!("WebSocket server running on {}", bound);
        info!(
            "Remote control interface: http://localhost:{}/remote.html",
            bound.port()
        );
        info!("WebSocket URL: ws://localhost:{}", bound.port());

        server.await;
        info!("Relay stopped ({} clients were connected)", self.registry.len());
        Ok(())
    }
}

async fn serve_page(path: PathBuf) -> Result<warp::reply::Response, Infallible> {
    match tokio::fs::read(&path).await {
        Ok(body) => Ok(warp::reply::with_header(body, "content-type", "text/html").into_response()),
        Err(e) => {
            warn!("Cannot read control page {:?}: {}", path, e);
            Ok(warp::reply::with_status("File not found", StatusCode::NOT_FOUND).into_response())
        }
    }
}

/// Per-viewer connection loop.
async fn handle_client(socket: WebSocket, registry: Arc<ClientRegistry>) {
    let (id, mut outbound) = registry.join();
    info!("New client connected (id {}, {} online)", id, registry.len());

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Queue -> WebSocket
    let forward_task = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            if ws_tx.send(Message::text(payload)).await.is_err() {
                break;
            }
        }
    });

    // WebSocket -> other viewers
    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(msg) if msg.is_close() => break,
            Ok(msg) if msg.is_text() || msg.is_binary() => {
                relay_payload(&registry, id, msg.as_bytes());
            }
            Ok(_) => {}
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
        }
    }

    registry.leave(id);
    forward_task.abort();
    info!("Client disconnected (id {}, {} online)", id, registry.len());
}

/// Forward one inbound frame. Malformed payloads are dropped here and the
/// connection stays up.
fn relay_payload(registry: &ClientRegistry, from: ClientId, raw: &[u8]) {
    let json = match RelayMessage::parse(raw).and_then(|msg| msg.to_json()) {
        Ok(json) => json,
        Err(e) => {
            error!("Message error from client {}: {}", from, e);
            return;
        }
    };

    debug!("Received: {}", json);
    let delivered = registry.broadcast(from, &json);
    debug!("Relayed to {} clients", delivered);
}
