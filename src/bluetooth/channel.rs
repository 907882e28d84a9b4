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

//! Caller-facing command surface of the robot link.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::error::LinkError;
use super::link::{LinkActor, LinkCommand, LinkConfig, LinkState, Notification, PeripheralLink};
use super::radio::Radio;

/// Handle used by the page bridge to drive the link.
///
/// `connect` and `disconnect` only enqueue a request; their outcome is
/// reported through the [`Notification`] receiver returned by
/// [`CommandChannel::spawn`]. Cloning is cheap and every clone talks to the
/// same link.
#[derive(Clone)]
pub struct CommandChannel {
    commands: mpsc::UnboundedSender<LinkCommand>,
    link: Arc<RwLock<PeripheralLink>>,
}

impl CommandChannel {
    /// Start the link actor on the current tokio runtime.
    pub fn spawn(
        radio: Arc<dyn Radio>,
        config: LinkConfig,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let link = Arc::new(RwLock::new(PeripheralLink::default()));

        let actor = LinkActor::new(radio, config, link.clone(), commands_rx, notify_tx);
        tokio::spawn(actor.run());

        (
            Self {
                commands: commands_tx,
                link,
            },
            notify_rx,
        )
    }

    /// Start discovery unless a link is already being set up or ready.
    pub fn connect(&self) {
        info!("AndroidBluetooth.connect called");
        self.enqueue(LinkCommand::Connect);
    }

    /// Tear down whatever link exists. Always safe to call.
    pub fn disconnect(&self) {
        info!("AndroidBluetooth.disconnect called");
        self.enqueue(LinkCommand::Disconnect(None));
    }

    /// Like [`disconnect`](Self::disconnect), but resolves once the link
    /// has been torn down and is back to `Idle`.
    pub async fn disconnect_and_wait(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.enqueue(LinkCommand::Disconnect(Some(done_tx)));
        let _ = done_rx.await;
    }

    /// Write a command to the robot.
    ///
    /// Fails with [`LinkError::NotConnected`] without touching the transport
    /// when the link is not ready. A failed write leaves the link as it is.
    pub async fn send(&self, command: impl AsRef<[u8]>) -> Result<(), LinkError> {
        let command = command.as_ref();
        debug!("AndroidBluetooth.send: {}", String::from_utf8_lossy(command));

        let endpoint = {
            let link = self.link.read();
            match link.state() {
                LinkState::Ready => link.endpoint().cloned(),
                _ => None,
            }
        };

        let Some(endpoint) = endpoint else {
            warn!("Not connected");
            return Err(LinkError::NotConnected);
        };

        match endpoint.write(command).await {
            Ok(()) => {
                debug!("Command sent: {} bytes", command.len());
                Ok(())
            }
            Err(e) => {
                error!("Failed to send command: {}", e);
                Err(match e {
                    LinkError::WriteFailure(_) => e,
                    other => LinkError::WriteFailure(other.to_string()),
                })
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Ready
    }

    pub fn state(&self) -> LinkState {
        self.link.read().state()
    }

    /// Error that ended the most recent attempt, if any.
    pub fn last_error(&self) -> Option<LinkError> {
        self.link.read().last_error().cloned()
    }

    fn enqueue(&self, command: LinkCommand) {
        if self.commands.send(command).is_err() {
            error!("Link actor is not running");
        }
    }
}
