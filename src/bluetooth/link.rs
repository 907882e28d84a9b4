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

//! Connection state machine for the single robot link.
//!
//! All transitions happen inside one actor task. Caller commands and
//! hardware events (scan results, link up/down, service resolution) are
//! queued to it; spawned helper tasks never touch [`PeripheralLink`]
//! directly. The shared lock is only taken for the duration of a mutation
//! or a read, never across an `.await`.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::ble_constants::{
    DEFAULT_NAME_FILTER, DEFAULT_SCAN_TIMEOUT, UART_SERVICE_UUID, UART_TX_CHAR_UUID,
};
use super::error::LinkError;
use super::radio::{GattLink, Radio, RadioState, WriteEndpoint};
use super::scanner::{NameFilter, ScanOutcome, ScanSession};

/// Lifecycle of the peripheral link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Scanning,
    Connecting,
    DiscoveringServices,
    Ready,
    Disconnected,
    Failed,
}

impl LinkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Idle => "Idle",
            LinkState::Scanning => "Scanning",
            LinkState::Connecting => "Connecting",
            LinkState::DiscoveringServices => "Discovering services",
            LinkState::Ready => "Ready",
            LinkState::Disconnected => "Disconnected",
            LinkState::Failed => "Failed",
        }
    }

    /// States in which a `connect()` request is a no-op.
    fn is_busy(&self) -> bool {
        matches!(
            self,
            LinkState::Scanning
                | LinkState::Connecting
                | LinkState::DiscoveringServices
                | LinkState::Ready
        )
    }
}

/// The one hardware connection we are allowed to hold.
///
/// Invariant: `endpoint` is `Some` iff `state == Ready`. Entering
/// `Disconnected` or `Failed` drops both the device and the endpoint.
pub struct PeripheralLink {
    state: LinkState,
    device: Option<Arc<dyn GattLink>>,
    endpoint: Option<Arc<dyn WriteEndpoint>>,
    last_error: Option<LinkError>,
}

impl Default for PeripheralLink {
    fn default() -> Self {
        Self {
            state: LinkState::Idle,
            device: None,
            endpoint: None,
            last_error: None,
        }
    }
}

impl fmt::Debug for PeripheralLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeripheralLink")
            .field("state", &self.state)
            .field("device", &self.device.as_ref().map(|d| d.address().to_string()))
            .field("endpoint", &self.endpoint.is_some())
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl PeripheralLink {
    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn endpoint(&self) -> Option<&Arc<dyn WriteEndpoint>> {
        self.endpoint.as_ref()
    }

    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    pub fn last_error(&self) -> Option<&LinkError> {
        self.last_error.as_ref()
    }

    fn begin_scan(&mut self) {
        self.state = LinkState::Scanning;
        self.last_error = None;
    }

    fn begin_connect(&mut self) {
        self.state = LinkState::Connecting;
    }

    fn attach_device(&mut self, device: Arc<dyn GattLink>) {
        self.device = Some(device);
        self.state = LinkState::DiscoveringServices;
    }

    fn bind_endpoint(&mut self, endpoint: Arc<dyn WriteEndpoint>) {
        self.endpoint = Some(endpoint);
        self.state = LinkState::Ready;
    }

    /// Drop the endpoint and hand back the device so the caller can close
    /// it outside the lock.
    fn release(&mut self, terminal: LinkState) -> Option<Arc<dyn GattLink>> {
        self.endpoint = None;
        self.state = terminal;
        self.device.take()
    }

    fn fail(&mut self, error: LinkError) -> Option<Arc<dyn GattLink>> {
        self.last_error = Some(error);
        self.release(LinkState::Failed)
    }

    fn timed_out(&mut self, error: LinkError) -> Option<Arc<dyn GattLink>> {
        self.last_error = Some(error);
        self.release(LinkState::Idle)
    }

    fn reset(&mut self) {
        debug_assert!(self.device.is_none() && self.endpoint.is_none());
        self.state = LinkState::Idle;
    }
}

/// Tunables for the link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Advertised-name fragment of the target device.
    pub name_filter: String,
    pub scan_timeout: Duration,
    pub service_uuid: Uuid,
    pub tx_characteristic_uuid: Uuid,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            name_filter: DEFAULT_NAME_FILTER.to_string(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            service_uuid: UART_SERVICE_UUID,
            tx_characteristic_uuid: UART_TX_CHAR_UUID,
        }
    }
}

/// User-visible notice, the kind of thing shown as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Scanning { target: String },
    Ready { target: String },
    NotFound { target: String },
    Failed(LinkError),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Scanning { target } => write!(f, "Scanning for {}...", target),
            Notice::Ready { target } => write!(f, "{} Connected!", target),
            Notice::NotFound { target } => write!(f, "{} not found", target),
            Notice::Failed(LinkError::HardwareDisabled) => write!(f, "Please enable Bluetooth"),
            Notice::Failed(LinkError::ScanStartFailure(_)) => write!(f, "Scan failed"),
            Notice::Failed(e) => write!(f, "{}", e),
        }
    }
}

/// Events delivered to the caller, in order, from a single channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The link reached `Ready`.
    Connected,
    /// A ready link went away.
    Disconnected,
    Notice(Notice),
}

/// Requests issued by the caller.
#[derive(Debug)]
pub(crate) enum LinkCommand {
    Connect,
    /// Optional sender is signalled once teardown has finished.
    Disconnect(Option<oneshot::Sender<()>>),
}

/// Results reported back by helper tasks. Each carries the attempt it
/// belongs to so late arrivals from an abandoned attempt can be dropped.
enum HardwareEvent {
    ScanFinished { attempt: u64, outcome: ScanOutcome },
    ScanRejected { attempt: u64, error: LinkError },
    LinkUp { attempt: u64, device: Arc<dyn GattLink> },
    LinkFailed { attempt: u64, error: LinkError },
    EndpointResolved { attempt: u64, endpoint: Arc<dyn WriteEndpoint> },
    ResolveFailed { attempt: u64, error: LinkError },
    PeripheralLost { attempt: u64 },
}

/// Single owner of all link transitions.
pub(crate) struct LinkActor {
    radio: Arc<dyn Radio>,
    config: LinkConfig,
    filter: NameFilter,
    link: Arc<RwLock<PeripheralLink>>,
    commands: mpsc::UnboundedReceiver<LinkCommand>,
    events_tx: mpsc::UnboundedSender<HardwareEvent>,
    events_rx: mpsc::UnboundedReceiver<HardwareEvent>,
    notify_tx: mpsc::UnboundedSender<Notification>,
    attempt: u64,
    connected_fired: bool,
    /// Scan and link-setup tasks of the current attempt.
    tasks: Vec<JoinHandle<()>>,
    /// A `radio.connect` is still running, possibly for an abandoned attempt.
    connect_in_flight: bool,
    /// Connect held back until the in-flight one resolves, with its attempt.
    deferred_connect: Option<(u64, String)>,
}

impl LinkActor {
    pub(crate) fn new(
        radio: Arc<dyn Radio>,
        config: LinkConfig,
        link: Arc<RwLock<PeripheralLink>>,
        commands: mpsc::UnboundedReceiver<LinkCommand>,
        notify_tx: mpsc::UnboundedSender<Notification>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let filter = NameFilter::new(&config.name_filter);
        Self {
            radio,
            config,
            filter,
            link,
            commands,
            events_tx,
            events_rx,
            notify_tx,
            attempt: 0,
            connected_fired: false,
            tasks: Vec::new(),
            connect_in_flight: false,
            deferred_connect: None,
        }
    }

    /// Process commands and events until every caller handle is dropped.
    pub(crate) async fn run(mut self) {
        info!("Link actor started (radio: {})", self.radio.backend_name());

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(LinkCommand::Connect) => self.handle_connect().await,
                    Some(LinkCommand::Disconnect(done)) => {
                        self.handle_disconnect().await;
                        if let Some(done) = done {
                            let _ = done.send(());
                        }
                    }
                    None => break,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event).await,
            }
        }

        self.handle_disconnect().await;
        info!("Link actor stopped");
    }

    fn state(&self) -> LinkState {
        self.link.read().state()
    }

    fn notify(&self, notification: Notification) {
        if self.notify_tx.send(notification).is_err() {
            debug!("Notification receiver dropped");
        }
    }

    fn target(&self) -> String {
        self.filter.fragment().to_string()
    }

    fn is_current(&self, attempt: u64, expected: LinkState) -> bool {
        attempt == self.attempt && self.state() == expected
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.deferred_connect = None;
    }

    async fn handle_connect(&mut self) {
        let state = self.state();
        if state.is_busy() {
            debug!("connect() ignored, link is {}", state.as_str());
            return;
        }

        match self.radio.state().await {
            RadioState::Absent => {
                error!("Bluetooth not supported");
                return self.fail(LinkError::UnsupportedHardware).await;
            }
            RadioState::PoweredOff => {
                error!("Bluetooth is disabled");
                return self.fail(LinkError::HardwareDisabled).await;
            }
            RadioState::PoweredOn => {}
        }

        self.attempt += 1;
        self.connected_fired = false;
        self.link.write().begin_scan();
        info!("Starting BLE scan for '{}'", self.filter.fragment());
        self.notify(Notification::Notice(Notice::Scanning {
            target: self.target(),
        }));

        let attempt = self.attempt;
        let events = self.events_tx.clone();
        let session = ScanSession::new(self.filter.clone(), self.config.scan_timeout);
        let radio = self.radio.clone();

        self.tasks.push(tokio::spawn(async move {
            let event = match radio.start_scan().await {
                Ok(adverts) => HardwareEvent::ScanFinished {
                    attempt,
                    outcome: session.run(adverts).await,
                },
                Err(error) => HardwareEvent::ScanRejected { attempt, error },
            };
            let _ = events.send(event);
        }));
    }

    async fn handle_disconnect(&mut self) {
        self.abort_tasks();
        // Anything still in flight belongs to a dead attempt now.
        self.attempt += 1;

        let (previous, device) = {
            let mut link = self.link.write();
            let previous = link.state();
            (previous, link.release(LinkState::Disconnected))
        };

        if let Some(device) = device {
            info!("Disconnecting from {}", device.address());
            device.close().await;
        }

        if previous != LinkState::Idle {
            info!("Link torn down from {}", previous.as_str());
        }
        if std::mem::take(&mut self.connected_fired) {
            self.notify(Notification::Disconnected);
        }
        self.link.write().reset();
    }

    async fn handle_event(&mut self, event: HardwareEvent) {
        match event {
            HardwareEvent::ScanFinished { attempt, outcome } => {
                if !self.is_current(attempt, LinkState::Scanning) {
                    debug!("Ignoring result of abandoned scan");
                    return;
                }
                self.tasks.clear();
                match outcome {
                    ScanOutcome::Matched(adv) => self.begin_connect(adv.address),
                    ScanOutcome::TimedOut => self.scan_timed_out(),
                }
            }
            HardwareEvent::ScanRejected { attempt, error } => {
                if !self.is_current(attempt, LinkState::Scanning) {
                    return;
                }
                error!("BLE scan failed: {}", error);
                let error = match error {
                    LinkError::ScanStartFailure(_) => error,
                    other => LinkError::ScanStartFailure(other.to_string()),
                };
                self.fail(error).await;
            }
            HardwareEvent::LinkUp { attempt, device } => {
                self.connect_in_flight = false;
                if !self.is_current(attempt, LinkState::Connecting) {
                    // Closed before any newer connect to the same device starts.
                    warn!("Closing late connection to {}", device.address());
                    device.close().await;
                    self.resume_deferred_connect();
                    return;
                }
                self.link_up(device);
            }
            HardwareEvent::LinkFailed { attempt, error } => {
                self.connect_in_flight = false;
                if !self.is_current(attempt, LinkState::Connecting) {
                    self.resume_deferred_connect();
                    return;
                }
                error!("Connection failed: {}", error);
                self.fail(error).await;
            }
            HardwareEvent::EndpointResolved { attempt, endpoint } => {
                if !self.is_current(attempt, LinkState::DiscoveringServices) {
                    return;
                }
                self.link.write().bind_endpoint(endpoint);
                self.connected_fired = true;
                info!("UART service found, link ready");
                self.notify(Notification::Connected);
                self.notify(Notification::Notice(Notice::Ready {
                    target: self.target(),
                }));
            }
            HardwareEvent::ResolveFailed { attempt, error } => {
                if !self.is_current(attempt, LinkState::DiscoveringServices) {
                    return;
                }
                error!("Service discovery failed: {}", error);
                self.fail(error).await;
            }
            HardwareEvent::PeripheralLost { attempt } => {
                if attempt != self.attempt {
                    return;
                }
                match self.state() {
                    LinkState::Ready => {
                        info!("Bluetooth disconnected by peripheral");
                        self.handle_disconnect().await;
                    }
                    LinkState::DiscoveringServices => {
                        let address = self
                            .link
                            .read()
                            .device
                            .as_ref()
                            .map(|d| d.address().to_string())
                            .unwrap_or_default();
                        self.fail(LinkError::connect(
                            address,
                            "connection lost during service discovery",
                        ))
                        .await;
                    }
                    _ => {}
                }
            }
        }
    }

    fn begin_connect(&mut self, address: String) {
        self.link.write().begin_connect();

        if self.connect_in_flight {
            info!("Waiting for previous connection attempt before connecting to {}", address);
            self.deferred_connect = Some((self.attempt, address));
            return;
        }
        self.spawn_connect(address);
    }

    fn resume_deferred_connect(&mut self) {
        if let Some((attempt, address)) = self.deferred_connect.take() {
            if self.is_current(attempt, LinkState::Connecting) {
                self.spawn_connect(address);
            }
        }
    }

    fn spawn_connect(&mut self, address: String) {
        info!("Connecting to {}", address);
        self.connect_in_flight = true;

        let attempt = self.attempt;
        let radio = self.radio.clone();
        let events = self.events_tx.clone();

        // Not tracked in `tasks`: a connect that completes after teardown
        // still reports back so the late link can be closed.
        tokio::spawn(async move {
            let event = match radio.connect(&address).await {
                Ok(device) => HardwareEvent::LinkUp { attempt, device },
                Err(error) => HardwareEvent::LinkFailed { attempt, error },
            };
            let _ = events.send(event);
        });
    }

    fn scan_timed_out(&mut self) {
        info!("Scan timeout - {} not found", self.filter.fragment());
        let device = self
            .link
            .write()
            .timed_out(LinkError::ScanTimeout(self.target()));
        debug_assert!(device.is_none());
        self.notify(Notification::Notice(Notice::NotFound {
            target: self.target(),
        }));
    }

    fn link_up(&mut self, device: Arc<dyn GattLink>) {
        info!("Bluetooth connected to {}, discovering services", device.address());
        self.link.write().attach_device(device.clone());

        let attempt = self.attempt;
        let events = self.events_tx.clone();
        let service = self.config.service_uuid;
        let characteristic = self.config.tx_characteristic_uuid;

        self.tasks.push(tokio::spawn(async move {
            // A link that cannot be watched must never become ready.
            let lost = match device.watch_disconnect().await {
                Ok(lost) => lost,
                Err(error) => {
                    warn!("Cannot watch connection state: {}", error);
                    let _ = events.send(HardwareEvent::ResolveFailed { attempt, error });
                    return;
                }
            };

            let watch = async {
                if lost.await.is_ok() {
                    let _ = events.send(HardwareEvent::PeripheralLost { attempt });
                }
            };
            let resolve = async {
                let event = match device.resolve_endpoint(service, characteristic).await {
                    Ok(endpoint) => HardwareEvent::EndpointResolved { attempt, endpoint },
                    Err(error) => HardwareEvent::ResolveFailed { attempt, error },
                };
                let _ = events.send(event);
            };
            tokio::join!(watch, resolve);
        }));
    }

    /// End the current attempt with an error, close any transport link and
    /// return to `Idle`.
    async fn fail(&mut self, error: LinkError) {
        self.abort_tasks();
        self.attempt += 1;

        let notice = Notice::Failed(error.clone());
        let device = self.link.write().fail(error);
        if let Some(device) = device {
            device.close().await;
        }

        self.connected_fired = false;
        self.notify(Notification::Notice(notice));
        self.link.write().reset();
    }
}
