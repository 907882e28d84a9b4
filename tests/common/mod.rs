//! In-memory radio for driving the link state machine without hardware.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use avatar_robot::bluetooth::{
    Advertisement, CommandChannel, GattLink, LinkConfig, LinkError, LinkState, Notification,
    Radio, RadioState, WriteEndpoint,
};

/// What the radio saw the state machine do.
#[derive(Debug, Default)]
pub struct Recorded {
    pub scans: usize,
    pub connects: Vec<String>,
    pub writes: Vec<Vec<u8>>,
    pub closes: usize,
}

struct Script {
    state: RadioState,
    adverts: Vec<Advertisement>,
    scan_error: Option<LinkError>,
    connect_error: Option<LinkError>,
    has_capability: bool,
    write_error: Option<LinkError>,
    watch_error: Option<LinkError>,
    /// Per-call delay of `connect`, consumed front to back.
    connect_delays: VecDeque<Duration>,
    resolve_delay: Option<Duration>,
}

struct Shared {
    script: Mutex<Script>,
    recorded: Mutex<Recorded>,
    // Keeps scan streams open, like a radio that keeps listening.
    scan_senders: Mutex<Vec<mpsc::Sender<Advertisement>>>,
    // Connection watchers by device address.
    watchers: Mutex<Vec<(String, oneshot::Sender<()>)>>,
}

/// A radio whose behaviour is set up front by the test.
#[derive(Clone)]
pub struct ScriptedRadio {
    shared: Arc<Shared>,
}

impl ScriptedRadio {
    /// Powered on, no advertisements, every operation succeeds.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                script: Mutex::new(Script {
                    state: RadioState::PoweredOn,
                    adverts: Vec::new(),
                    scan_error: None,
                    connect_error: None,
                    has_capability: true,
                    write_error: None,
                    watch_error: None,
                    connect_delays: VecDeque::new(),
                    resolve_delay: None,
                }),
                recorded: Mutex::new(Recorded::default()),
                scan_senders: Mutex::new(Vec::new()),
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Powered on with one robot advertising.
    pub fn with_robot() -> Self {
        Self::new().advertise("AA:BB:CC:DD:EE:01", Some("ESP32-Robot"))
    }

    pub fn with_state(self, state: RadioState) -> Self {
        self.shared.script.lock().state = state;
        self
    }

    pub fn advertise(self, address: &str, name: Option<&str>) -> Self {
        self.shared
            .script
            .lock()
            .adverts
            .push(Advertisement::new(address, name));
        self
    }

    pub fn scan_error(self, error: LinkError) -> Self {
        self.shared.script.lock().scan_error = Some(error);
        self
    }

    pub fn connect_error(self, error: LinkError) -> Self {
        self.shared.script.lock().connect_error = Some(error);
        self
    }

    pub fn without_capability(self) -> Self {
        self.shared.script.lock().has_capability = false;
        self
    }

    pub fn write_error(self, error: LinkError) -> Self {
        self.shared.script.lock().write_error = Some(error);
        self
    }

    pub fn watch_error(self, error: LinkError) -> Self {
        self.shared.script.lock().watch_error = Some(error);
        self
    }

    /// Delay the next `connect` call by `delay`. Calls past the queued
    /// delays complete immediately.
    pub fn connect_delay(self, delay: Duration) -> Self {
        self.shared.script.lock().connect_delays.push_back(delay);
        self
    }

    pub fn resolve_delay(self, delay: Duration) -> Self {
        self.shared.script.lock().resolve_delay = Some(delay);
        self
    }

    pub fn recorded<R>(&self, f: impl FnOnce(&Recorded) -> R) -> R {
        f(&self.shared.recorded.lock())
    }

    /// Simulate the robot dropping the connection.
    pub async fn drop_link(&self) {
        for _ in 0..100 {
            let watchers: Vec<_> = {
                let mut all = self.shared.watchers.lock();
                all.retain(|(_, tx)| !tx.is_closed());
                all.drain(..).collect()
            };
            if !watchers.is_empty() {
                for (_, tx) in watchers {
                    let _ = tx.send(());
                }
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("nobody is watching the link");
    }
}

#[async_trait]
impl Radio for ScriptedRadio {
    fn backend_name(&self) -> &'static str {
        "scripted"
    }

    async fn state(&self) -> RadioState {
        self.shared.script.lock().state
    }

    async fn start_scan(&self) -> Result<mpsc::Receiver<Advertisement>, LinkError> {
        let script = self.shared.script.lock();
        if let Some(error) = &script.scan_error {
            return Err(error.clone());
        }
        self.shared.recorded.lock().scans += 1;

        let (tx, rx) = mpsc::channel(16);
        for adv in &script.adverts {
            let _ = tx.try_send(adv.clone());
        }
        self.shared.scan_senders.lock().push(tx);
        Ok(rx)
    }

    async fn connect(&self, address: &str) -> Result<Arc<dyn GattLink>, LinkError> {
        self.shared.recorded.lock().connects.push(address.to_string());
        let delay = self.shared.script.lock().connect_delays.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.shared.script.lock().connect_error.clone() {
            return Err(error);
        }
        Ok(Arc::new(ScriptedDevice {
            address: address.to_string(),
            shared: self.shared.clone(),
        }))
    }
}

struct ScriptedDevice {
    address: String,
    shared: Arc<Shared>,
}

#[async_trait]
impl GattLink for ScriptedDevice {
    fn address(&self) -> &str {
        &self.address
    }

    async fn resolve_endpoint(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Arc<dyn WriteEndpoint>, LinkError> {
        let delay = self.shared.script.lock().resolve_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if !self.shared.script.lock().has_capability {
            return Err(LinkError::CapabilityNotFound {
                service,
                characteristic,
            });
        }
        Ok(Arc::new(ScriptedEndpoint {
            shared: self.shared.clone(),
        }))
    }

    async fn watch_disconnect(&self) -> Result<oneshot::Receiver<()>, LinkError> {
        if let Some(error) = self.shared.script.lock().watch_error.clone() {
            return Err(error);
        }
        let (tx, rx) = oneshot::channel();
        self.shared.watchers.lock().push((self.address.clone(), tx));
        Ok(rx)
    }

    /// Like BlueZ, closing acts on the device, so every live connection to
    /// this address drops.
    async fn close(&self) {
        self.shared.recorded.lock().closes += 1;
        let dropped: Vec<_> = {
            let mut all = self.shared.watchers.lock();
            let (dropped, kept): (Vec<_>, Vec<_>) =
                all.drain(..).partition(|(address, _)| *address == self.address);
            *all = kept;
            dropped
        };
        for (_, tx) in dropped {
            let _ = tx.send(());
        }
    }
}

struct ScriptedEndpoint {
    shared: Arc<Shared>,
}

#[async_trait]
impl WriteEndpoint for ScriptedEndpoint {
    async fn write(&self, data: &[u8]) -> Result<(), LinkError> {
        if let Some(error) = &self.shared.script.lock().write_error {
            return Err(error.clone());
        }
        self.shared.recorded.lock().writes.push(data.to_vec());
        Ok(())
    }
}

pub fn spawn_channel(radio: &ScriptedRadio) -> (CommandChannel, mpsc::UnboundedReceiver<Notification>) {
    CommandChannel::spawn(Arc::new(radio.clone()), LinkConfig::default())
}

/// Next notification, failing the test if none arrives in time.
pub async fn next(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Notification {
    tokio::time::timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("no notification received")
        .expect("notification channel closed")
}

pub async fn wait_for_state(channel: &CommandChannel, state: LinkState) {
    for _ in 0..100 {
        if channel.state() == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("link stuck in {:?}, expected {:?}", channel.state(), state);
}
