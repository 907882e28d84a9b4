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

//! Page bridge: the calls the embedded page makes into native code.
//!
//! The page host itself is not part of this crate, so calls arrive as
//! text lines in the page's own syntax, e.g. `AndroidBluetooth.send(F)`.

use std::fmt;
use tracing::{debug, error, info};

use crate::bluetooth::{CommandChannel, Notification};
use crate::speech::SpeechSynthesizer;

/// A single call from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCall {
    Connect,
    Disconnect,
    Send(String),
    IsConnected,
    Speak(String),
    StopSpeaking,
    SpeechAvailable,
}

impl BridgeCall {
    /// Parse `Object.method(arg)`. Quotes around the argument are optional.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim().trim_end_matches(';');
        let (target, rest) = line.split_once('(')?;
        let arg = unquote(rest.strip_suffix(')')?);

        match target.trim() {
            "AndroidBluetooth.connect" => Some(Self::Connect),
            "AndroidBluetooth.disconnect" => Some(Self::Disconnect),
            "AndroidBluetooth.send" => Some(Self::Send(arg.to_string())),
            "AndroidBluetooth.isConnected" => Some(Self::IsConnected),
            "AndroidTTS.speak" => Some(Self::Speak(arg.to_string())),
            "AndroidTTS.stop" => Some(Self::StopSpeaking),
            "AndroidTTS.isAvailable" => Some(Self::SpeechAvailable),
            _ => None,
        }
    }
}

fn unquote(arg: &str) -> &str {
    let arg = arg.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = arg
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    arg
}

/// Page-side hook invocation for a notification.
pub struct PageHook<'a>(pub &'a Notification);

impl fmt::Display for PageHook<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Notification::Connected => write!(f, "window.onBluetoothConnected()"),
            Notification::Disconnected => write!(f, "window.onBluetoothDisconnected()"),
            Notification::Notice(notice) => write!(f, "notice: {}", notice),
        }
    }
}

/// Routes page calls to the Bluetooth and speech bridges.
pub struct BridgeHost {
    bluetooth: CommandChannel,
    speech: Box<dyn SpeechSynthesizer>,
}

impl BridgeHost {
    pub fn new(bluetooth: CommandChannel, speech: Box<dyn SpeechSynthesizer>) -> Self {
        Self { bluetooth, speech }
    }

    pub fn bluetooth(&self) -> &CommandChannel {
        &self.bluetooth
    }

    /// Execute a call. Returns the value for calls that produce one.
    /// Failures are logged and never propagate to the page.
    pub async fn dispatch(&self, call: BridgeCall) -> Option<String> {
        debug!("Bridge call: {:?}", call);

        match call {
            BridgeCall::Connect => self.bluetooth.connect(),
            BridgeCall::Disconnect => self.bluetooth.disconnect(),
            BridgeCall::Send(command) => {
                if self.bluetooth.send(command.as_bytes()).await.is_ok() {
                    info!("Command sent: {}", command);
                }
            }
            BridgeCall::IsConnected => return Some(self.bluetooth.is_connected().to_string()),
            BridgeCall::Speak(text) => {
                if let Err(e) = self.speech.speak(&text) {
                    error!("TTS speak failed: {}", e);
                }
            }
            BridgeCall::StopSpeaking => {
                if let Err(e) = self.speech.stop() {
                    error!("TTS stop failed: {}", e);
                }
            }
            BridgeCall::SpeechAvailable => return Some(self.speech.is_available().to_string()),
        }

        None
    }
}
