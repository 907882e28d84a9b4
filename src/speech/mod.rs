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

//! Speech synthesis bridge.

mod dispatcher;

use anyhow::Result;
use tracing::info;

pub use dispatcher::SpeechDispatcher;

/// Trait for text-to-speech backends. Calls are fire-and-forget.
pub trait SpeechSynthesizer: Send + Sync {
    /// Get the backend name (e.g., "speech-dispatcher").
    fn backend_name(&self) -> &'static str;

    /// Speak `text`, cutting off anything still being spoken.
    fn speak(&self, text: &str) -> Result<()>;

    /// Stop speaking.
    fn stop(&self) -> Result<()>;

    /// Whether the backend initialised and can speak.
    fn is_available(&self) -> bool;
}

/// Create the speech backend. Falls back to the stub when speech is
/// disabled or speech-dispatcher is not installed.
pub fn create_synthesizer(enabled: bool, language: &str) -> Box<dyn SpeechSynthesizer> {
    if !enabled {
        info!("Speech disabled in configuration");
        return Box::new(StubSynthesizer);
    }

    match SpeechDispatcher::new(language) {
        Some(dispatcher) => {
            info!("TTS initialized successfully ({})", language);
            Box::new(dispatcher)
        }
        None => {
            info!("TTS initialization failed, using stub");
            Box::new(StubSynthesizer)
        }
    }
}

/// Stub synthesizer for headless use. Reports itself unavailable.
pub struct StubSynthesizer;

impl SpeechSynthesizer for StubSynthesizer {
    fn backend_name(&self) -> &'static str {
        "Stub (no-op)"
    }

    fn speak(&self, text: &str) -> Result<()> {
        info!("[STUB] Would speak: {}", text);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        Ok(())
    }

    fn is_available(&self) -> bool {
        false
    }
}
