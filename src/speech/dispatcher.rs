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

//! Speech output through speech-dispatcher's `spd-say`.
//!
//! `spd-say` runs on a dedicated worker thread so a slow or hung call never
//! stalls the async runtime. Jobs run in the order they were queued.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::SpeechSynthesizer;

enum SpeechJob {
    Speak(String),
    Stop,
}

/// speech-dispatcher backend.
pub struct SpeechDispatcher {
    jobs: mpsc::UnboundedSender<SpeechJob>,
}

impl SpeechDispatcher {
    /// Returns `None` when `spd-say` is not installed.
    pub fn new(language: &str) -> Option<Self> {
        let available = Command::new("which")
            .arg("spd-say")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);

        if !available {
            return None;
        }
        Self::with_program("spd-say", language)
            .map_err(|e| warn!("Cannot start speech worker: {}", e))
            .ok()
    }

    fn with_program(program: impl Into<PathBuf>, language: &str) -> Result<Self> {
        let program = program.into();
        let language = language.to_string();
        let (jobs, mut queue) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("speech".into())
            .spawn(move || {
                while let Some(job) = queue.blocking_recv() {
                    // --cancel first so a new utterance replaces the current one.
                    let result = run_program(&program, &["--cancel"]).and_then(|()| match &job {
                        SpeechJob::Speak(text) => {
                            run_program(&program, &["-l", language.as_str(), "--", text.as_str()])
                        }
                        SpeechJob::Stop => Ok(()),
                    });
                    if let Err(e) = result {
                        warn!("TTS failed: {}", e);
                    }
                }
                debug!("Speech worker stopped");
            })?;

        Ok(Self { jobs })
    }

    fn queue(&self, job: SpeechJob) -> Result<()> {
        self.jobs
            .send(job)
            .map_err(|_| anyhow!("Speech worker is not running"))
    }
}

/// Run spd-say. It hands the request to the daemon and returns without
/// waiting for the utterance to finish.
fn run_program(program: &Path, args: &[&str]) -> Result<()> {
    debug!("Running: {:?} {:?}", program, args);

    let status = Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| anyhow!("Failed to run {:?}: {}", program, e))?;

    if !status.success() {
        return Err(anyhow!("{:?} failed: {}", program, status));
    }

    Ok(())
}

impl SpeechSynthesizer for SpeechDispatcher {
    fn backend_name(&self) -> &'static str {
        "speech-dispatcher"
    }

    fn speak(&self, text: &str) -> Result<()> {
        debug!("TTS speak: {}", text);
        self.queue(SpeechJob::Speak(text.to_string()))
    }

    fn stop(&self) -> Result<()> {
        self.queue(SpeechJob::Stop)
    }

    fn is_available(&self) -> bool {
        true
    }
}
