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

//! Time-boxed discovery of the robot by advertised name.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use super::radio::Advertisement;

/// Case-insensitive "advertised name contains" predicate.
#[derive(Debug, Clone)]
pub struct NameFilter {
    fragment: String,
    needle: String,
}

impl NameFilter {
    pub fn new(fragment: &str) -> Self {
        Self {
            fragment: fragment.to_string(),
            needle: fragment.to_lowercase(),
        }
    }

    /// The fragment as configured.
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Whether an advertisement belongs to the device we are looking for.
    /// Nameless advertisements never match.
    pub fn matches(&self, adv: &Advertisement) -> bool {
        adv.name
            .as_deref()
            .map(|name| name.to_lowercase().contains(&self.needle))
            .unwrap_or(false)
    }
}

/// How a scan session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// First advertisement that passed the filter.
    Matched(Advertisement),
    /// Deadline reached without a match.
    TimedOut,
}

/// One discovery attempt.
#[derive(Debug)]
pub struct ScanSession {
    filter: NameFilter,
    deadline: Instant,
    matched: Option<Advertisement>,
}

impl ScanSession {
    pub fn new(filter: NameFilter, timeout: Duration) -> Self {
        Self {
            filter,
            deadline: Instant::now() + timeout,
            matched: None,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn matched(&self) -> Option<&Advertisement> {
        self.matched.as_ref()
    }

    /// Feed one advertisement into the session.
    ///
    /// Returns `true` only for the first matching advertisement; anything
    /// after that, matching or not, is ignored.
    pub fn observe(&mut self, adv: Advertisement) -> bool {
        if self.matched.is_some() || !self.filter.matches(&adv) {
            return false;
        }
        info!(
            "Found device {} ({})",
            adv.name.as_deref().unwrap_or_default(),
            adv.address
        );
        self.matched = Some(adv);
        true
    }

    /// Consume advertisements until the first match or the deadline.
    ///
    /// The receiver is dropped on return, which stops the underlying scan.
    pub async fn run(mut self, mut adverts: mpsc::Receiver<Advertisement>) -> ScanOutcome {
        let sleep = tokio::time::sleep_until(self.deadline);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                adv = adverts.recv() => match adv {
                    Some(adv) => {
                        if self.observe(adv) {
                            break;
                        }
                        if Instant::now() >= self.deadline {
                            break;
                        }
                    }
                    None => {
                        debug!("Advertisement stream ended, waiting for scan deadline");
                        sleep.as_mut().await;
                        break;
                    }
                },
                _ = &mut sleep => break,
            }
        }

        match self.matched {
            Some(adv) => ScanOutcome::Matched(adv),
            None => ScanOutcome::TimedOut,
        }
    }
}
