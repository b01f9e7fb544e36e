// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-request settlement state machine.
//!
//! Pure and synchronous: the coordinator feeds backend notifications in and
//! acts on what comes out, which keeps the exactly-once rules testable
//! without a backend.

use std::collections::{BTreeSet, HashMap};

use crate::{
    progress::{ProgressSnapshot, ProgressStatus},
    state::{PackState, PackStatus},
    tag::{Tag, TagSet},
};

/// How a request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed { tag: Tag, code: i32 },
    RequiresConfirmation { tag: Tag },
}

/// What a single notification produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Step {
    pub snapshot: Option<ProgressSnapshot>,
    /// Set exactly once over the tracker's lifetime.
    pub outcome:  Option<Outcome>,
}

/// Pending set and settled flag of one download request.
#[derive(Debug)]
pub struct RequestTracker {
    tags:    TagSet,
    pending: BTreeSet<Tag>,
    settled: bool,
}

impl RequestTracker {
    /// Start tracking `tags`; every tag whose state is not `Completed`
    /// (including tags missing from `states`) is pending.
    #[must_use]
    pub fn new(tags: TagSet, states: &HashMap<Tag, PackState>) -> Self {
        let pending = tags
            .iter()
            .filter(|tag| !states.get(*tag).is_some_and(PackState::is_completed))
            .cloned()
            .collect();
        Self {
            tags,
            pending,
            settled: false,
        }
    }

    #[must_use]
    pub const fn pending(&self) -> &BTreeSet<Tag> { &self.pending }

    /// Nothing left to download.
    #[must_use]
    pub fn is_satisfied(&self) -> bool { self.pending.is_empty() }

    #[must_use]
    pub const fn is_settled(&self) -> bool { self.settled }

    /// Settle a request whose tags were all complete up front, returning
    /// the `completed` snapshot owed to observers for each tag.
    ///
    /// Returns nothing if the request is not satisfied or already settled.
    pub fn settle_satisfied(&mut self, states: &HashMap<Tag, PackState>) -> Vec<ProgressSnapshot> {
        if self.settled || !self.is_satisfied() {
            return Vec::new();
        }
        self.settled = true;
        self.tags
            .iter()
            .map(|tag| {
                let total = states.get(tag).map_or(0, |state| state.total_bytes);
                ProgressSnapshot::completed(tag.clone(), total)
            })
            .collect()
    }

    /// Apply one backend notification.
    ///
    /// Notifications after settlement, or for tags outside the request, are
    /// discarded. The first terminal condition wins.
    pub fn apply(&mut self, state: &PackState) -> Step {
        if self.settled || !self.tags.contains(state.tag.as_str()) {
            return Step::default();
        }

        match state.status {
            PackStatus::NotInstalled => Step::default(),
            PackStatus::Downloading | PackStatus::Transferring => Step {
                snapshot: Some(ProgressSnapshot::in_flight(state, ProgressStatus::Downloading)),
                outcome:  None,
            },
            PackStatus::WaitingForNetwork => Step {
                snapshot: Some(ProgressSnapshot::in_flight(state, ProgressStatus::Waiting)),
                outcome:  None,
            },
            PackStatus::Completed => {
                self.pending.remove(&state.tag);
                let outcome = self.pending.is_empty().then(|| {
                    self.settled = true;
                    Outcome::Completed
                });
                Step {
                    snapshot: Some(ProgressSnapshot::completed(
                        state.tag.clone(),
                        state.total_bytes,
                    )),
                    outcome,
                }
            }
            PackStatus::Failed => {
                self.settled = true;
                Step {
                    snapshot: Some(ProgressSnapshot::in_flight(state, ProgressStatus::Failed)),
                    outcome:  Some(Outcome::Failed {
                        tag:  state.tag.clone(),
                        code: state.error_code,
                    }),
                }
            }
            PackStatus::RequiresUserConfirmation => {
                self.settled = true;
                Step {
                    snapshot: None,
                    outcome:  Some(Outcome::RequiresConfirmation {
                        tag: state.tag.clone(),
                    }),
                }
            }
        }
    }
}
