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

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};
use tokio::sync::broadcast;

use crate::{metrics::DELIVERY_PROGRESS_EVENTS, state::PackState, tag::Tag};

/// Status string carried by a progress event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProgressStatus {
    Downloading,
    Waiting,
    Completed,
    Failed,
}

/// Informational transfer state of one tag.
///
/// Snapshots never influence how a request settles. Field names serialize in
/// camelCase, matching the event payload hosts already consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub tag:                Tag,
    pub bytes_downloaded:   u64,
    pub total_bytes:        u64,
    pub fraction_completed: f64,
    pub status:             ProgressStatus,
}

/// `done / total`, or `0.0` when the total is unknown.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fraction(done: u64, total: u64) -> f64 {
    if total > 0 {
        done as f64 / total as f64
    } else {
        0.0
    }
}

impl ProgressSnapshot {
    /// Snapshot of an in-flight state; the fraction is derived from bytes.
    #[must_use]
    pub fn in_flight(state: &PackState, status: ProgressStatus) -> Self {
        Self {
            tag: state.tag.clone(),
            bytes_downloaded: state.bytes_downloaded,
            total_bytes: state.total_bytes,
            fraction_completed: fraction(state.bytes_downloaded, state.total_bytes),
            status,
        }
    }

    /// A finished tag always reports 100% with downloaded bytes equal to the
    /// total, whatever the backend put in `bytes_downloaded`.
    #[must_use]
    pub fn completed(tag: Tag, total_bytes: u64) -> Self {
        Self {
            tag,
            bytes_downloaded: total_bytes,
            total_bytes,
            fraction_completed: 1.0,
            status: ProgressStatus::Completed,
        }
    }
}

/// Fan-out of progress snapshots to any number of observers.
///
/// Emission is best effort: with no observers, or with an observer that
/// lags behind the channel capacity, snapshots are dropped.
#[derive(Debug, Clone)]
pub(crate) struct ProgressBus {
    tx: broadcast::Sender<ProgressSnapshot>,
}

impl ProgressBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ProgressSnapshot> { self.tx.subscribe() }

    pub(crate) fn emit(&self, snapshot: ProgressSnapshot) {
        let status: &'static str = snapshot.status.into();
        DELIVERY_PROGRESS_EVENTS.with_label_values(&[status]).inc();
        tracing::trace!(
            tag = %snapshot.tag,
            status = %snapshot.status,
            fraction = snapshot.fraction_completed,
            "progress"
        );
        let _ = self.tx.send(snapshot);
    }
}
