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

use std::{path::PathBuf, sync::Arc};

use dynres_error::ErrorExt;
use snafu::{OptionExt, ResultExt};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::{
    backend::{BackendKind, DeliveryBackend, SubscriptionId},
    config::CoordinatorConfig,
    err::{
        CheckResourcesSnafu, DownloadFailedSnafu, FetchSnafu, ListLocationsSnafu,
        NotImplementedSnafu, QueryForDownloadSnafu, RequiresConfirmationSnafu, ResourceNotFoundSnafu,
        Result, StreamClosedSnafu,
    },
    locator,
    metrics::{DELIVERY_ACTIVE_SUBSCRIPTIONS, DELIVERY_REQUESTS_SETTLED, DELIVERY_REQUESTS_STARTED},
    progress::{ProgressBus, ProgressSnapshot},
    reservations::{Reservation, ReservationTable},
    tag::TagSet,
    tracker::{Outcome, RequestTracker},
};

/// Unified entry point for on-demand resources.
///
/// Translates a backend's per-tag notification stream into one future per
/// request that settles exactly once, plus a best-effort progress stream.
///
/// The coordinator is purely reactive: it spawns nothing and never polls.
/// A request whose backend never reports a terminal state stays pending;
/// wrap the call in `tokio::time::timeout` if that matters. Dropping a
/// pending `download_resources` future releases its backend subscription.
pub struct DownloadCoordinator {
    backend:      Arc<dyn DeliveryBackend>,
    progress:     ProgressBus,
    reservations: ReservationTable,
}

impl DownloadCoordinator {
    #[must_use]
    pub fn new(backend: Arc<dyn DeliveryBackend>, config: &CoordinatorConfig) -> Self {
        Self {
            backend,
            progress: ProgressBus::new(config.progress_capacity),
            reservations: ReservationTable::default(),
        }
    }

    #[must_use]
    pub fn backend_kind(&self) -> BackendKind { self.backend.kind() }

    /// Observe progress snapshots of every request from now on.
    #[must_use]
    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressSnapshot> {
        self.progress.subscribe()
    }

    /// Whether every tag is already delivered. Never fetches or subscribes.
    #[instrument(skip_all)]
    pub async fn check_resources_available<I, S>(&self, tags: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = TagSet::new(tags)?;
        let states = self
            .backend
            .query_states(&tags)
            .await
            .context(CheckResourcesSnafu { tags: tags.clone() })?;
        let available = tags
            .iter()
            .all(|tag| states.get(tag).is_some_and(|state| state.is_completed()));
        debug!(%tags, available, "checked availability");
        Ok(available)
    }

    /// Deliver every tag, resolving `true` once all are complete.
    ///
    /// A failure of any single tag, or any tag needing user confirmation,
    /// rejects the whole request. Nothing is retried.
    #[instrument(skip_all)]
    pub async fn download_resources<I, S>(&self, tags: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = TagSet::new(tags)?;
        DELIVERY_REQUESTS_STARTED.inc();

        let result = self.run_download(&tags).await;
        let outcome = match &result {
            Ok(_) => "completed",
            Err(err) => err.error_code().as_str(),
        };
        DELIVERY_REQUESTS_SETTLED.with_label_values(&[outcome]).inc();
        match &result {
            Ok(_) => info!(%tags, "download settled"),
            Err(err) => info!(%tags, error = %err, "download rejected"),
        }
        result
    }

    async fn run_download(&self, tags: &TagSet) -> Result<bool> {
        let states = self
            .backend
            .query_states(tags)
            .await
            .context(QueryForDownloadSnafu { tags: tags.clone() })?;

        let mut tracker = RequestTracker::new(tags.clone(), &states);
        if tracker.is_satisfied() {
            debug!(%tags, "already delivered");
            for snapshot in tracker.settle_satisfied(&states) {
                self.progress.emit(snapshot);
            }
            self.hold(tags).await;
            return Ok(true);
        }
        debug!(%tags, pending = tracker.pending().len(), "fetching");

        let mut subscription = self.backend.subscribe();
        let guard = SubscriptionGuard::new(self.backend.as_ref(), subscription.id());
        self.backend
            .fetch(tags)
            .await
            .context(FetchSnafu { tags: tags.clone() })?;

        let outcome = loop {
            let state = subscription
                .next()
                .await
                .context(StreamClosedSnafu { tags: tags.clone() })?;
            let step = tracker.apply(&state);
            if let Some(snapshot) = step.snapshot {
                self.progress.emit(snapshot);
            }
            if let Some(outcome) = step.outcome {
                break outcome;
            }
        };
        drop(guard);

        match outcome {
            Outcome::Completed => {
                self.hold(tags).await;
                Ok(true)
            }
            Outcome::Failed { tag, code } => DownloadFailedSnafu { tag, code }.fail(),
            Outcome::RequiresConfirmation { tag } => RequiresConfirmationSnafu { tag }.fail(),
        }
    }

    async fn hold(&self, tags: &TagSet) {
        if !self.reservations.insert(tags.clone()).await {
            return;
        }
        if let Err(err) = self.backend.retain(tags).await {
            warn!(%tags, %err, "backend refused to retain delivered tags");
        }
    }

    /// Release the reservation held for exactly this tag set. Unknown sets
    /// are ignored, and a failing release is logged rather than returned.
    #[instrument(skip_all)]
    pub async fn end_accessing_resources<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = match TagSet::new(tags) {
            Ok(tags) => tags,
            Err(err) => {
                debug!(%err, "ignoring release of invalid tags");
                return;
            }
        };
        if self.reservations.remove(&tags).await.is_none() {
            debug!(%tags, "no reservation held");
            return;
        }
        match self.backend.release(&tags).await {
            Ok(()) => debug!(%tags, "released"),
            Err(err) => warn!(%tags, %err, "failed to release tags"),
        }
    }

    /// Path of `name.ext` in the first resource location that has it.
    #[instrument(skip(self))]
    pub async fn resource_path(&self, name: &str, ext: &str) -> Result<PathBuf> {
        let display = if ext.is_empty() {
            name.to_string()
        } else {
            format!("{name}.{ext}")
        };
        let file = locator::resource_file_name(name, ext).context(ResourceNotFoundSnafu {
            file: display.clone(),
        })?;
        let locations = match self.backend.locations().await {
            Ok(locations) => locations,
            Err(err) if err.is_unsupported() => {
                return NotImplementedSnafu {
                    capability: "resource path lookup",
                    kind:       self.backend.kind(),
                }
                .fail();
            }
            Err(err) => return Err(err).context(ListLocationsSnafu { file: display }),
        };
        locator::locate(&locations, &file)
            .await
            .context(ResourceNotFoundSnafu { file: display })
    }

    /// Forward an eviction hint. NaN is dropped, other values are clamped to
    /// `[0.0, 1.0]`, and backends without the concept ignore it.
    #[instrument(skip_all)]
    pub async fn set_preservation_priority<I, S>(&self, priority: f64, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if priority.is_nan() {
            debug!("ignoring NaN preservation priority");
            return;
        }
        let Ok(tags) = TagSet::new(tags) else {
            debug!("ignoring preservation priority for invalid tags");
            return;
        };
        let priority = priority.clamp(0.0, 1.0);
        match self.backend.set_preservation_priority(priority, &tags).await {
            Ok(()) => debug!(%tags, priority, "preservation priority set"),
            Err(err) if err.is_unsupported() => debug!(%tags, "preservation priority not supported"),
            Err(err) => warn!(%tags, %err, "failed to set preservation priority"),
        }
    }

    /// Reservations currently held, ordered by tag set.
    pub async fn active_reservations(&self) -> Vec<Reservation> { self.reservations.snapshot().await }

    pub async fn is_reserved(&self, tags: &TagSet) -> bool { self.reservations.contains(tags).await }
}

/// Unsubscribes when dropped, which covers settlement, early errors and a
/// caller dropping the download future.
struct SubscriptionGuard<'a> {
    backend: &'a dyn DeliveryBackend,
    id:      SubscriptionId,
}

impl<'a> SubscriptionGuard<'a> {
    fn new(backend: &'a dyn DeliveryBackend, id: SubscriptionId) -> Self {
        DELIVERY_ACTIVE_SUBSCRIPTIONS.inc();
        Self { backend, id }
    }
}

impl Drop for SubscriptionGuard<'_> {
    fn drop(&mut self) {
        self.backend.unsubscribe(self.id);
        DELIVERY_ACTIVE_SUBSCRIPTIONS.dec();
    }
}
