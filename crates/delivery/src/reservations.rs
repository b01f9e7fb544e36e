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

use std::collections::HashMap;

use jiff::Timestamp;
use tokio::sync::Mutex;

use crate::{metrics::DELIVERY_RESERVATIONS, tag::TagSet};

/// A tag set held resident on behalf of a settled download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub tags:        TagSet,
    pub acquired_at: Timestamp,
}

/// Active reservations keyed by exact tag-set identity.
#[derive(Debug, Default)]
pub(crate) struct ReservationTable {
    inner: Mutex<HashMap<TagSet, Reservation>>,
}

impl ReservationTable {
    /// Record a reservation. Returns `false` if the key was already held, in
    /// which case the original reservation is kept.
    pub(crate) async fn insert(&self, tags: TagSet) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.contains_key(&tags) {
            return false;
        }
        inner.insert(
            tags.clone(),
            Reservation {
                tags,
                acquired_at: Timestamp::now(),
            },
        );
        DELIVERY_RESERVATIONS.inc();
        true
    }

    pub(crate) async fn remove(&self, tags: &TagSet) -> Option<Reservation> {
        let removed = self.inner.lock().await.remove(tags);
        if removed.is_some() {
            DELIVERY_RESERVATIONS.dec();
        }
        removed
    }

    pub(crate) async fn contains(&self, tags: &TagSet) -> bool {
        self.inner.lock().await.contains_key(tags)
    }

    /// All reservations, ordered by tag set.
    pub(crate) async fn snapshot(&self) -> Vec<Reservation> {
        let mut all: Vec<_> = self.inner.lock().await.values().cloned().collect();
        all.sort_by(|a, b| a.tags.cmp(&b.tags));
        all
    }
}
