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

use std::{collections::HashMap, path::PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{BackendKind, BackendResult, DeliveryBackend, Subscription, SubscriptionId};
use crate::{
    config::ReservationConfig,
    state::PackState,
    tag::{Tag, TagSet},
};

/// Begin/end access accounting on top of another backend.
///
/// Each `retain` begins access to its tags and each `release` ends it. The
/// wrapped backend only sees a release once nobody accesses a tag any more
/// and the tag's preservation priority does not keep it resident.
#[derive(Debug)]
pub struct ReservationBackend<B> {
    inner:      B,
    config:     ReservationConfig,
    holds:      Mutex<HashMap<Tag, usize>>,
    priorities: Mutex<HashMap<Tag, f64>>,
}

impl<B: DeliveryBackend> ReservationBackend<B> {
    pub fn new(inner: B, config: ReservationConfig) -> Self {
        Self {
            inner,
            config,
            holds: Mutex::new(HashMap::new()),
            priorities: Mutex::new(HashMap::new()),
        }
    }

    pub const fn inner(&self) -> &B { &self.inner }

    /// Accesses currently open on `tag`.
    pub fn holds(&self, tag: &str) -> usize { self.holds.lock().get(tag).copied().unwrap_or_default() }

    pub fn preservation_priority(&self, tag: &str) -> Option<f64> { self.priorities.lock().get(tag).copied() }

    fn keeps_resident(&self, tag: &Tag) -> bool {
        self.priorities
            .lock()
            .get(tag)
            .is_some_and(|priority| *priority >= self.config.keep_resident_at)
    }
}

#[async_trait]
impl<B: DeliveryBackend> DeliveryBackend for ReservationBackend<B> {
    fn kind(&self) -> BackendKind { BackendKind::Reservation }

    async fn query_states(&self, tags: &TagSet) -> BackendResult<HashMap<Tag, PackState>> {
        self.inner.query_states(tags).await
    }

    fn subscribe(&self) -> Subscription { self.inner.subscribe() }

    fn unsubscribe(&self, id: SubscriptionId) { self.inner.unsubscribe(id) }

    async fn fetch(&self, tags: &TagSet) -> BackendResult<()> { self.inner.fetch(tags).await }

    async fn retain(&self, tags: &TagSet) -> BackendResult<()> {
        self.inner.retain(tags).await?;
        let mut holds = self.holds.lock();
        for tag in tags {
            *holds.entry(tag.clone()).or_default() += 1;
        }
        Ok(())
    }

    async fn release(&self, tags: &TagSet) -> BackendResult<()> {
        let ended = {
            let mut holds = self.holds.lock();
            tags.iter()
                .filter(|tag| match holds.get_mut(*tag) {
                    Some(count) if *count > 1 => {
                        *count -= 1;
                        false
                    }
                    Some(_) => {
                        holds.remove(*tag);
                        true
                    }
                    None => false,
                })
                .cloned()
                .collect::<Vec<_>>()
        };
        let evictable = ended.into_iter().filter(|tag| {
            let keep = self.keeps_resident(tag);
            if keep {
                debug!(%tag, "kept resident by preservation priority");
            }
            !keep
        });
        match TagSet::from_tags(evictable) {
            Some(evictable) => self.inner.release(&evictable).await,
            None => Ok(()),
        }
    }

    async fn locations(&self) -> BackendResult<Vec<PathBuf>> { self.inner.locations().await }

    async fn set_preservation_priority(&self, priority: f64, tags: &TagSet) -> BackendResult<()> {
        let mut priorities = self.priorities.lock();
        for tag in tags {
            priorities.insert(tag.clone(), priority);
        }
        Ok(())
    }
}
