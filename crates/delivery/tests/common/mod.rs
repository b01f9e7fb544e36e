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

//! In-memory delivery backend driven by the test.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use dynres_delivery::{
    BackendKind, DeliveryBackend, ListenerRegistry, PackState, Subscription, SubscriptionId, Tag,
    TagSet,
    backend::{BackendResult, UnavailableSnafu, UnsupportedSnafu},
};
use parking_lot::Mutex;

pub fn tag(name: &str) -> Tag { Tag::new(name).unwrap() }

pub fn tags(names: &[&str]) -> TagSet { TagSet::new(names).unwrap() }

#[derive(Default)]
pub struct ScriptedBackend {
    listeners:    Mutex<ListenerRegistry>,
    states:       Mutex<HashMap<Tag, PackState>>,
    /// Published synchronously from inside `fetch`.
    on_fetch:     Mutex<Vec<PackState>>,
    fetched:      Mutex<Vec<TagSet>>,
    retained:     Mutex<Vec<TagSet>>,
    released:     Mutex<Vec<TagSet>>,
    priorities:   Mutex<Vec<(f64, TagSet)>>,
    locations:    Mutex<Option<Vec<PathBuf>>>,
    fail_query:   Mutex<Option<i32>>,
    fail_fetch:   Mutex<bool>,
    fail_release: Mutex<bool>,
    subscribes:   AtomicUsize,
    unsubscribes: AtomicUsize,
}

impl ScriptedBackend {
    pub fn with_states(states: impl IntoIterator<Item = PackState>) -> Self {
        let backend = Self::default();
        backend
            .states
            .lock()
            .extend(states.into_iter().map(|state| (state.tag.clone(), state)));
        backend
    }

    pub fn on_fetch(&self, states: impl IntoIterator<Item = PackState>) {
        self.on_fetch.lock().extend(states);
    }

    pub fn push(&self, state: PackState) { self.listeners.lock().publish(&state); }

    /// Drop every listener sender, closing open subscriptions.
    pub fn close_listeners(&self) { *self.listeners.lock() = ListenerRegistry::new(); }

    pub fn set_locations(&self, locations: Vec<PathBuf>) { *self.locations.lock() = Some(locations); }

    pub fn fail_query(&self, code: i32) { *self.fail_query.lock() = Some(code); }

    pub fn fail_fetch(&self) { *self.fail_fetch.lock() = true; }

    pub fn fail_release(&self) { *self.fail_release.lock() = true; }

    pub fn fetched(&self) -> Vec<TagSet> { self.fetched.lock().clone() }

    pub fn retained(&self) -> Vec<TagSet> { self.retained.lock().clone() }

    pub fn released(&self) -> Vec<TagSet> { self.released.lock().clone() }

    pub fn priorities(&self) -> Vec<(f64, TagSet)> { self.priorities.lock().clone() }

    pub fn subscribes(&self) -> usize { self.subscribes.load(Ordering::SeqCst) }

    pub fn unsubscribes(&self) -> usize { self.unsubscribes.load(Ordering::SeqCst) }

    pub fn listener_count(&self) -> usize { self.listeners.lock().len() }

    /// Wait until `fetch` was called `n` times.
    pub async fn wait_for_fetches(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.fetched.lock().len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("fetch was never called");
    }
}

#[async_trait]
impl DeliveryBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind { BackendKind::PackManager }

    async fn query_states(&self, tags: &TagSet) -> BackendResult<HashMap<Tag, PackState>> {
        let failure = *self.fail_query.lock();
        if let Some(code) = failure {
            return UnavailableSnafu {
                message: "scripted query failure",
                code:    Some(code),
            }
            .fail();
        }
        let states = self.states.lock();
        Ok(tags
            .iter()
            .filter_map(|tag| states.get(tag).map(|state| (tag.clone(), state.clone())))
            .collect())
    }

    fn subscribe(&self) -> Subscription {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().register()
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().unregister(id);
    }

    async fn fetch(&self, tags: &TagSet) -> BackendResult<()> {
        self.fetched.lock().push(tags.clone());
        let failing = *self.fail_fetch.lock();
        if failing {
            return UnavailableSnafu {
                message: "scripted fetch failure",
                code:    None::<i32>,
            }
            .fail();
        }
        let scripted = std::mem::take(&mut *self.on_fetch.lock());
        let listeners = self.listeners.lock();
        for state in &scripted {
            listeners.publish(state);
        }
        Ok(())
    }

    async fn retain(&self, tags: &TagSet) -> BackendResult<()> {
        self.retained.lock().push(tags.clone());
        Ok(())
    }

    async fn release(&self, tags: &TagSet) -> BackendResult<()> {
        self.released.lock().push(tags.clone());
        let failing = *self.fail_release.lock();
        if failing {
            return UnavailableSnafu {
                message: "scripted release failure",
                code:    None::<i32>,
            }
            .fail();
        }
        Ok(())
    }

    async fn locations(&self) -> BackendResult<Vec<PathBuf>> {
        let locations = self.locations.lock().clone();
        match locations {
            Some(locations) => Ok(locations),
            None => UnsupportedSnafu {
                capability: "listing resource locations",
            }
            .fail(),
        }
    }

    async fn set_preservation_priority(&self, priority: f64, tags: &TagSet) -> BackendResult<()> {
        self.priorities.lock().push((priority, tags.clone()));
        Ok(())
    }
}
