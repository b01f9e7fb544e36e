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

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use derive_more::Display;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::state::PackState;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
#[display("sub-{_0}")]
pub struct SubscriptionId(u64);

/// Receiving end of a backend state listener.
#[derive(Debug)]
pub struct Subscription {
    id:       SubscriptionId,
    receiver: mpsc::UnboundedReceiver<PackState>,
}

impl Subscription {
    #[must_use]
    pub const fn id(&self) -> SubscriptionId { self.id }

    /// Next state update, or `None` once the backend dropped this listener.
    pub async fn next(&mut self) -> Option<PackState> { self.receiver.recv().await }

    /// Next update if one is already queued.
    pub fn try_next(&mut self) -> Option<PackState> { self.receiver.try_recv().ok() }
}

/// Listener bookkeeping shared by backend implementations.
///
/// Publishing never blocks: each listener has an unbounded queue, and a
/// listener whose receiver is gone is pruned on the next publish.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    next_id:   AtomicU64,
    listeners: Mutex<HashMap<SubscriptionId, mpsc::UnboundedSender<PackState>>>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn register(&self) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, receiver) = mpsc::unbounded_channel();
        self.listeners.lock().insert(id, tx);
        Subscription { id, receiver }
    }

    /// Returns `false` if `id` was not registered.
    pub fn unregister(&self, id: SubscriptionId) -> bool { self.listeners.lock().remove(&id).is_some() }

    pub fn publish(&self, state: &PackState) {
        self.listeners
            .lock()
            .retain(|_, tx| tx.send(state.clone()).is_ok());
    }

    #[must_use]
    pub fn len(&self) -> usize { self.listeners.lock().len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.listeners.lock().is_empty() }
}
