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

//! Delivery backends and the contract the coordinator drives them through.
//!
//! Two families exist in the wild:
//! - pack-manager style (batch fetch, persistent per-tag state, any number of
//!   state listeners), see [`LocalPackBackend`];
//! - reservation style (one reservation per request with begin/end access
//!   accounting and progress reported per reservation), see
//!   [`ReservationBackend`].
//!
//! The coordinator only ever talks to [`DeliveryBackend`].

mod listeners;
mod local;
mod reservation;

use std::{collections::HashMap, io, path::PathBuf, sync::Arc};

use async_trait::async_trait;
pub use listeners::{ListenerRegistry, Subscription, SubscriptionId};
pub use local::LocalPackBackend;
pub use reservation::ReservationBackend;
use serde::{Deserialize, Serialize};
use snafu::Snafu;
use strum_macros::Display;

use crate::{
    state::PackState,
    tag::{Tag, TagSet},
};

/// Which delivery model a backend follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "kebab-case")]
pub enum BackendKind {
    PackManager,
    Reservation,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BackendError {
    #[snafu(display("I/O error on {}", path.display()))]
    Io {
        path:   PathBuf,
        source: io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Delivery service unavailable: {message}"))]
    Unavailable {
        message: String,
        code:    Option<i32>,
        #[snafu(implicit)]
        loc:     snafu::Location,
    },

    #[snafu(display("{capability} is not supported by this backend"))]
    Unsupported { capability: &'static str },
}

impl BackendError {
    #[must_use]
    pub const fn native_code(&self) -> Option<i32> {
        match self {
            Self::Unavailable { code, .. } => *code,
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_unsupported(&self) -> bool { matches!(self, Self::Unsupported { .. }) }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// A platform delivery service.
///
/// Notifications are pushed to every live [`Subscription`] in the order the
/// backend produces them. A backend may report tags that no particular
/// subscriber asked for; filtering is the subscriber's job.
#[async_trait]
pub trait DeliveryBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Current state of each tag. Tags the backend knows nothing about may
    /// be missing from the map.
    async fn query_states(&self, tags: &TagSet) -> BackendResult<HashMap<Tag, PackState>>;

    fn subscribe(&self) -> Subscription;

    fn unsubscribe(&self, id: SubscriptionId);

    /// Start delivering `tags`. Returns once the request is accepted;
    /// progress arrives through subscriptions.
    async fn fetch(&self, tags: &TagSet) -> BackendResult<()>;

    /// Begin holding `tags` resident on behalf of a settled request.
    async fn retain(&self, _tags: &TagSet) -> BackendResult<()> { Ok(()) }

    /// Stop holding `tags`; the backend may evict or remove them.
    async fn release(&self, tags: &TagSet) -> BackendResult<()>;

    /// Directories that currently hold delivered resources, in lookup order.
    async fn locations(&self) -> BackendResult<Vec<PathBuf>> {
        UnsupportedSnafu {
            capability: "listing resource locations",
        }
        .fail()
    }

    /// Advisory eviction priority in `[0.0, 1.0]`.
    async fn set_preservation_priority(&self, _priority: f64, _tags: &TagSet) -> BackendResult<()> {
        UnsupportedSnafu {
            capability: "preservation priority",
        }
        .fail()
    }
}

#[async_trait]
impl<T: DeliveryBackend + ?Sized> DeliveryBackend for Arc<T> {
    fn kind(&self) -> BackendKind { (**self).kind() }

    async fn query_states(&self, tags: &TagSet) -> BackendResult<HashMap<Tag, PackState>> {
        (**self).query_states(tags).await
    }

    fn subscribe(&self) -> Subscription { (**self).subscribe() }

    fn unsubscribe(&self, id: SubscriptionId) { (**self).unsubscribe(id) }

    async fn fetch(&self, tags: &TagSet) -> BackendResult<()> { (**self).fetch(tags).await }

    async fn retain(&self, tags: &TagSet) -> BackendResult<()> { (**self).retain(tags).await }

    async fn release(&self, tags: &TagSet) -> BackendResult<()> { (**self).release(tags).await }

    async fn locations(&self) -> BackendResult<Vec<PathBuf>> { (**self).locations().await }

    async fn set_preservation_priority(&self, priority: f64, tags: &TagSet) -> BackendResult<()> {
        (**self).set_preservation_priority(priority, tags).await
    }
}
