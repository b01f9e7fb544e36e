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

//! Download completion coordination for on-demand resources.
//!
//! A [`DownloadCoordinator`] turns the per-tag notification stream of a
//! [`DeliveryBackend`] into one future per request that settles exactly once,
//! publishes best-effort [`ProgressSnapshot`]s, tracks reservations until the
//! caller ends access, and resolves resource files to paths.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dynres_delivery::{CoordinatorConfig, DownloadCoordinator, LocalPackBackend, LocalPackConfig};
//!
//! # async fn run() -> dynres_delivery::Result<()> {
//! let backend = LocalPackBackend::new(LocalPackConfig::default());
//! let coordinator = DownloadCoordinator::new(Arc::new(backend), &CoordinatorConfig::default());
//! coordinator.download_resources(["level1", "level2"]).await?;
//! let path = coordinator.resource_path("kichi512", "png").await?;
//! coordinator.end_accessing_resources(["level1", "level2"]).await;
//! # let _ = path;
//! # Ok(())
//! # }
//! ```

pub mod backend;
mod config;
mod coordinator;
mod err;
mod locator;
pub mod metrics;
mod progress;
mod reservations;
pub mod state;
mod tag;
pub mod tracker;

pub use backend::{
    BackendError, BackendKind, DeliveryBackend, ListenerRegistry, LocalPackBackend, ReservationBackend,
    Subscription, SubscriptionId,
};
pub use config::{CoordinatorConfig, LocalPackConfig, ReservationConfig};
pub use coordinator::DownloadCoordinator;
pub use err::{Error, Result};
pub use progress::{ProgressSnapshot, ProgressStatus, fraction};
pub use reservations::Reservation;
pub use state::{PackState, PackStatus};
pub use tag::{Tag, TagSet};
