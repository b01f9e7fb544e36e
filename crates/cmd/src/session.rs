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

use std::{fmt::Display, sync::Arc};

use dynres_delivery::{
    BackendKind, DeliveryBackend, DownloadCoordinator, Error, LocalPackBackend, ProgressSnapshot,
    ReservationBackend, Tag,
};
use dynres_error::ErrorExt;
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::settings::Settings;

/// Where command results go: human-readable text, or one JSON object per
/// line on stdout.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    pub const fn new(json: bool) -> Self { Self { json } }

    pub fn value<T: Serialize>(self, value: &T, text: impl Display) {
        if !self.json {
            println!("{text}");
            return;
        }
        match serde_json::to_string(value) {
            Ok(line) => println!("{line}"),
            Err(err) => warn!(%err, "failed to serialize output"),
        }
    }

    pub fn progress(self, snapshot: &ProgressSnapshot) {
        self.value(
            snapshot,
            format_args!(
                "{:<12} {:<11} {:>6.1}% ({}/{} bytes)",
                snapshot.tag,
                snapshot.status,
                snapshot.fraction_completed * 100.0,
                snapshot.bytes_downloaded,
                snapshot.total_bytes
            ),
        );
    }

    pub fn rejection(self, err: &Error) {
        if self.json {
            self.value(&json!({ "error": err.to_rejection() }), "");
        } else {
            eprintln!("error[{}]: {}", err.error_code(), err.output_msg());
        }
    }
}

fn joined<S: AsRef<str>>(tags: &[S]) -> String {
    tags.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
}

fn names<S: AsRef<str>>(tags: &[S]) -> Vec<&str> { tags.iter().map(AsRef::as_ref).collect() }

/// One coordinator over the configured backend, plus the local pack
/// controls the shell exposes.
pub struct Session {
    coordinator: DownloadCoordinator,
    local:       LocalPackBackend,
    reservation: Option<Arc<ReservationBackend<LocalPackBackend>>>,
    output:      Output,
}

impl Session {
    pub fn new(settings: &Settings, output: Output) -> Self {
        let local = LocalPackBackend::new(settings.local.clone());
        let (backend, reservation): (Arc<dyn DeliveryBackend>, _) = match settings.backend {
            BackendKind::PackManager => (Arc::new(local.clone()), None),
            BackendKind::Reservation => {
                let reservation = Arc::new(ReservationBackend::new(
                    local.clone(),
                    settings.reservation.clone(),
                ));
                (reservation.clone(), Some(reservation))
            }
        };
        Self {
            coordinator: DownloadCoordinator::new(backend, &settings.coordinator),
            local,
            reservation,
            output,
        }
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<ProgressSnapshot> {
        self.coordinator.subscribe_progress()
    }

    pub fn on_progress(&self, event: Result<ProgressSnapshot, RecvError>) -> bool {
        match event {
            Ok(snapshot) => {
                self.output.progress(&snapshot);
                true
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "progress output fell behind");
                true
            }
            Err(RecvError::Closed) => false,
        }
    }

    pub async fn check<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        match self.coordinator.check_resources_available(tags).await {
            Ok(available) => {
                let text = if available { "available" } else { "not available" };
                self.output.value(
                    &json!({ "tags": names(tags), "available": available }),
                    format_args!("{}: {text}", joined(tags)),
                );
                true
            }
            Err(err) => {
                self.output.rejection(&err);
                false
            }
        }
    }

    /// Download and report the outcome, printing progress as it arrives.
    pub async fn download<S: AsRef<str> + Sync>(&self, tags: &[S]) -> bool {
        let mut progress = self.subscribe_progress();
        let settle = self.settle(tags);
        tokio::pin!(settle);
        loop {
            tokio::select! {
                biased;
                event = progress.recv() => {
                    self.on_progress(event);
                }
                ok = &mut settle => {
                    while let Ok(snapshot) = progress.try_recv() {
                        self.output.progress(&snapshot);
                    }
                    return ok;
                }
            }
        }
    }

    /// Download and report the outcome only.
    pub async fn settle<S: AsRef<str> + Sync>(&self, tags: &[S]) -> bool {
        match self.coordinator.download_resources(tags).await {
            Ok(downloaded) => {
                self.output.value(
                    &json!({ "tags": names(tags), "downloaded": downloaded }),
                    format_args!("downloaded {}", joined(tags)),
                );
                true
            }
            Err(err) => {
                self.output.rejection(&err);
                false
            }
        }
    }

    pub async fn path(&self, name: &str, ext: &str) -> bool {
        match self.coordinator.resource_path(name, ext).await {
            Ok(path) => {
                self.output
                    .value(&json!({ "path": path }), path.display());
                true
            }
            Err(err) => {
                self.output.rejection(&err);
                false
            }
        }
    }

    pub async fn release<S: AsRef<str>>(&self, tags: &[S]) {
        self.coordinator.end_accessing_resources(tags).await;
        self.output.value(
            &json!({ "tags": names(tags), "released": true }),
            format_args!("released {}", joined(tags)),
        );
    }

    pub async fn priority<S: AsRef<str>>(&self, priority: f64, tags: &[S]) {
        self.coordinator.set_preservation_priority(priority, tags).await;
        let text = match &self.reservation {
            Some(_) => format!("priority of {} set to {priority}", joined(tags)),
            None => format!("{} backend ignores preservation priority", self.coordinator.backend_kind()),
        };
        self.output
            .value(&json!({ "tags": names(tags), "priority": priority }), text);
    }

    pub fn confirm(&self, tag: &str) -> bool {
        match Tag::new(tag) {
            Ok(tag) => {
                self.local.confirm(&tag);
                self.output.value(
                    &json!({ "tag": tag, "confirmed": true }),
                    format_args!("confirmed {tag}, download it again to install"),
                );
                true
            }
            Err(err) => {
                self.output.rejection(&err);
                false
            }
        }
    }

    pub fn set_online(&self, online: bool) {
        self.local.set_online(online);
        let text = if online { "online" } else { "offline" };
        self.output.value(&json!({ "online": online }), text);
    }

    pub async fn reservations(&self) {
        for reservation in self.coordinator.active_reservations().await {
            let holds = self.reservation.as_ref().map(|backend| {
                reservation
                    .tags
                    .iter()
                    .map(|tag| backend.holds(tag.as_str()))
                    .min()
                    .unwrap_or_default()
            });
            self.output.value(
                &json!({
                    "tags": reservation.tags,
                    "acquiredAt": reservation.acquired_at.to_string(),
                    "holds": holds,
                }),
                format_args!("{} (since {})", reservation.tags, reservation.acquired_at),
            );
        }
    }
}
