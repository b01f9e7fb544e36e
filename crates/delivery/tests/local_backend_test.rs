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

use std::{path::Path, sync::Arc, time::Duration};

use dynres_delivery::{
    BackendKind, CoordinatorConfig, DeliveryBackend, DownloadCoordinator, Error, LocalPackBackend,
    LocalPackConfig, PackStatus, ProgressStatus, ReservationBackend, ReservationConfig, Tag, TagSet,
    state::error_code,
};
use dynres_error::{ErrorCode, ErrorExt};
use tempfile::TempDir;

struct Fixture {
    origin:  TempDir,
    install: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            origin:  tempfile::tempdir().unwrap(),
            install: tempfile::tempdir().unwrap(),
        }
    }

    fn add_pack(&self, tag: &str, files: &[(&str, usize)]) {
        for (name, len) in files {
            let path = self.origin.path().join(tag).join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, vec![7u8; *len]).unwrap();
        }
    }

    fn config(&self) -> LocalPackConfig {
        LocalPackConfig::builder()
            .origin_dir(self.origin.path())
            .install_dir(self.install.path())
            .chunk_size(1024)
            .build()
    }

    fn installed(&self, tag: &str) -> bool { self.install.path().join(tag).is_dir() }
}

fn coordinator<B: DeliveryBackend + 'static>(backend: B) -> DownloadCoordinator {
    DownloadCoordinator::new(Arc::new(backend), &CoordinatorConfig::default())
}

fn file_len(path: &Path) -> u64 { std::fs::metadata(path).unwrap().len() }

#[tokio::test]
async fn test_download_installs_pack_with_progress() {
    dynres_common_telemetry::init_default_ut_logging();
    let fixture = Fixture::new();
    fixture.add_pack("level1", &[("kichi512.png", 4096), ("maps/world.bin", 1000)]);
    let coordinator = coordinator(LocalPackBackend::new(fixture.config()));
    let mut rx = coordinator.subscribe_progress();

    assert!(!coordinator.check_resources_available(["level1"]).await.unwrap());
    assert!(coordinator.download_resources(["level1"]).await.unwrap());
    assert!(coordinator.check_resources_available(["level1"]).await.unwrap());
    assert_eq!(
        file_len(&fixture.install.path().join("level1/maps/world.bin")),
        1000
    );
    assert!(!fixture.install.path().join(".level1.partial").exists());

    let mut events = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        events.push(snapshot);
    }
    let last = events.pop().unwrap();
    assert_eq!(last.status, ProgressStatus::Completed);
    assert_eq!(last.total_bytes, 5096);
    assert!(events.iter().all(|event| event.status == ProgressStatus::Downloading));
    assert!(
        events
            .windows(2)
            .all(|pair| pair[0].bytes_downloaded <= pair[1].bytes_downloaded)
    );
    assert!(events.len() >= 5);
}

#[tokio::test]
async fn test_resource_path_resolves_into_installed_pack() {
    let fixture = Fixture::new();
    fixture.add_pack("images", &[("kichi512.png", 16)]);
    let coordinator = coordinator(LocalPackBackend::new(fixture.config()));

    let err = coordinator.resource_path("kichi512", "png").await.unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::ResourceNotFound);

    coordinator.download_resources(["images"]).await.unwrap();
    let path = coordinator.resource_path("kichi512", "png").await.unwrap();
    assert_eq!(path, fixture.install.path().join("images/kichi512.png"));
}

#[tokio::test]
async fn test_end_accessing_removes_pack() {
    let fixture = Fixture::new();
    fixture.add_pack("level1", &[("data", 10)]);
    let coordinator = coordinator(LocalPackBackend::new(fixture.config()));

    coordinator.download_resources(["level1"]).await.unwrap();
    assert!(fixture.installed("level1"));
    coordinator.end_accessing_resources(["level1"]).await;
    assert!(!fixture.installed("level1"));
    assert!(!coordinator.check_resources_available(["level1"]).await.unwrap());
}

#[tokio::test]
async fn test_missing_pack_fails_as_unavailable() {
    let fixture = Fixture::new();
    fixture.add_pack("present", &[("data", 10)]);
    let coordinator = coordinator(LocalPackBackend::new(fixture.config()));

    let err = coordinator
        .download_resources(["present", "absent"])
        .await
        .unwrap_err();
    assert!(matches!(&err, Error::DownloadFailed { tag, .. } if tag.as_str() == "absent"));
    assert_eq!(err.native_code(), Some(error_code::PACK_UNAVAILABLE));
}

#[tokio::test]
async fn test_nested_tag_is_invalid_request() {
    let fixture = Fixture::new();
    let coordinator = coordinator(LocalPackBackend::new(fixture.config()));

    let err = coordinator.download_resources(["../escape"]).await.unwrap_err();
    assert_eq!(err.native_code(), Some(error_code::INVALID_REQUEST));
}

#[tokio::test]
async fn test_large_pack_requires_confirmation() {
    let fixture = Fixture::new();
    fixture.add_pack("movie", &[("intro.mp4", 2048)]);
    let mut config = fixture.config();
    config.confirm_above = Some(1024);
    let backend = LocalPackBackend::new(config);
    let coordinator = coordinator(backend.clone());

    let err = coordinator.download_resources(["movie"]).await.unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::RequiresUserConfirmation);
    assert!(!fixture.installed("movie"));

    backend.confirm(&Tag::new("movie").unwrap());
    assert!(coordinator.download_resources(["movie"]).await.unwrap());
    assert!(fixture.installed("movie"));
}

#[tokio::test]
async fn test_offline_install_waits_for_network() {
    let fixture = Fixture::new();
    fixture.add_pack("level2", &[("data", 3000)]);
    let backend = LocalPackBackend::new(fixture.config());
    backend.set_online(false);
    let coordinator = Arc::new(coordinator(backend.clone()));
    let mut rx = coordinator.subscribe_progress();

    let task = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move { coordinator.download_resources(["level2"]).await }
    });
    let waiting = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(waiting.status, ProgressStatus::Waiting);
    assert!(!task.is_finished());

    backend.set_online(true);
    let resolved = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(resolved.unwrap());
}

#[tokio::test]
async fn test_fetch_reannounces_installed_pack() {
    let fixture = Fixture::new();
    fixture.add_pack("level1", &[("data", 10)]);
    let backend = LocalPackBackend::new(fixture.config());
    let tags = TagSet::new(["level1"]).unwrap();
    let mut subscription = backend.subscribe();

    backend.fetch(&tags).await.unwrap();
    let completed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let state = subscription.next().await.unwrap();
            if state.status == PackStatus::Completed {
                break state;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(completed.total_bytes, 10);

    backend.fetch(&tags).await.unwrap();
    let state = subscription.try_next().unwrap();
    assert_eq!(state.status, PackStatus::Completed);

    backend.unsubscribe(subscription.id());
    assert_eq!(backend.listener_count(), 0);
}

#[tokio::test]
async fn test_query_reports_origin_size_and_locations_are_sorted() {
    let fixture = Fixture::new();
    fixture.add_pack("b", &[("data", 5)]);
    fixture.add_pack("a", &[("data", 7)]);
    let backend = LocalPackBackend::new(fixture.config());

    let states = backend
        .query_states(&TagSet::new(["a", "missing"]).unwrap())
        .await
        .unwrap();
    assert_eq!(states["a"].status, PackStatus::NotInstalled);
    assert_eq!(states["a"].total_bytes, 7);
    assert_eq!(states["missing"].total_bytes, 0);
    assert!(backend.locations().await.unwrap().is_empty());

    let coordinator = coordinator(backend.clone());
    coordinator.download_resources(["b", "a"]).await.unwrap();
    assert_eq!(
        backend.locations().await.unwrap(),
        vec![fixture.install.path().join("a"), fixture.install.path().join("b")]
    );
}

#[tokio::test]
async fn test_reservation_backend_keeps_high_priority_packs() {
    let fixture = Fixture::new();
    fixture.add_pack("keep", &[("data", 10)]);
    fixture.add_pack("drop", &[("data", 10)]);
    let backend = Arc::new(ReservationBackend::new(
        LocalPackBackend::new(fixture.config()),
        ReservationConfig::default(),
    ));
    let shared: Arc<dyn DeliveryBackend> = backend.clone();
    let coordinator = DownloadCoordinator::new(shared, &CoordinatorConfig::default());
    assert_eq!(coordinator.backend_kind(), BackendKind::Reservation);

    coordinator.download_resources(["keep"]).await.unwrap();
    coordinator.download_resources(["drop"]).await.unwrap();
    assert_eq!(backend.holds("keep"), 1);
    coordinator.set_preservation_priority(1.0, ["keep"]).await;
    coordinator.set_preservation_priority(0.2, ["drop"]).await;
    assert_eq!(backend.preservation_priority("drop"), Some(0.2));

    coordinator.end_accessing_resources(["keep"]).await;
    coordinator.end_accessing_resources(["drop"]).await;
    assert!(fixture.installed("keep"));
    assert!(!fixture.installed("drop"));
    assert_eq!(backend.holds("keep"), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_pack_files_are_installed() {
    let fixture = Fixture::new();
    let shared = tempfile::tempdir().unwrap();
    let target = shared.path().join("kichi512.png");
    std::fs::write(&target, vec![3u8; 64]).unwrap();
    std::fs::create_dir_all(fixture.origin.path().join("images")).unwrap();
    std::os::unix::fs::symlink(&target, fixture.origin.path().join("images/kichi512.png")).unwrap();
    let coordinator = coordinator(LocalPackBackend::new(fixture.config()));

    assert!(coordinator.download_resources(["images"]).await.unwrap());
    let path = coordinator.resource_path("kichi512", "png").await.unwrap();
    assert_eq!(file_len(&path), 64);
}

#[tokio::test]
async fn test_fetch_during_release_reinstalls_pack() {
    let fixture = Fixture::new();
    fixture.add_pack("level1", &[("a", 4096), ("b", 4096), ("c", 4096)]);
    let backend = LocalPackBackend::new(fixture.config());
    coordinator(backend.clone())
        .download_resources(["level1"])
        .await
        .unwrap();
    assert!(fixture.installed("level1"));

    let tags = TagSet::new(["level1"]).unwrap();
    let mut subscription = backend.subscribe();
    let (released, fetched) = tokio::join!(backend.release(&tags), backend.fetch(&tags));
    released.unwrap();
    fetched.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let state = subscription.next().await.unwrap();
            if state.status == PackStatus::Completed {
                break;
            }
        }
    })
    .await
    .unwrap();
    assert!(fixture.installed("level1"));
}
