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
    collections::{HashMap, HashSet},
    io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use snafu::ResultExt;
use tokio::{
    fs,
    io::{AsyncReadExt, AsyncWriteExt},
    sync::Notify,
};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{
    BackendKind, BackendResult, DeliveryBackend, IoSnafu, ListenerRegistry, Subscription,
    SubscriptionId,
};
use crate::{
    config::LocalPackConfig,
    locator,
    state::{PackState, PackStatus, error_code},
    tag::{Tag, TagSet},
};

/// Pack manager over two directories: packs are fetched from
/// `origin_dir/<tag>` and installed into `install_dir/<tag>`.
///
/// Every install runs on its own tokio task and reports through the
/// listener registry, so any number of requests can observe the same pack.
#[derive(Clone)]
pub struct LocalPackBackend {
    inner: Arc<Inner>,
}

struct Inner {
    config:    LocalPackConfig,
    listeners: ListenerRegistry,
    /// Latest state of each install in flight.
    transfers: Mutex<HashMap<Tag, PackState>>,
    /// Held while `fetch` inspects installed packs or `release` removes
    /// them, so neither sees the other half done.
    catalog:   tokio::sync::Mutex<()>,
    confirmed: Mutex<HashSet<Tag>>,
    online:    AtomicBool,
    reconnect: Notify,
}

impl LocalPackBackend {
    #[must_use]
    pub fn new(config: LocalPackConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                listeners: ListenerRegistry::new(),
                transfers: Mutex::new(HashMap::new()),
                catalog: tokio::sync::Mutex::new(()),
                confirmed: Mutex::new(HashSet::new()),
                online: AtomicBool::new(true),
                reconnect: Notify::new(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &LocalPackConfig { &self.inner.config }

    /// Grant consent for a pack above the confirmation threshold. Takes
    /// effect on the next fetch.
    pub fn confirm(&self, tag: &Tag) {
        info!(%tag, "user confirmed pack download");
        self.inner.confirmed.lock().insert(tag.clone());
    }

    /// Installs in flight pause while offline and resume once back online.
    pub fn set_online(&self, online: bool) {
        if self.inner.online.swap(online, Ordering::AcqRel) == online {
            return;
        }
        info!(online, "connectivity changed");
        if online {
            self.inner.reconnect.notify_waiters();
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool { self.inner.online.load(Ordering::Acquire) }

    /// Number of live state listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize { self.inner.listeners.len() }
}

impl std::fmt::Debug for LocalPackBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPackBackend")
            .field("origin_dir", &self.inner.config.origin_dir)
            .field("install_dir", &self.inner.config.install_dir)
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}

/// Directory name for `tag`, if it is usable as one. Names starting with a
/// dot are reserved for partial installs.
fn pack_dir_name(tag: &Tag) -> Option<String> {
    locator::resource_file_name(tag.as_str(), "").filter(|name| !name.starts_with('.'))
}

impl Inner {
    fn update(&self, state: PackState) {
        self.transfers.lock().insert(state.tag.clone(), state.clone());
        self.listeners.publish(&state);
    }

    fn finish(&self, state: &PackState) {
        self.transfers.lock().remove(&state.tag);
        self.listeners.publish(state);
    }

    async fn state_of(&self, tag: &Tag) -> BackendResult<PackState> {
        let in_flight = self.transfers.lock().get(tag).cloned();
        if let Some(state) = in_flight {
            return Ok(state);
        }
        let Some(name) = pack_dir_name(tag) else {
            return Ok(PackState::not_installed(tag.clone(), 0));
        };
        let installed = self.config.install_dir.join(&name);
        let size = pack_size(&installed)
            .await
            .context(IoSnafu { path: installed.clone() })?;
        if let Some(size) = size {
            return Ok(PackState::completed(tag.clone(), size));
        }
        let origin = self.config.origin_dir.join(&name);
        let total = pack_size(&origin).await.ok().flatten().unwrap_or_default();
        Ok(PackState::not_installed(tag.clone(), total))
    }

    async fn run_install(self: Arc<Self>, tag: Tag, name: String) {
        info!(%tag, "install started");
        let state = self.install(&tag, &name).await;
        match state.status {
            PackStatus::Completed => info!(%tag, bytes = state.total_bytes, "install completed"),
            PackStatus::RequiresUserConfirmation => info!(%tag, "install awaits user confirmation"),
            _ => warn!(%tag, code = state.error_code, "install failed"),
        }
        self.finish(&state);
    }

    /// Runs one install to a terminal state.
    async fn install(&self, tag: &Tag, name: &str) -> PackState {
        let target = self.config.install_dir.join(name);
        match pack_size(&target).await {
            Ok(Some(size)) => return PackState::completed(tag.clone(), size),
            Ok(None) => {}
            Err(err) => return internal_failure(tag, &target, &err),
        }

        let origin = self.config.origin_dir.join(name);
        let total = match pack_size(&origin).await {
            Ok(Some(total)) => total,
            Ok(None) => {
                debug!(%tag, origin = %origin.display(), "pack source missing");
                return PackState::failed(tag.clone(), error_code::PACK_UNAVAILABLE);
            }
            Err(err) => return internal_failure(tag, &origin, &err),
        };
        if self
            .config
            .confirm_above
            .is_some_and(|limit| total > limit && !self.confirmed.lock().contains(tag))
        {
            return PackState::requires_confirmation(tag.clone(), total);
        }

        let partial = self.config.install_dir.join(format!(".{name}.partial"));
        if let Err(err) = self.copy_pack(tag, &origin, &partial, total).await {
            discard(&partial).await;
            return internal_failure(tag, &partial, &err);
        }

        self.update(
            PackState::builder()
                .tag(tag.clone())
                .status(PackStatus::Transferring)
                .bytes_downloaded(total)
                .total_bytes(total)
                .build(),
        );
        if let Err(err) = fs::rename(&partial, &target).await {
            discard(&partial).await;
            return internal_failure(tag, &target, &err);
        }
        PackState::completed(tag.clone(), total)
    }

    async fn copy_pack(&self, tag: &Tag, origin: &Path, partial: &Path, total: u64) -> io::Result<()> {
        discard(partial).await;
        fs::create_dir_all(partial).await?;

        let mut copied = 0;
        self.wait_online(tag, copied, total).await;
        self.update(PackState::downloading(tag.clone(), copied, total));

        let mut buf = vec![0; self.config.chunk_size.max(1)];
        for (relative, _) in walk(origin).await? {
            let dst = partial.join(&relative);
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent).await?;
            }
            let mut reader = fs::File::open(origin.join(&relative)).await?;
            let mut writer = fs::File::create(&dst).await?;
            loop {
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                writer.write_all(&buf[..n]).await?;
                copied += n as u64;
                self.wait_online(tag, copied, total).await;
                self.update(PackState::downloading(tag.clone(), copied, total));
            }
            writer.flush().await?;
        }
        Ok(())
    }

    async fn wait_online(&self, tag: &Tag, copied: u64, total: u64) {
        if self.online.load(Ordering::Acquire) {
            return;
        }
        self.update(PackState::waiting_for_network(tag.clone(), copied, total));
        loop {
            // Registered before the check so a reconnect in between is not lost.
            let reconnected = self.reconnect.notified();
            if self.online.load(Ordering::Acquire) {
                return;
            }
            reconnected.await;
        }
    }
}

fn internal_failure(tag: &Tag, path: &Path, err: &io::Error) -> PackState {
    warn!(%tag, path = %path.display(), %err, "install I/O error");
    PackState::failed(tag.clone(), error_code::INTERNAL_ERROR)
}

async fn discard(path: &Path) {
    match fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), %err, "failed to remove partial install"),
    }
}

/// Total size of the pack at `dir`, or `None` if there is no pack there.
async fn pack_size(dir: &Path) -> io::Result<Option<u64>> {
    match fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Ok(None),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    }
    Ok(Some(walk(dir).await?.iter().map(|(_, len)| len).sum()))
}

/// Files below `root` with their sizes, relative to `root` and sorted by
/// name within each directory. Symlinks are followed.
async fn walk(root: &Path) -> io::Result<Vec<(PathBuf, u64)>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        for entry in WalkDir::new(&root).follow_links(true).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let len = entry.metadata()?.len();
            let relative = entry
                .path()
                .strip_prefix(&root)
                .map_err(io::Error::other)?
                .to_path_buf();
            files.push((relative, len));
        }
        Ok::<_, io::Error>(files)
    })
    .await
    .map_err(io::Error::other)?
}

#[async_trait]
impl DeliveryBackend for LocalPackBackend {
    fn kind(&self) -> BackendKind { BackendKind::PackManager }

    async fn query_states(&self, tags: &TagSet) -> BackendResult<HashMap<Tag, PackState>> {
        let mut states = HashMap::with_capacity(tags.len());
        for tag in tags {
            states.insert(tag.clone(), self.inner.state_of(tag).await?);
        }
        Ok(states)
    }

    fn subscribe(&self) -> Subscription { self.inner.listeners.register() }

    fn unsubscribe(&self, id: SubscriptionId) {
        if !self.inner.listeners.unregister(id) {
            debug!(%id, "unsubscribe of unknown listener");
        }
    }

    async fn fetch(&self, tags: &TagSet) -> BackendResult<()> {
        let _catalog = self.inner.catalog.lock().await;
        for tag in tags {
            let Some(name) = pack_dir_name(tag) else {
                self.inner
                    .listeners
                    .publish(&PackState::failed(tag.clone(), error_code::INVALID_REQUEST));
                continue;
            };
            let installed = self.inner.config.install_dir.join(&name);
            let size = pack_size(&installed)
                .await
                .context(IoSnafu { path: installed.clone() })?;
            if let Some(size) = size {
                debug!(%tag, "already installed");
                self.inner.listeners.publish(&PackState::completed(tag.clone(), size));
                continue;
            }
            {
                let mut transfers = self.inner.transfers.lock();
                if transfers.contains_key(tag) {
                    debug!(%tag, "install already in flight");
                    continue;
                }
                transfers.insert(tag.clone(), PackState::downloading(tag.clone(), 0, 0));
            }
            tokio::spawn(Arc::clone(&self.inner).run_install(tag.clone(), name));
        }
        Ok(())
    }

    async fn release(&self, tags: &TagSet) -> BackendResult<()> {
        let _catalog = self.inner.catalog.lock().await;
        for tag in tags {
            let Some(name) = pack_dir_name(tag) else {
                continue;
            };
            if self.inner.transfers.lock().contains_key(tag) {
                debug!(%tag, "not removing pack with install in flight");
                continue;
            }
            let installed = self.inner.config.install_dir.join(name);
            match fs::remove_dir_all(&installed).await {
                Ok(()) => info!(%tag, "pack removed"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err).context(IoSnafu { path: installed.clone() }),
            }
        }
        Ok(())
    }

    async fn locations(&self) -> BackendResult<Vec<PathBuf>> {
        let root = &self.inner.config.install_dir;
        let mut entries = match fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err).context(IoSnafu { path: root.clone() }),
        };
        let mut dirs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .context(IoSnafu { path: root.clone() })?
        {
            let is_dir = entry
                .file_type()
                .await
                .is_ok_and(|file_type| file_type.is_dir());
            if is_dir && !entry.file_name().to_string_lossy().starts_with('.') {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}
