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

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::tag::Tag;

/// Backend-native error codes reported alongside a `Failed` pack state.
///
/// The values follow the Play Asset Delivery error codes so a pack-manager
/// bridge can forward them untouched.
pub mod error_code {
    pub const NO_ERROR: i32 = 0;
    pub const PACK_UNAVAILABLE: i32 = -2;
    pub const INVALID_REQUEST: i32 = -3;
    pub const INTERNAL_ERROR: i32 = -100;
}

/// Per-tag status as reported by a delivery backend.
///
/// Reservation-style backends only ever report a subset of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PackStatus {
    /// Known to the backend but not installed and not being fetched.
    NotInstalled,
    Downloading,
    /// Downloaded bytes are being moved into their final location.
    Transferring,
    WaitingForNetwork,
    Completed,
    Failed,
    RequiresUserConfirmation,
}

/// One state report for one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct PackState {
    pub tag:              Tag,
    pub status:           PackStatus,
    #[builder(default)]
    pub bytes_downloaded: u64,
    #[builder(default)]
    pub total_bytes:      u64,
    #[builder(default = error_code::NO_ERROR)]
    pub error_code:       i32,
}

impl PackState {
    #[must_use]
    pub fn not_installed(tag: Tag, total_bytes: u64) -> Self {
        Self::builder()
            .tag(tag)
            .status(PackStatus::NotInstalled)
            .total_bytes(total_bytes)
            .build()
    }

    #[must_use]
    pub fn downloading(tag: Tag, bytes_downloaded: u64, total_bytes: u64) -> Self {
        Self::builder()
            .tag(tag)
            .status(PackStatus::Downloading)
            .bytes_downloaded(bytes_downloaded)
            .total_bytes(total_bytes)
            .build()
    }

    #[must_use]
    pub fn waiting_for_network(tag: Tag, bytes_downloaded: u64, total_bytes: u64) -> Self {
        Self::builder()
            .tag(tag)
            .status(PackStatus::WaitingForNetwork)
            .bytes_downloaded(bytes_downloaded)
            .total_bytes(total_bytes)
            .build()
    }

    #[must_use]
    pub fn completed(tag: Tag, total_bytes: u64) -> Self {
        Self::builder()
            .tag(tag)
            .status(PackStatus::Completed)
            .bytes_downloaded(total_bytes)
            .total_bytes(total_bytes)
            .build()
    }

    #[must_use]
    pub fn failed(tag: Tag, error_code: i32) -> Self {
        Self::builder()
            .tag(tag)
            .status(PackStatus::Failed)
            .error_code(error_code)
            .build()
    }

    #[must_use]
    pub fn requires_confirmation(tag: Tag, total_bytes: u64) -> Self {
        Self::builder()
            .tag(tag)
            .status(PackStatus::RequiresUserConfirmation)
            .total_bytes(total_bytes)
            .build()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool { self.status == PackStatus::Completed }
}
