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

use std::path::PathBuf;

use bon::Builder;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Builder)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Progress snapshots buffered per observer before a slow observer
    /// starts missing events.
    #[default = 256]
    #[builder(default = 256)]
    pub progress_capacity: usize,
}

/// Settings for the filesystem pack-manager backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Builder)]
#[serde(default)]
#[builder(on(PathBuf, into))]
pub struct LocalPackConfig {
    /// Where pack sources live, one directory per tag.
    #[default(_code = "PathBuf::from(\"packs\")")]
    #[builder(default = PathBuf::from("packs"))]
    pub origin_dir: PathBuf,

    /// Where installed packs live, one directory per tag.
    #[default(_code = "default_install_dir()")]
    #[builder(default = default_install_dir())]
    pub install_dir: PathBuf,

    /// Bytes copied between two progress updates.
    #[default = 65_536]
    #[builder(default = 65_536)]
    pub chunk_size: usize,

    /// Packs larger than this need [`confirm`](crate::LocalPackBackend::confirm)
    /// before they are fetched. `None` never asks.
    pub confirm_above: Option<u64>,
}

fn default_install_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("dynres")
        .join("packs")
}

/// Settings for the reservation-style decorator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SmartDefault, Builder)]
#[serde(default)]
pub struct ReservationConfig {
    /// Tags whose preservation priority is at or above this stay installed
    /// after their last reservation ends.
    #[default = 1.0]
    #[builder(default = 1.0)]
    pub keep_resident_at: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_builder() {
        assert_eq!(CoordinatorConfig::builder().build(), CoordinatorConfig::default());
        assert_eq!(LocalPackConfig::builder().build(), LocalPackConfig::default());
        assert_eq!(ReservationConfig::builder().build(), ReservationConfig::default());
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: LocalPackConfig =
            serde_json::from_str(r#"{"origin_dir": "/srv/packs", "confirm_above": 1024}"#).unwrap();
        assert_eq!(config.origin_dir, PathBuf::from("/srv/packs"));
        assert_eq!(config.chunk_size, 65_536);
        assert_eq!(config.confirm_above, Some(1024));
        assert!(config.install_dir.ends_with("dynres/packs"));
    }
}
