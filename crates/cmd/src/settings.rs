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

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use dynres_common_telemetry::LoggingOptions;
use dynres_delivery::{BackendKind, CoordinatorConfig, LocalPackConfig, ReservationConfig};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Prefix of environment overrides, e.g. `DYNRES__LOCAL__ORIGIN_DIR=/srv/packs`.
const ENV_PREFIX: &str = "DYNRES";

/// Everything the CLI reads from its config file and environment.
#[derive(Debug, Clone, Serialize, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Settings {
    /// Logs go to files only unless configured otherwise, stdout belongs to
    /// command output.
    #[default(_code = "default_logging()")]
    pub logging:     LoggingOptions,
    pub coordinator: CoordinatorConfig,
    #[default(BackendKind::PackManager)]
    pub backend:     BackendKind,
    pub local:       LocalPackConfig,
    pub reservation: ReservationConfig,
}

fn default_logging() -> LoggingOptions {
    LoggingOptions::builder()
        .level("warn".to_string())
        .append_stdout(false)
        .build()
}

impl Settings {
    /// Defaults, overlaid by `path` (TOML, YAML or JSON by extension), then by
    /// `DYNRES__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::Message(format!(
                    "Config file {} does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path));
        }
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
