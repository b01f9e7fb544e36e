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

use std::path::{Component, Path, PathBuf};

/// File name a resource lookup searches for. `None` when `name` would
/// escape a location (path separators, `..`) or is empty.
pub(crate) fn resource_file_name(name: &str, ext: &str) -> Option<String> {
    let file = if ext.is_empty() {
        name.to_string()
    } else {
        format!("{name}.{ext}")
    };
    let mut components = Path::new(&file).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(file),
        _ => None,
    }
}

/// First `location/file` that exists, in location order.
pub(crate) async fn locate(locations: &[PathBuf], file: &str) -> Option<PathBuf> {
    for location in locations {
        let candidate = location.join(file);
        match tokio::fs::try_exists(&candidate).await {
            Ok(true) => return Some(candidate),
            Ok(false) => {}
            Err(err) => {
                tracing::debug!(path = %candidate.display(), %err, "skipping unreadable location");
            }
        }
    }
    None
}
