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

use shadow_rs::{formatcp, shadow};

shadow!(build);

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// `PKG_VERSION` when built with `DYNRES_RELEASE` set. Other builds get
/// `+{commit}` (`-dirty` with uncommitted changes) or `-dev` outside git.
#[allow(clippy::const_is_empty)]
pub const FULL_VERSION: &str = match option_env!("DYNRES_RELEASE") {
    Some(_) => build::PKG_VERSION,
    None if build::SHORT_COMMIT.is_empty() => formatcp!("{}-dev", build::PKG_VERSION),
    None if build::GIT_CLEAN => formatcp!("{}+{}", build::PKG_VERSION, build::SHORT_COMMIT),
    None => formatcp!("{}+{}-dirty", build::PKG_VERSION, build::SHORT_COMMIT),
};

/// Shown by `dynres --version`.
pub const LONG_VERSION: &str = formatcp!(
    "{}\nbranch: {}\ncommit: {}\nbuilt: {}\nrustc: {}",
    FULL_VERSION,
    build::BRANCH,
    build::COMMIT_HASH,
    build::BUILD_TIME,
    build::RUST_VERSION
);
