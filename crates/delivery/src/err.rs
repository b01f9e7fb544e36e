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

use dynres_error::{ErrorCode, ErrorExt, StackError};
use snafu::Snafu;
use strum::EnumProperty;

use crate::{
    backend::{BackendError, BackendKind},
    tag::{Tag, TagSet},
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu, strum_macros::EnumProperty)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Invalid tags: {reason}"))]
    #[strum(props(error_code = "ERR_INVALID_TAGS"))]
    InvalidTags {
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to check availability of [{tags}]"))]
    #[strum(props(error_code = "ERR_CHECK_RESOURCES"))]
    CheckResources {
        tags:   TagSet,
        source: BackendError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to query state of [{tags}] before download"))]
    #[strum(props(error_code = "ERR_DOWNLOAD_RESOURCES"))]
    QueryForDownload {
        tags:   TagSet,
        source: BackendError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to start fetching [{tags}]"))]
    #[strum(props(error_code = "ERR_DOWNLOAD_RESOURCES"))]
    Fetch {
        tags:   TagSet,
        source: BackendError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Notifications for [{tags}] stopped before the download settled"))]
    #[strum(props(error_code = "ERR_DOWNLOAD_RESOURCES"))]
    StreamClosed {
        tags: TagSet,
        #[snafu(implicit)]
        loc:  snafu::Location,
    },

    #[snafu(display("Asset pack '{tag}' failed with error code {code}"))]
    #[strum(props(error_code = "ERR_DOWNLOAD_FAILED"))]
    DownloadFailed {
        tag:  Tag,
        code: i32,
        #[snafu(implicit)]
        loc:  snafu::Location,
    },

    #[snafu(display("Asset pack '{tag}' requires user confirmation"))]
    #[strum(props(error_code = "ERR_REQUIRES_USER_CONFIRMATION"))]
    RequiresConfirmation {
        tag: Tag,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Could not find {file} in any resource location"))]
    #[strum(props(error_code = "RESOURCE_NOT_FOUND"))]
    ResourceNotFound {
        file: String,
        #[snafu(implicit)]
        loc:  snafu::Location,
    },

    /// The backend could not report where packs live, so nothing is known
    /// about whether `file` exists.
    #[snafu(display("Failed to list resource locations while looking for {file}"))]
    #[strum(props(error_code = "ERR_UNKNOWN"))]
    ListLocations {
        file:   String,
        source: BackendError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("{capability} is not available on the {kind} backend"))]
    #[strum(props(error_code = "ERR_NOT_IMPLEMENTED"))]
    NotImplemented {
        capability: &'static str,
        kind:       BackendKind,
        #[snafu(implicit)]
        loc:        snafu::Location,
    },
}

impl StackError for Error {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) {
        buf.push(format!("{layer}: {self}"));
    }

    fn next(&self) -> Option<&dyn StackError> { None }
}

impl ErrorExt for Error {
    fn error_code(&self) -> ErrorCode {
        self.get_str("error_code")
            .and_then(|value| value.parse().ok())
            .unwrap_or(ErrorCode::Unknown)
    }

    fn native_code(&self) -> Option<i32> {
        match self {
            Self::DownloadFailed { code, .. } => Some(*code),
            Self::CheckResources { source, .. }
            | Self::QueryForDownload { source, .. }
            | Self::Fetch { source, .. }
            | Self::ListLocations { source, .. } => source.native_code(),
            _ => None,
        }
    }
}

impl Error {
    /// The tag that ended the request, for failures attributable to one.
    #[must_use]
    pub fn tag(&self) -> Option<&Tag> {
        match self {
            Self::DownloadFailed { tag, .. } | Self::RequiresConfirmation { tag, .. } => Some(tag),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use snafu::IntoError;

    use super::*;
    use crate::backend::UnavailableSnafu;

    #[test]
    fn variants_map_to_boundary_codes() {
        let tag = Tag::new("a").unwrap();
        let err = DownloadFailedSnafu {
            tag:  tag.clone(),
            code: 7,
        }
        .build();
        assert_eq!(err.error_code(), ErrorCode::DownloadFailed);
        assert_eq!(err.native_code(), Some(7));
        assert_eq!(err.tag(), Some(&tag));

        let err = RequiresConfirmationSnafu { tag }.build();
        assert_eq!(err.error_code(), ErrorCode::RequiresUserConfirmation);

        let err = ResourceNotFoundSnafu {
            file: "kichi512.png",
        }
        .build();
        assert_eq!(err.error_code(), ErrorCode::ResourceNotFound);

        let err = NotImplementedSnafu {
            capability: "resource path lookup",
            kind:       BackendKind::Reservation,
        }
        .build();
        assert_eq!(err.error_code(), ErrorCode::NotImplemented);
    }

    #[test]
    fn query_failures_differ_by_operation() {
        let tags = TagSet::new(["a"]).unwrap();
        let backend = || {
            UnavailableSnafu {
                message: "service down",
                code:    Some(-6),
            }
            .build()
        };

        let check = CheckResourcesSnafu { tags: tags.clone() }.into_error(backend());
        assert_eq!(check.error_code(), ErrorCode::CheckResources);
        assert_eq!(check.native_code(), Some(-6));

        let download = QueryForDownloadSnafu { tags }.into_error(backend());
        assert_eq!(download.error_code(), ErrorCode::DownloadResources);
        assert!(download.output_msg().ends_with("service down"));
    }

    #[test]
    fn location_listing_failure_is_not_a_missing_file() {
        let err = ListLocationsSnafu { file: "kichi512.png" }.into_error(
            UnavailableSnafu {
                message: "storage detached",
                code:    None::<i32>,
            }
            .build(),
        );
        assert_eq!(err.error_code(), ErrorCode::Unknown);
        assert_ne!(err.error_code(), ErrorCode::ResourceNotFound);
        assert_eq!(err.output_msg(), "Internal error: ERR_UNKNOWN");
        assert_eq!(
            err.root_cause().unwrap().to_string(),
            "Delivery service unavailable: storage detached"
        );
    }
}
