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

use std::{error::Error as StdError, sync::Arc};

use serde::Serialize;
use strum::EnumProperty;

/// Error kinds surfaced to the host application.
///
/// The serialized form is the identifier a host bridge rejects its promise
/// with, so the strings are part of the public contract.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    strum_macros::Display,
    strum_macros::EnumProperty,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
)]
pub enum ErrorCode {
    #[serde(rename = "ERR_CHECK_RESOURCES")]
    #[strum(serialize = "ERR_CHECK_RESOURCES", props(retryable = "true"))]
    CheckResources,
    #[serde(rename = "ERR_DOWNLOAD_RESOURCES")]
    #[strum(serialize = "ERR_DOWNLOAD_RESOURCES", props(retryable = "true"))]
    DownloadResources,
    #[serde(rename = "ERR_DOWNLOAD_FAILED")]
    #[strum(serialize = "ERR_DOWNLOAD_FAILED")]
    DownloadFailed,
    #[serde(rename = "ERR_REQUIRES_USER_CONFIRMATION")]
    #[strum(serialize = "ERR_REQUIRES_USER_CONFIRMATION")]
    RequiresUserConfirmation,
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    #[strum(serialize = "RESOURCE_NOT_FOUND")]
    ResourceNotFound,
    #[serde(rename = "ERR_NOT_IMPLEMENTED")]
    #[strum(serialize = "ERR_NOT_IMPLEMENTED")]
    NotImplemented,
    #[serde(rename = "ERR_INVALID_TAGS")]
    #[strum(serialize = "ERR_INVALID_TAGS")]
    InvalidTags,
    #[serde(rename = "ERR_UNKNOWN")]
    #[strum(serialize = "ERR_UNKNOWN")]
    Unknown,
}

impl ErrorCode {
    /// Whether the caller may simply re-submit the same request.
    ///
    /// Only backend query/fetch plumbing failures are transient. A pack
    /// failure or a confirmation prompt needs the caller to change something
    /// first.
    #[must_use]
    pub fn is_retryable(self) -> bool { self.get_str("retryable") == Some("true") }

    #[must_use]
    pub fn as_str(self) -> &'static str { self.into() }
}

pub trait StackError: StdError {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>);

    fn next(&self) -> Option<&dyn StackError>;

    fn last(&self) -> &dyn StackError
    where
        Self: Sized,
    {
        let Some(mut result) = self.next() else {
            return self;
        };
        while let Some(err) = result.next() {
            result = err;
        }
        result
    }

    fn transparent(&self) -> bool { false }
}

pub trait ErrorExt: StackError {
    fn error_code(&self) -> ErrorCode { ErrorCode::Unknown }

    /// Backend-native error code, when the failure originated in the
    /// delivery backend and it reported one.
    fn native_code(&self) -> Option<i32> { None }

    fn output_msg(&self) -> String
    where
        Self: Sized,
    {
        if self.error_code() == ErrorCode::Unknown {
            return format!("Internal error: {}", ErrorCode::Unknown);
        }
        let error = self.last();
        if let Some(external_error) = error.source() {
            let mut root = external_error;
            while let Some(source) = root.source() {
                root = source;
            }
            if error.transparent() {
                format!("{root}")
            } else {
                format!("{error}: {root}")
            }
        } else {
            format!("{error}")
        }
    }

    fn root_cause(&self) -> Option<&dyn StdError>
    where
        Self: Sized,
    {
        let error = self.last();
        let mut source = error.source()?;
        while let Some(next) = source.source() {
            source = next;
        }
        Some(source)
    }

    fn to_rejection(&self) -> Rejection
    where
        Self: Sized,
    {
        Rejection {
            code:        self.error_code(),
            message:     self.output_msg(),
            native_code: self.native_code(),
        }
    }
}

impl<T: ?Sized + StackError> StackError for Arc<T> {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) { self.as_ref().debug_fmt(layer, buf) }

    fn next(&self) -> Option<&dyn StackError> { self.as_ref().next() }
}

impl<T: StackError> StackError for Box<T> {
    fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) { self.as_ref().debug_fmt(layer, buf) }

    fn next(&self) -> Option<&dyn StackError> { self.as_ref().next() }
}

/// The body a host bridge rejects a pending promise with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub code:        ErrorCode,
    pub message:     String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_code: Option<i32>,
}

#[cfg(test)]
mod tests {
    use snafu::Snafu;

    use super::*;

    #[derive(Debug, Snafu)]
    enum PackError {
        #[snafu(display("Asset pack '{tag}' failed with error code {code}"))]
        Failed { tag: String, code: i32 },

        #[snafu(display("Failed to query packs"))]
        Query { source: std::io::Error },

        #[snafu(display("boom"))]
        Opaque,
    }

    impl StackError for PackError {
        fn debug_fmt(&self, layer: usize, buf: &mut Vec<String>) {
            buf.push(format!("{layer}: {self}"));
        }

        fn next(&self) -> Option<&dyn StackError> { None }
    }

    impl ErrorExt for PackError {
        fn error_code(&self) -> ErrorCode {
            match self {
                Self::Failed { .. } => ErrorCode::DownloadFailed,
                Self::Query { .. } => ErrorCode::CheckResources,
                Self::Opaque => ErrorCode::Unknown,
            }
        }

        fn native_code(&self) -> Option<i32> {
            match self {
                Self::Failed { code, .. } => Some(*code),
                _ => None,
            }
        }
    }

    #[test]
    fn codes_serialize_to_boundary_identifiers() {
        let json = serde_json::to_string(&ErrorCode::RequiresUserConfirmation).unwrap();
        assert_eq!(json, "\"ERR_REQUIRES_USER_CONFIRMATION\"");
        assert_eq!(ErrorCode::ResourceNotFound.as_str(), "RESOURCE_NOT_FOUND");
        assert_eq!(
            "ERR_NOT_IMPLEMENTED".parse::<ErrorCode>().unwrap(),
            ErrorCode::NotImplemented
        );
    }

    #[test]
    fn only_plumbing_failures_are_retryable() {
        assert!(ErrorCode::CheckResources.is_retryable());
        assert!(ErrorCode::DownloadResources.is_retryable());
        assert!(!ErrorCode::DownloadFailed.is_retryable());
        assert!(!ErrorCode::RequiresUserConfirmation.is_retryable());
        assert!(!ErrorCode::ResourceNotFound.is_retryable());
    }

    #[test]
    fn rejection_carries_native_code() {
        let err = PackError::Failed {
            tag:  "a".to_string(),
            code: 7,
        };
        let rejection = err.to_rejection();
        assert_eq!(rejection.code, ErrorCode::DownloadFailed);
        assert_eq!(rejection.message, "Asset pack 'a' failed with error code 7");
        assert_eq!(rejection.native_code, Some(7));

        let json = serde_json::to_value(&rejection).unwrap();
        assert_eq!(json["code"], "ERR_DOWNLOAD_FAILED");
        assert_eq!(json["nativeCode"], 7);
    }

    #[test]
    fn output_msg_appends_root_cause() {
        let err = PackError::Query {
            source: std::io::Error::other("disk gone"),
        };
        assert_eq!(err.output_msg(), "Failed to query packs: disk gone");
        assert_eq!(err.root_cause().unwrap().to_string(), "disk gone");
    }

    #[test]
    fn unknown_errors_hide_details() {
        assert_eq!(PackError::Opaque.output_msg(), "Internal error: ERR_UNKNOWN");
        let json = serde_json::to_value(PackError::Opaque.to_rejection()).unwrap();
        assert!(json.get("nativeCode").is_none());
    }
}
