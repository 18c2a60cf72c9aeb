// SPDX-License-Identifier: Apache-2.0

//! Error types for access resolution
//!
//! Adapter failures are kept distinct from "no grant found" so the service
//! can fail closed. Only the not-found family reaches callers as an error;
//! everything else is degraded to "no access" at the service boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use access_core::{ClassId, RowDefect, SkippedRow};

/// Which collaborator a fetch went to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantSource {
    User,
    Subscriptions,
    Catalog,
    Progress,
}

impl GrantSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantSource::User => "user",
            GrantSource::Subscriptions => "subscriptions",
            GrantSource::Catalog => "catalog",
            GrantSource::Progress => "progress",
        }
    }
}

impl std::fmt::Display for GrantSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Serialize, Deserialize)]
pub enum AccessError {
    #[error("Grant source {grant_source} unavailable: {message}")]
    GrantSourceUnavailable {
        grant_source: GrantSource,
        message: String,
    },

    #[error("Grant source {grant_source} timed out after {timeout_ms}ms")]
    Timeout {
        grant_source: GrantSource,
        timeout_ms: u64,
    },

    #[error("Class not found: {class_id}")]
    InvalidClassReference { class_id: ClassId },

    #[error("Subject {subject_id} not found in class {class_id}")]
    InvalidSubjectReference { class_id: ClassId, subject_id: String },

    #[error("Malformed subscription {subscription_id}: {defect}")]
    MalformedSubscriptionRow {
        subscription_id: String,
        defect: RowDefect,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl AccessError {
    pub fn source_unavailable(grant_source: GrantSource, msg: impl Into<String>) -> Self {
        Self::GrantSourceUnavailable {
            grant_source,
            message: msg.into(),
        }
    }

    pub fn invalid_class(class_id: ClassId) -> Self {
        Self::InvalidClassReference { class_id }
    }

    pub fn invalid_subject(class_id: ClassId, subject_id: impl Into<String>) -> Self {
        Self::InvalidSubjectReference {
            class_id,
            subject_id: subject_id.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// 404-class errors, as opposed to denied access or internal failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::InvalidClassReference { .. } | Self::InvalidSubjectReference { .. }
        )
    }

    /// The grant source an I/O failure came from, if any.
    pub fn grant_source(&self) -> Option<GrantSource> {
        match self {
            Self::GrantSourceUnavailable { grant_source, .. }
            | Self::Timeout { grant_source, .. } => Some(*grant_source),
            _ => None,
        }
    }
}

impl From<SkippedRow> for AccessError {
    fn from(row: SkippedRow) -> Self {
        Self::MalformedSubscriptionRow {
            subscription_id: row.subscription_id,
            defect: row.defect,
        }
    }
}

/// Result type alias for access operations
pub type AccessResult<T> = Result<T, AccessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_family() {
        assert!(AccessError::invalid_class(6).is_not_found());
        assert!(AccessError::invalid_subject(6, "math").is_not_found());
        assert!(!AccessError::source_unavailable(GrantSource::User, "down").is_not_found());
    }

    #[test]
    fn grant_source_is_reported() {
        let timeout = AccessError::Timeout {
            grant_source: GrantSource::Subscriptions,
            timeout_ms: 50,
        };
        assert_eq!(timeout.grant_source(), Some(GrantSource::Subscriptions));
        assert_eq!(
            timeout.to_string(),
            "Grant source subscriptions timed out after 50ms"
        );
        assert_eq!(AccessError::invalid_class(3).grant_source(), None);
    }
}
