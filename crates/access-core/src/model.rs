// SPDX-License-Identifier: Apache-2.0

//! Catalog, user and subscription records
//!
//! These are the plain-data shapes handed over by the datastore adapters.
//! Nothing here performs I/O; the resolver and the progression gate only
//! ever see these types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric class identifier
pub type ClassId = i64;

/// Subject identifier
pub type SubjectId = String;

/// School attached to a user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolRef {
    pub id: String,
    pub is_active: bool,
}

/// User as returned by the identity subsystem. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub grade: Option<String>,
    pub school: Option<SchoolRef>,
}

impl UserRecord {
    /// A user with no school and no grade.
    pub fn unaffiliated(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            grade: None,
            school: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    pub id: SubjectId,
    pub name: String,
    /// Minor currency unit. `None` means the configured default applies.
    pub price: Option<i64>,
    pub class_id: ClassId,
}

/// A class with its ordered subjects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    pub id: ClassId,
    pub name: String,
    /// Minor currency unit
    pub price: i64,
    pub is_active: bool,
    pub subjects: Vec<SubjectRecord>,
}

impl ClassRecord {
    pub fn subject(&self, subject_id: &str) -> Option<&SubjectRecord> {
        self.subjects.iter().find(|s| s.id == subject_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRecord {
    pub id: String,
    pub title: String,
    pub order: i32,
    /// Legacy per-record completion flag. Newer data tracks completion as a
    /// set of topic ids instead.
    #[serde(default)]
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRecord {
    pub id: String,
    pub title: String,
    pub order: i32,
    pub topics: Vec<TopicRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Cancelled,
    Expired,
    Trial,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Inactive => "INACTIVE",
            SubscriptionStatus::Cancelled => "CANCELLED",
            SubscriptionStatus::Expired => "EXPIRED",
            SubscriptionStatus::Trial => "TRIAL",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown subscription status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for SubscriptionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(SubscriptionStatus::Active),
            "INACTIVE" => Ok(SubscriptionStatus::Inactive),
            "CANCELLED" | "CANCELED" => Ok(SubscriptionStatus::Cancelled),
            "EXPIRED" => Ok(SubscriptionStatus::Expired),
            "TRIAL" => Ok(SubscriptionStatus::Trial),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// A paid grant. `subject_id == None` means the subscription covers the
/// whole class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub class_id: ClassId,
    pub subject_id: Option<SubjectId>,
    pub status: SubscriptionStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Subscription {
    /// ACTIVE and not past its end date. `end_date == as_of` still counts.
    pub fn is_effective(&self, as_of: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active
            && self.end_date.map_or(true, |end| end >= as_of)
    }

    pub fn is_class_wide(&self) -> bool {
        self.subject_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sub(status: SubscriptionStatus, end: Option<DateTime<Utc>>) -> Subscription {
        Subscription {
            id: "s1".to_string(),
            user_id: "u1".to_string(),
            class_id: 6,
            subject_id: None,
            status,
            start_date: None,
            end_date: end,
        }
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        assert!(sub(SubscriptionStatus::Active, Some(now)).is_effective(now));
        assert!(!sub(
            SubscriptionStatus::Active,
            Some(now - Duration::milliseconds(1))
        )
        .is_effective(now));
        assert!(sub(SubscriptionStatus::Active, None).is_effective(now));
    }

    #[test]
    fn only_active_status_is_effective() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        for status in [
            SubscriptionStatus::Inactive,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::Expired,
            SubscriptionStatus::Trial,
        ] {
            assert!(!sub(status, None).is_effective(now), "{status} should not be effective");
        }
    }

    #[test]
    fn status_parsing() {
        assert_eq!("ACTIVE".parse::<SubscriptionStatus>(), Ok(SubscriptionStatus::Active));
        assert_eq!("canceled".parse::<SubscriptionStatus>(), Ok(SubscriptionStatus::Cancelled));
        assert!("PAUSED".parse::<SubscriptionStatus>().is_err());
    }

    #[test]
    fn status_serializes_screaming_case() {
        let json = serde_json::to_string(&SubscriptionStatus::Trial).unwrap();
        assert_eq!(json, "\"TRIAL\"");
    }
}
