// SPDX-License-Identifier: Apache-2.0

//! Grant facts
//!
//! Raw, uninterpreted grant facts derived from adapter output: the school
//! grant of a user and the effective subscriptions, split into class-wide and
//! subject-level sets. Rows that could grant something they should not are
//! rejected here so the resolver never sees them.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::model::{ClassId, ClassRecord, Subscription, UserRecord};

/// Grade to eligible class ids, as configured per deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradeClassMap(BTreeMap<String, Vec<ClassId>>);

impl GradeClassMap {
    pub fn new(entries: BTreeMap<String, Vec<ClassId>>) -> Self {
        Self(entries)
    }

    /// Eligible classes for a grade. Unknown grades map to the empty set.
    pub fn classes_for(&self, grade: &str) -> BTreeSet<ClassId> {
        self.0
            .get(grade.trim())
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for GradeClassMap {
    /// Grades "1" to "12", each eligible for the class with the same id.
    fn default() -> Self {
        Self(
            (1..=12)
                .map(|grade: ClassId| (grade.to_string(), vec![grade]))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolGrant {
    pub is_eligible: bool,
    pub eligible_class_ids: BTreeSet<ClassId>,
}

impl SchoolGrant {
    /// Grant derived from the user's school and grade. Requires an active
    /// school and an assigned grade.
    pub fn for_user(user: &UserRecord, grade_map: &GradeClassMap) -> Self {
        let school_active = user.school.as_ref().is_some_and(|s| s.is_active);
        let grade = user.grade.as_deref().filter(|g| !g.trim().is_empty());
        match (grade, school_active) {
            (Some(grade), true) => Self {
                is_eligible: true,
                eligible_class_ids: grade_map.classes_for(grade),
            },
            _ => Self::none(),
        }
    }

    /// No school grant, used when the user lookup failed or found nothing.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn covers(&self, class_id: ClassId) -> bool {
        self.is_eligible && self.eligible_class_ids.contains(&class_id)
    }
}

/// Why a subscription row was dropped before resolution
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowDefect {
    #[error("subject {subject_id} belongs to class {actual_class_id}, not class {claimed_class_id}")]
    SubjectInOtherClass {
        subject_id: String,
        claimed_class_id: ClassId,
        actual_class_id: ClassId,
    },

    #[error("subject {subject_id} does not exist in class {class_id}")]
    UnknownSubject { subject_id: String, class_id: ClassId },

    #[error("end date precedes start date")]
    EndsBeforeStart,

    #[error("subscription is not effective (status {status})")]
    NotEffective { status: String },
}

/// A rejected subscription row and the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRow {
    pub subscription_id: String,
    pub defect: RowDefect,
}

/// Subject to owning class lookup over the part of the catalog that is
/// known for the current request.
#[derive(Debug, Clone, Default)]
pub struct SubjectIndex {
    owners: HashMap<String, ClassId>,
    known_classes: HashSet<ClassId>,
}

impl SubjectIndex {
    pub fn from_classes<'a>(classes: impl IntoIterator<Item = &'a ClassRecord>) -> Self {
        let mut index = Self::default();
        for class in classes {
            index.known_classes.insert(class.id);
            for subject in &class.subjects {
                index.owners.insert(subject.id.clone(), subject.class_id);
            }
        }
        index
    }

    /// Checks a subject-level row against the catalog. Rows for classes that
    /// are not loaded are left alone: they cannot match any loaded class.
    fn check(&self, subject_id: &str, class_id: ClassId) -> Result<(), RowDefect> {
        match self.owners.get(subject_id) {
            Some(&owner) if owner != class_id => Err(RowDefect::SubjectInOtherClass {
                subject_id: subject_id.to_string(),
                claimed_class_id: class_id,
                actual_class_id: owner,
            }),
            None if self.known_classes.contains(&class_id) => Err(RowDefect::UnknownSubject {
                subject_id: subject_id.to_string(),
                class_id,
            }),
            _ => Ok(()),
        }
    }
}

/// Effective subscriptions split by scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    pub class_wide: Vec<Subscription>,
    pub subject_level: Vec<Subscription>,
    pub skipped: Vec<SkippedRow>,
}

impl SubscriptionSet {
    /// Validates and partitions adapter rows. Non-effective rows are
    /// re-checked against `as_of` even though adapters already filter them.
    pub fn partition(rows: Vec<Subscription>, index: &SubjectIndex, as_of: DateTime<Utc>) -> Self {
        let mut set = Self::default();

        for row in rows {
            if let Err(defect) = validate_row(&row, index, as_of) {
                warn!(
                    subscription_id = %row.id,
                    user_id = %row.user_id,
                    class_id = row.class_id,
                    defect = %defect,
                    "Skipping malformed subscription row"
                );
                set.skipped.push(SkippedRow {
                    subscription_id: row.id,
                    defect,
                });
                continue;
            }

            if row.is_class_wide() {
                set.class_wide.push(row);
            } else {
                set.subject_level.push(row);
            }
        }

        set
    }

    pub fn is_empty(&self) -> bool {
        self.class_wide.is_empty() && self.subject_level.is_empty()
    }

    pub fn len(&self) -> usize {
        self.class_wide.len() + self.subject_level.len()
    }

    /// Distinct classes touched by any accepted subscription.
    pub fn subscribed_class_ids(&self) -> BTreeSet<ClassId> {
        self.class_wide
            .iter()
            .chain(self.subject_level.iter())
            .map(|s| s.class_id)
            .collect()
    }
}

fn validate_row(
    row: &Subscription,
    index: &SubjectIndex,
    as_of: DateTime<Utc>,
) -> Result<(), RowDefect> {
    if !row.is_effective(as_of) {
        return Err(RowDefect::NotEffective {
            status: row.status.to_string(),
        });
    }
    if let (Some(start), Some(end)) = (row.start_date, row.end_date) {
        if end < start {
            return Err(RowDefect::EndsBeforeStart);
        }
    }
    if let Some(subject_id) = &row.subject_id {
        index.check(subject_id, row.class_id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SchoolRef, SubjectRecord, SubscriptionStatus};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    fn user(grade: Option<&str>, school: Option<bool>) -> UserRecord {
        UserRecord {
            id: "u1".to_string(),
            grade: grade.map(str::to_string),
            school: school.map(|is_active| SchoolRef {
                id: "sch".to_string(),
                is_active,
            }),
        }
    }

    fn class(id: ClassId, subjects: &[&str]) -> ClassRecord {
        ClassRecord {
            id,
            name: format!("Class {id}"),
            price: 89900,
            is_active: true,
            subjects: subjects
                .iter()
                .map(|s| SubjectRecord {
                    id: s.to_string(),
                    name: s.to_string(),
                    price: None,
                    class_id: id,
                })
                .collect(),
        }
    }

    fn row(id: &str, class_id: ClassId, subject: Option<&str>) -> Subscription {
        Subscription {
            id: id.to_string(),
            user_id: "u1".to_string(),
            class_id,
            subject_id: subject.map(str::to_string),
            status: SubscriptionStatus::Active,
            start_date: None,
            end_date: None,
        }
    }

    #[test]
    fn school_grant_requires_active_school_and_grade() {
        let map = GradeClassMap::default();
        assert!(SchoolGrant::for_user(&user(Some("6"), Some(true)), &map).covers(6));
        assert!(!SchoolGrant::for_user(&user(Some("6"), Some(false)), &map).is_eligible);
        assert!(!SchoolGrant::for_user(&user(None, Some(true)), &map).is_eligible);
        assert!(!SchoolGrant::for_user(&user(Some("6"), None), &map).is_eligible);
    }

    #[test]
    fn unmapped_grade_is_eligible_with_no_classes() {
        let grant = SchoolGrant::for_user(&user(Some("13"), Some(true)), &GradeClassMap::default());
        assert!(grant.is_eligible);
        assert!(grant.eligible_class_ids.is_empty());
        assert!(!grant.covers(13));
    }

    #[test]
    fn grade_lookup_trims_whitespace() {
        let map = GradeClassMap::new(BTreeMap::from([("10".to_string(), vec![10, 11])]));
        assert_eq!(map.classes_for(" 10 "), BTreeSet::from([10, 11]));
    }

    #[test]
    fn partition_splits_by_scope() {
        let classes = [class(6, &["math", "sci"])];
        let index = SubjectIndex::from_classes(&classes);
        let set = SubscriptionSet::partition(
            vec![row("a", 6, None), row("b", 6, Some("math"))],
            &index,
            now(),
        );
        assert_eq!(set.class_wide.len(), 1);
        assert_eq!(set.subject_level.len(), 1);
        assert!(set.skipped.is_empty());
        assert_eq!(set.subscribed_class_ids(), BTreeSet::from([6]));
    }

    #[test]
    fn rejects_subject_claimed_by_wrong_class() {
        let classes = [class(6, &["math"]), class(7, &["bio"])];
        let index = SubjectIndex::from_classes(&classes);
        let set = SubscriptionSet::partition(vec![row("x", 6, Some("bio"))], &index, now());
        assert!(set.is_empty());
        assert_eq!(
            set.skipped[0].defect,
            RowDefect::SubjectInOtherClass {
                subject_id: "bio".to_string(),
                claimed_class_id: 6,
                actual_class_id: 7,
            }
        );
    }

    #[test]
    fn rejects_unknown_subject_in_known_class() {
        let classes = [class(6, &["math"])];
        let index = SubjectIndex::from_classes(&classes);
        let set = SubscriptionSet::partition(vec![row("x", 6, Some("art"))], &index, now());
        assert!(set.is_empty());
        assert!(matches!(set.skipped[0].defect, RowDefect::UnknownSubject { .. }));
    }

    #[test]
    fn keeps_rows_for_classes_outside_the_index() {
        let classes = [class(6, &["math"])];
        let index = SubjectIndex::from_classes(&classes);
        let set = SubscriptionSet::partition(vec![row("x", 9, Some("geo"))], &index, now());
        assert_eq!(set.subject_level.len(), 1);
    }

    #[test]
    fn rejects_inverted_dates_and_expired_rows() {
        let index = SubjectIndex::default();
        let mut inverted = row("inv", 6, None);
        inverted.start_date = Some(now() + Duration::days(2));
        inverted.end_date = Some(now() + Duration::days(1));

        let mut expired = row("old", 6, None);
        expired.end_date = Some(now() - Duration::milliseconds(1));

        let set = SubscriptionSet::partition(vec![inverted, expired], &index, now());
        assert!(set.is_empty());
        assert_eq!(set.skipped[0].defect, RowDefect::EndsBeforeStart);
        assert!(matches!(set.skipped[1].defect, RowDefect::NotEffective { .. }));
    }
}
