// SPDX-License-Identifier: Apache-2.0

//! Access Resolver
//!
//! Combines the three grant sources into a single decision for one class:
//! 1. School grant (active school + grade mapped to the class)
//! 2. Class-wide subscription
//! 3. Subject-level subscriptions
//!
//! Precedence is SCHOOL > CLASS_SUBSCRIPTION > SUBJECT_SUBSCRIPTION > NONE.
//! The resolver is pure: identical inputs always produce identical output.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grants::{SchoolGrant, SubscriptionSet};
use crate::model::{ClassId, ClassRecord, SubjectId, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessType {
    School,
    ClassSubscription,
    SubjectSubscription,
    /// Some but not all subjects, via subject subscriptions only. Class level only.
    Partial,
    None,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::School => "SCHOOL",
            AccessType::ClassSubscription => "CLASS_SUBSCRIPTION",
            AccessType::SubjectSubscription => "SUBJECT_SUBSCRIPTION",
            AccessType::Partial => "PARTIAL",
            AccessType::None => "NONE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAccess {
    pub subject_id: SubjectId,
    pub name: String,
    pub price: i64,
    pub has_access: bool,
    pub access_type: AccessType,
    pub can_upgrade: bool,
}

/// Upgrade suggestion from subject subscriptions to the full class.
///
/// `potential_savings` spreads the class price evenly over its subjects. It is
/// an estimate for display, not a billing or refund amount, and is negative
/// whenever the subscribed subjects' share is below the class price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeOptions {
    pub current_subjects: Vec<SubjectId>,
    pub class_price: i64,
    pub potential_savings: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub class_id: ClassId,
    pub has_full_access: bool,
    pub access_type: AccessType,
    pub subject_access: Vec<SubjectAccess>,
    pub can_upgrade_to_class: bool,
    pub upgrade_options: Option<UpgradeOptions>,
}

impl AccessDecision {
    /// Decision that grants nothing, used when the class content could not
    /// be loaded.
    pub fn denied(class_id: ClassId) -> Self {
        Self {
            class_id,
            has_full_access: false,
            access_type: AccessType::None,
            subject_access: Vec::new(),
            can_upgrade_to_class: false,
            upgrade_options: None,
        }
    }

    pub fn subject(&self, subject_id: &str) -> Option<&SubjectAccess> {
        self.subject_access.iter().find(|s| s.subject_id == subject_id)
    }

    pub fn accessible_subject_count(&self) -> usize {
        self.subject_access.iter().filter(|s| s.has_access).count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AccessResolver {
    default_subject_price: i64,
}

impl AccessResolver {
    pub fn new(default_subject_price: i64) -> Self {
        Self {
            default_subject_price,
        }
    }

    pub fn resolve(
        &self,
        class: &ClassRecord,
        school: &SchoolGrant,
        subscriptions: &SubscriptionSet,
    ) -> AccessDecision {
        resolve_class_access(
            class,
            school,
            &subscriptions.class_wide,
            &subscriptions.subject_level,
            self.default_subject_price,
        )
    }
}

/// Resolves access to one class and each of its subjects.
pub fn resolve_class_access(
    class: &ClassRecord,
    school: &SchoolGrant,
    class_subs: &[Subscription],
    subject_subs: &[Subscription],
    default_subject_price: i64,
) -> AccessDecision {
    let class_id = class.id;
    let has_school_access = school.covers(class_id);
    let has_class_subscription = class_subs
        .iter()
        .any(|s| s.class_id == class_id && s.is_class_wide());
    let has_full_access = has_school_access || has_class_subscription;

    let subjects: Vec<_> = class
        .subjects
        .iter()
        .filter(|s| s.class_id == class_id)
        .collect();

    let mut subscribed_subjects = Vec::new();
    let subject_access: Vec<SubjectAccess> = subjects
        .iter()
        .map(|subject| {
            let has_subject_subscription = subject_subs.iter().any(|sub| {
                sub.class_id == class_id && sub.subject_id.as_deref() == Some(subject.id.as_str())
            });
            if has_subject_subscription {
                subscribed_subjects.push(subject.id.clone());
            }

            let access_type = if has_school_access {
                AccessType::School
            } else if has_class_subscription {
                AccessType::ClassSubscription
            } else if has_subject_subscription {
                AccessType::SubjectSubscription
            } else {
                AccessType::None
            };

            SubjectAccess {
                subject_id: subject.id.clone(),
                name: subject.name.clone(),
                price: subject.price.unwrap_or(default_subject_price),
                has_access: has_full_access || has_subject_subscription,
                access_type,
                can_upgrade: has_subject_subscription && !has_full_access,
            }
        })
        .collect();

    let access_type = if has_school_access {
        AccessType::School
    } else if has_class_subscription {
        AccessType::ClassSubscription
    } else if subject_access.iter().any(|s| s.has_access) {
        AccessType::Partial
    } else {
        AccessType::None
    };

    let can_upgrade_to_class = !subscribed_subjects.is_empty() && !has_full_access;
    let upgrade_options = can_upgrade_to_class.then(|| {
        let potential_savings =
            estimated_savings(subscribed_subjects.len(), subjects.len(), class.price);
        UpgradeOptions {
            current_subjects: subscribed_subjects,
            class_price: class.price,
            potential_savings,
        }
    });

    debug!(
        class_id,
        access_type = access_type.as_str(),
        has_full_access,
        subjects = subject_access.len(),
        "Resolved class access"
    );

    AccessDecision {
        class_id,
        has_full_access,
        access_type,
        subject_access,
        can_upgrade_to_class,
        upgrade_options,
    }
}

/// `subscribed * ceil(class_price / total_subjects) - class_price`
fn estimated_savings(subscribed: usize, total_subjects: usize, class_price: i64) -> i64 {
    if total_subjects == 0 {
        return 0;
    }
    let total = total_subjects as i64;
    let price = class_price.max(0);
    let per_subject = (price + total - 1) / total;
    subscribed as i64 * per_subject - class_price
}
