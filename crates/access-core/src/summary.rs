// SPDX-License-Identifier: Apache-2.0

//! Access summary messages
//!
//! Deterministic mapping from a user's grant context (and, per class, a
//! resolved decision) to the message shown next to content listings.

use serde::{Deserialize, Serialize};

use crate::grants::SubscriptionSet;
use crate::model::UserRecord;
use crate::resolver::{AccessDecision, AccessType, SubjectAccess};

/// Inputs of the user-level summary message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryContext {
    pub has_school: bool,
    pub school_active: bool,
    pub grade: Option<String>,
    /// Effective subscriptions of any scope
    pub subscription_count: usize,
    /// Distinct classes with at least one effective subscription
    pub subscribed_class_count: usize,
    /// Effective class-wide subscriptions
    pub class_subscription_count: usize,
}

impl SummaryContext {
    pub fn new(user: &UserRecord, subscriptions: &SubscriptionSet) -> Self {
        Self {
            has_school: user.school.is_some(),
            school_active: user.school.as_ref().is_some_and(|s| s.is_active),
            grade: user
                .grade
                .as_deref()
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string),
            subscription_count: subscriptions.len(),
            subscribed_class_count: subscriptions.subscribed_class_ids().len(),
            class_subscription_count: subscriptions.class_wide.len(),
        }
    }

    fn has_school_access(&self) -> bool {
        self.has_school && self.school_active && self.grade.is_some()
    }
}

/// User-level status message. Rules are checked in order; the first match wins.
pub fn summary_message(ctx: &SummaryContext) -> String {
    let grade = ctx.grade.as_deref();

    if !ctx.has_school && grade.is_none() && ctx.subscription_count == 0 {
        return "Browse and subscribe to available classes.".to_string();
    }
    if ctx.has_school && !ctx.school_active {
        return "Your school account is currently inactive. You can still subscribe to individual classes."
            .to_string();
    }
    if ctx.has_school && grade.is_none() {
        return "No grade assigned. Contact your school administrator or subscribe to individual classes."
            .to_string();
    }
    if let (true, Some(grade)) = (ctx.has_school_access(), grade) {
        if ctx.subscription_count == 0 {
            return format!("School access granted for Grade {grade} content.");
        }
        return format!(
            "School access for Grade {grade} + {} subscribed classes.",
            ctx.subscribed_class_count
        );
    }
    if ctx.class_subscription_count > 0 {
        return format!("Access via {} active subscriptions.", ctx.subscription_count);
    }
    match grade {
        Some(grade) => format!("Browse and subscribe to classes available for Grade {grade}"),
        None => "Browse and subscribe to available classes.".to_string(),
    }
}

/// One-line reason for a class decision, so that a denial always says why.
pub fn describe_decision(decision: &AccessDecision, class_name: &str) -> String {
    match decision.access_type {
        AccessType::School => "Full access through your school.".to_string(),
        AccessType::ClassSubscription => "Full access through your class subscription.".to_string(),
        AccessType::Partial | AccessType::SubjectSubscription => format!(
            "Access to {} of {} subjects through subject subscriptions. Upgrade to unlock all of {class_name}.",
            decision.accessible_subject_count(),
            decision.subject_access.len()
        ),
        AccessType::None => format!("No access to {class_name}. Subscribe to unlock its subjects."),
    }
}

/// One-line reason for a single subject.
pub fn describe_subject_access(subject: &SubjectAccess, class_name: &str) -> String {
    match subject.access_type {
        AccessType::School => format!("{} is included with your school access.", subject.name),
        AccessType::ClassSubscription => {
            format!("{} is included in your {class_name} subscription.", subject.name)
        }
        AccessType::SubjectSubscription => format!(
            "You are subscribed to {}. Upgrade to {class_name} to unlock every subject.",
            subject.name
        ),
        AccessType::Partial | AccessType::None => format!(
            "Subscribe to {} or to all of {class_name} to unlock this subject.",
            subject.name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(has_school: bool, school_active: bool, grade: Option<&str>) -> SummaryContext {
        SummaryContext {
            has_school,
            school_active,
            grade: grade.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn rule_1_nothing_at_all() {
        assert_eq!(
            summary_message(&ctx(false, false, None)),
            "Browse and subscribe to available classes."
        );
    }

    #[test]
    fn rule_2_inactive_school() {
        let mut c = ctx(true, false, Some("6"));
        c.subscription_count = 2;
        assert_eq!(
            summary_message(&c),
            "Your school account is currently inactive. You can still subscribe to individual classes."
        );
    }

    #[test]
    fn rule_3_school_without_grade() {
        assert_eq!(
            summary_message(&ctx(true, true, None)),
            "No grade assigned. Contact your school administrator or subscribe to individual classes."
        );
    }

    #[test]
    fn rule_4_school_only() {
        assert_eq!(
            summary_message(&ctx(true, true, Some("6"))),
            "School access granted for Grade 6 content."
        );
    }

    #[test]
    fn rule_5_school_and_subscriptions() {
        let mut c = ctx(true, true, Some("6"));
        c.subscription_count = 3;
        c.subscribed_class_count = 2;
        assert_eq!(
            summary_message(&c),
            "School access for Grade 6 + 2 subscribed classes."
        );
    }

    #[test]
    fn rule_6_class_subscriptions_without_school() {
        let mut c = ctx(false, false, Some("8"));
        c.subscription_count = 2;
        c.subscribed_class_count = 2;
        c.class_subscription_count = 1;
        assert_eq!(summary_message(&c), "Access via 2 active subscriptions.");
    }

    #[test]
    fn rule_7_fallbacks() {
        assert_eq!(
            summary_message(&ctx(false, false, Some("9"))),
            "Browse and subscribe to classes available for Grade 9"
        );

        let mut subject_only = ctx(false, false, None);
        subject_only.subscription_count = 1;
        subject_only.subscribed_class_count = 1;
        assert_eq!(
            summary_message(&subject_only),
            "Browse and subscribe to available classes."
        );
    }

    #[test]
    fn blank_grade_counts_as_missing() {
        let user = UserRecord {
            id: "u".to_string(),
            grade: Some("  ".to_string()),
            school: None,
        };
        let c = SummaryContext::new(&user, &SubscriptionSet::default());
        assert!(c.grade.is_none());
    }

    #[test]
    fn subject_reasons() {
        let mut subject = SubjectAccess {
            subject_id: "sci".to_string(),
            name: "Science".to_string(),
            price: 29900,
            has_access: false,
            access_type: AccessType::None,
            can_upgrade: false,
        };
        assert_eq!(
            describe_subject_access(&subject, "Class 8"),
            "Subscribe to Science or to all of Class 8 to unlock this subject."
        );

        subject.access_type = AccessType::SubjectSubscription;
        assert_eq!(
            describe_subject_access(&subject, "Class 8"),
            "You are subscribed to Science. Upgrade to Class 8 to unlock every subject."
        );
    }

    #[test]
    fn denied_class_still_has_a_reason() {
        let decision = AccessDecision::denied(6);
        assert_eq!(
            describe_decision(&decision, "Class 6"),
            "No access to Class 6. Subscribe to unlock its subjects."
        );
    }
}
