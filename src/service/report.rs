// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use access_core::{
    describe_decision, describe_subject_access, AccessDecision, AccessType, ClassId, ClassRecord,
    SubjectAccess, SummaryContext, TopicState,
};

use crate::error::GrantSource;

/// Decision for one class plus the reason shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAccessReport {
    pub class_name: String,
    #[serde(flatten)]
    pub decision: AccessDecision,
    pub message: String,
    /// Sources that failed or timed out and were treated as granting nothing
    pub unavailable_sources: Vec<GrantSource>,
}

impl ClassAccessReport {
    pub(crate) fn new(
        class: &ClassRecord,
        decision: AccessDecision,
        unavailable: Vec<GrantSource>,
    ) -> Self {
        Self {
            message: reason(&decision, &class.name, &unavailable),
            class_name: class.name.clone(),
            decision,
            unavailable_sources: unavailable,
        }
    }

    pub fn class_id(&self) -> ClassId {
        self.decision.class_id
    }

    /// Report for a class whose content could not be loaded.
    pub(crate) fn unavailable(class_id: ClassId, unavailable: Vec<GrantSource>) -> Self {
        let class_name = format!("Class {class_id}");
        let decision = AccessDecision::denied(class_id);
        Self {
            message: reason(&decision, &class_name, &unavailable),
            class_name,
            decision,
            unavailable_sources: unavailable,
        }
    }
}

/// A grant that may have been lost to a failed source is not reported as a
/// missing purchase.
fn reason(decision: &AccessDecision, class_name: &str, unavailable: &[GrantSource]) -> String {
    if decision.has_full_access || unavailable.is_empty() {
        return describe_decision(decision, class_name);
    }
    unverified(class_name)
}

pub(crate) fn subject_reason(
    subject: &SubjectAccess,
    class_name: &str,
    unavailable: &[GrantSource],
) -> String {
    if subject.has_access || unavailable.is_empty() {
        return describe_subject_access(subject, class_name);
    }
    unverified(&subject.name)
}

fn unverified(name: &str) -> String {
    format!("Access to {name} could not be verified right now. Please try again shortly.")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAccessReport {
    pub class_id: ClassId,
    pub class_name: String,
    pub class_access_type: AccessType,
    pub can_upgrade_to_class: bool,
    pub subject: SubjectAccess,
    pub message: String,
    pub unavailable_sources: Vec<GrantSource>,
}

impl SubjectAccessReport {
    pub fn has_access(&self) -> bool {
        self.subject.has_access
    }
}

/// Topic list of a subject with both gates applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTopicsReport {
    #[serde(flatten)]
    pub access: SubjectAccessReport,
    pub topics: Vec<TopicState>,
    /// Rounded percentage, 0..=100
    pub progress: u8,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessSummary {
    pub message: String,
    #[serde(flatten)]
    pub context: SummaryContext,
    pub unavailable_sources: Vec<GrantSource>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_8() -> ClassRecord {
        ClassRecord {
            id: 8,
            name: "Class 8".to_string(),
            price: 89900,
            is_active: true,
            subjects: Vec::new(),
        }
    }

    #[test]
    fn denial_without_failures_prompts_to_subscribe() {
        let report = ClassAccessReport::new(&class_8(), AccessDecision::denied(8), Vec::new());
        assert_eq!(report.message, "No access to Class 8. Subscribe to unlock its subjects.");
    }

    #[test]
    fn denial_with_failed_source_is_unverified() {
        let report = ClassAccessReport::unavailable(8, vec![GrantSource::Catalog]);
        assert_eq!(
            report.message,
            "Access to Class 8 could not be verified right now. Please try again shortly."
        );

        let report = ClassAccessReport::new(
            &class_8(),
            AccessDecision::denied(8),
            vec![GrantSource::Subscriptions],
        );
        assert!(report.message.contains("could not be verified"));
    }

    #[test]
    fn full_access_keeps_its_reason_despite_failures() {
        let mut decision = AccessDecision::denied(8);
        decision.has_full_access = true;
        decision.access_type = AccessType::School;
        let report = ClassAccessReport::new(&class_8(), decision, vec![GrantSource::Subscriptions]);
        assert_eq!(report.message, "Full access through your school.");
    }

    #[test]
    fn subject_reason_follows_the_same_rule() {
        let subject = SubjectAccess {
            subject_id: "sci".to_string(),
            name: "Science".to_string(),
            price: 29900,
            has_access: false,
            access_type: AccessType::None,
            can_upgrade: false,
        };
        assert_eq!(
            subject_reason(&subject, "Class 8", &[GrantSource::Catalog]),
            "Access to Science could not be verified right now. Please try again shortly."
        );
        assert!(subject_reason(&subject, "Class 8", &[]).starts_with("Subscribe to Science"));
    }
}
