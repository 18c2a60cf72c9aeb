// SPDX-License-Identifier: Apache-2.0

//! Pure access resolution core
//!
//! Everything in this crate is side-effect free: adapters in the
//! `access-engine` crate fetch the grant facts, this crate interprets them.

pub mod grants;
pub mod model;
pub mod progression;
pub mod resolver;
pub mod summary;

pub use grants::{GradeClassMap, RowDefect, SchoolGrant, SkippedRow, SubjectIndex, SubscriptionSet};
pub use model::{
    ChapterRecord, ClassId, ClassRecord, SchoolRef, SubjectId, SubjectRecord, Subscription,
    SubscriptionStatus, TopicRecord, UserRecord,
};
pub use progression::{flatten_topics, FlatTopic, ProgressionGate, TopicState};
pub use resolver::{
    resolve_class_access, AccessDecision, AccessResolver, AccessType, SubjectAccess,
    UpgradeOptions,
};
pub use summary::{describe_decision, describe_subject_access, summary_message, SummaryContext};
