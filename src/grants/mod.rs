// SPDX-License-Identifier: Apache-2.0

//! Grant source adapters
//!
//! Traits for the out-of-process collaborators the engine reads from. They
//! return raw facts only; interpretation happens in `access_core`.
//! `Ok(None)` / an empty list means "nothing found" and an `Err` means the
//! lookup itself failed; the service never confuses the two.

pub mod memory;
pub mod postgres;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use access_core::{ChapterRecord, ClassId, ClassRecord, Subscription, UserRecord};

use crate::error::AccessResult;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// User with school and grade, or `None` when the id is unknown
    async fn find_user(&self, user_id: &str) -> AccessResult<Option<UserRecord>>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Subscriptions of the user that are ACTIVE and not ended before `as_of`.
    async fn effective_subscriptions(
        &self,
        user_id: &str,
        as_of: DateTime<Utc>,
    ) -> AccessResult<Vec<Subscription>>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Class with its ordered subjects, whether active or not.
    async fn find_class(&self, class_id: ClassId) -> AccessResult<Option<ClassRecord>>;

    /// Every active class with its subjects, ordered by class id.
    async fn active_classes(&self) -> AccessResult<Vec<ClassRecord>>;

    /// Chapters and topics of a subject.
    async fn subject_content(&self, subject_id: &str) -> AccessResult<Vec<ChapterRecord>>;
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Ids of the topics of `subject_id` the user has completed.
    async fn completed_topics(
        &self,
        user_id: &str,
        subject_id: &str,
    ) -> AccessResult<HashSet<String>>;
}
