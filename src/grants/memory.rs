// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use access_core::{ChapterRecord, ClassId, ClassRecord, Subscription, UserRecord};

use super::{CatalogStore, ProgressStore, SubscriptionStore, UserDirectory};
use crate::error::AccessResult;

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserRecord>,
    classes: BTreeMap<ClassId, ClassRecord>,
    subscriptions: Vec<Subscription>,
    content: HashMap<String, Vec<ChapterRecord>>,
    /// (user id, subject id) -> completed topic ids
    progress: HashMap<(String, String), HashSet<String>>,
}

/// In-process implementation of every adapter trait, for tests and demos
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: UserRecord) {
        self.tables.write().users.insert(user.id.clone(), user);
    }

    pub fn insert_class(&self, class: ClassRecord) {
        self.tables.write().classes.insert(class.id, class);
    }

    pub fn insert_subscription(&self, subscription: Subscription) {
        self.tables.write().subscriptions.push(subscription);
    }

    pub fn remove_subscription(&self, subscription_id: &str) {
        self.tables
            .write()
            .subscriptions
            .retain(|s| s.id != subscription_id);
    }

    pub fn set_subject_content(&self, subject_id: &str, chapters: Vec<ChapterRecord>) {
        self.tables
            .write()
            .content
            .insert(subject_id.to_string(), chapters);
    }

    pub fn mark_completed(&self, user_id: &str, subject_id: &str, topic_id: &str) {
        self.tables
            .write()
            .progress
            .entry((user_id.to_string(), subject_id.to_string()))
            .or_default()
            .insert(topic_id.to_string());
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user(&self, user_id: &str) -> AccessResult<Option<UserRecord>> {
        Ok(self.tables.read().users.get(user_id).cloned())
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn effective_subscriptions(
        &self,
        user_id: &str,
        as_of: DateTime<Utc>,
    ) -> AccessResult<Vec<Subscription>> {
        Ok(self
            .tables
            .read()
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id && s.is_effective(as_of))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_class(&self, class_id: ClassId) -> AccessResult<Option<ClassRecord>> {
        Ok(self.tables.read().classes.get(&class_id).cloned())
    }

    async fn active_classes(&self) -> AccessResult<Vec<ClassRecord>> {
        Ok(self
            .tables
            .read()
            .classes
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect())
    }

    async fn subject_content(&self, subject_id: &str) -> AccessResult<Vec<ChapterRecord>> {
        Ok(self
            .tables
            .read()
            .content
            .get(subject_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn completed_topics(
        &self,
        user_id: &str,
        subject_id: &str,
    ) -> AccessResult<HashSet<String>> {
        Ok(self
            .tables
            .read()
            .progress
            .get(&(user_id.to_string(), subject_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
