// SPDX-License-Identifier: Apache-2.0

//! Progression Gate
//!
//! Sequential unlock over the flattened topic order of a subject. A topic is
//! enabled when every topic before it is completed; the first topic is always
//! enabled. This gate only deals with completion sequencing; payment access
//! is combined by the caller via [`ProgressionGate::topic_states`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::ChapterRecord;

/// One entry of the flattened topic order, with completion normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatTopic {
    pub topic_id: String,
    pub chapter_id: String,
    pub title: String,
    pub completed: bool,
}

/// UI-facing state of a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicState {
    pub topic_id: String,
    pub enabled: bool,
    pub completed: bool,
}

/// Flattens chapters into topic order: chapters by `order`, then each
/// chapter's topics by `order`. Ties keep their input order.
///
/// A topic counts as completed when its legacy `completed` flag is set OR its
/// id is in `completed_ids`. This is the only place both shapes are read.
pub fn flatten_topics(
    chapters: &[ChapterRecord],
    completed_ids: &HashSet<String>,
) -> Vec<FlatTopic> {
    let mut ordered_chapters: Vec<&ChapterRecord> = chapters.iter().collect();
    ordered_chapters.sort_by_key(|c| c.order);

    let mut flat = Vec::new();
    for chapter in ordered_chapters {
        let mut topics: Vec<_> = chapter.topics.iter().collect();
        topics.sort_by_key(|t| t.order);
        flat.extend(topics.into_iter().map(|topic| FlatTopic {
            topic_id: topic.id.clone(),
            chapter_id: chapter.id.clone(),
            title: topic.title.clone(),
            completed: topic.completed == Some(true) || completed_ids.contains(&topic.id),
        }));
    }
    flat
}

#[derive(Debug, Clone)]
pub struct ProgressionGate {
    topics: Vec<FlatTopic>,
    /// Index of the first incomplete topic, or `topics.len()` when all done.
    first_incomplete: usize,
}

impl ProgressionGate {
    pub fn new(topics: Vec<FlatTopic>) -> Self {
        let first_incomplete = topics
            .iter()
            .position(|t| !t.completed)
            .unwrap_or(topics.len());
        Self {
            topics,
            first_incomplete,
        }
    }

    pub fn from_chapters(chapters: &[ChapterRecord], completed_ids: &HashSet<String>) -> Self {
        Self::new(flatten_topics(chapters, completed_ids))
    }

    pub fn topics(&self) -> &[FlatTopic] {
        &self.topics
    }

    fn index_of(&self, topic_id: &str) -> Option<usize> {
        self.topics.iter().position(|t| t.topic_id == topic_id)
    }

    fn enabled_at(&self, index: usize) -> bool {
        index == 0 || index <= self.first_incomplete
    }

    /// Unknown topic ids are never enabled.
    pub fn is_topic_enabled(&self, topic_id: &str) -> bool {
        self.index_of(topic_id).is_some_and(|i| self.enabled_at(i))
    }

    pub fn is_topic_completed(&self, topic_id: &str) -> bool {
        self.index_of(topic_id)
            .is_some_and(|i| self.topics[i].completed)
    }

    /// Next topic in flattened order, enabled or not.
    pub fn next_topic(&self, topic_id: &str) -> Option<&FlatTopic> {
        self.index_of(topic_id).and_then(|i| self.topics.get(i + 1))
    }

    pub fn can_navigate_to_next(&self, topic_id: &str) -> bool {
        self.is_topic_completed(topic_id) && self.next_topic(topic_id).is_some()
    }

    pub fn completed_count(&self) -> usize {
        self.topics.iter().filter(|t| t.completed).count()
    }

    /// Rounded percentage in `0..=100`; zero for a subject without topics.
    pub fn subject_progress(&self) -> u8 {
        let total = self.topics.len();
        if total == 0 {
            return 0;
        }
        let pct = (100.0 * self.completed_count() as f64 / total as f64).round();
        pct.clamp(0.0, 100.0) as u8
    }

    /// An empty subject is not completed.
    pub fn is_subject_completed(&self) -> bool {
        !self.topics.is_empty() && self.first_incomplete == self.topics.len()
    }

    /// Per-topic states for a topic list. `enabled` is the progression gate
    /// AND the subject-level access.
    pub fn topic_states(&self, has_subject_access: bool) -> Vec<TopicState> {
        self.topics
            .iter()
            .enumerate()
            .map(|(i, t)| TopicState {
                topic_id: t.topic_id.clone(),
                enabled: has_subject_access && self.enabled_at(i),
                completed: t.completed,
            })
            .collect()
    }
}
