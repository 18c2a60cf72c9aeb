// SPDX-License-Identifier: Apache-2.0

//! PostgreSQL adapter
//!
//! Reads the application's Prisma-managed tables (`"User"`, `"School"`,
//! `"Class"`, `"Subject"`, `"Chapter"`, `"Topic"`, `"Subscription"`,
//! `"TopicProgress"`). Prisma stores `DateTime` columns as `timestamp(3)`
//! without time zone holding UTC, so they are decoded as naive UTC.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{instrument, warn};

use access_core::{
    ChapterRecord, ClassId, ClassRecord, SchoolRef, SubjectRecord, Subscription, TopicRecord,
    UserRecord,
};

use super::{CatalogStore, ProgressStore, SubscriptionStore, UserDirectory};
use crate::error::{AccessError, AccessResult, GrantSource};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT_SECS: u64 = 10;

type SubscriptionRow = (
    String,
    String,
    i64,
    Option<String>,
    String,
    Option<NaiveDateTime>,
    Option<NaiveDateTime>,
);

type ClassRow = (i64, String, i64, bool);
type SubjectRow = (String, String, Option<i64>, i64);
type ChapterRow = (String, String, i32);
type TopicRow = (String, String, i32, Option<bool>, String);

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: Option<u32>) -> AccessResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS))
            .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
            .connect(database_url)
            .await
            .map_err(|e| AccessError::source_unavailable(GrantSource::Catalog, e.to_string()))?;
        Ok(Self::new(pool))
    }

    async fn subjects_of(&self, class_ids: &[ClassId]) -> AccessResult<Vec<SubjectRecord>> {
        let rows: Vec<SubjectRow> = sqlx::query_as(
            r#"SELECT id, name, price::bigint, "classId"::bigint
               FROM "Subject"
               WHERE "classId" = ANY($1)
               ORDER BY "classId", id"#,
        )
        .bind(class_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(catalog_err)?;

        Ok(rows
            .into_iter()
            .map(|(id, name, price, class_id)| SubjectRecord {
                id,
                name,
                price,
                class_id,
            })
            .collect())
    }

    async fn with_subjects(&self, rows: Vec<ClassRow>) -> AccessResult<Vec<ClassRecord>> {
        let ids: Vec<ClassId> = rows.iter().map(|r| r.0).collect();
        let mut by_class: BTreeMap<ClassId, Vec<SubjectRecord>> = BTreeMap::new();
        for subject in self.subjects_of(&ids).await? {
            by_class.entry(subject.class_id).or_default().push(subject);
        }

        Ok(rows
            .into_iter()
            .map(|(id, name, price, is_active)| ClassRecord {
                id,
                name,
                price,
                is_active,
                subjects: by_class.remove(&id).unwrap_or_default(),
            })
            .collect())
    }
}

fn catalog_err(e: sqlx::Error) -> AccessError {
    AccessError::source_unavailable(GrantSource::Catalog, e.to_string())
}

#[async_trait]
impl UserDirectory for PgStore {
    #[instrument(skip(self))]
    async fn find_user(&self, user_id: &str) -> AccessResult<Option<UserRecord>> {
        let row: Option<(String, Option<String>, Option<String>, Option<bool>)> = sqlx::query_as(
            r#"SELECT u.id, u.grade, s.id, s."isActive"
               FROM "User" u
               LEFT JOIN "School" s ON s.id = u."schoolId"
               WHERE u.id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AccessError::source_unavailable(GrantSource::User, e.to_string()))?;

        Ok(row.map(|(id, grade, school_id, school_active)| UserRecord {
            id,
            grade,
            school: school_id.map(|id| SchoolRef {
                id,
                is_active: school_active.unwrap_or(false),
            }),
        }))
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    #[instrument(skip(self))]
    async fn effective_subscriptions(
        &self,
        user_id: &str,
        as_of: DateTime<Utc>,
    ) -> AccessResult<Vec<Subscription>> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(
            r#"SELECT id, "userId", "classId"::bigint, "subjectId", status::text,
                      "startDate", "endDate"
               FROM "Subscription"
               WHERE "userId" = $1
                 AND status::text = 'ACTIVE'
                 AND ("endDate" IS NULL OR "endDate" >= $2)"#,
        )
        .bind(user_id)
        .bind(as_of.naive_utc())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AccessError::source_unavailable(GrantSource::Subscriptions, e.to_string()))?;

        let mut subscriptions = Vec::with_capacity(rows.len());
        for (id, user_id, class_id, subject_id, status, start, end) in rows {
            let status = match status.parse() {
                Ok(status) => status,
                Err(e) => {
                    warn!(subscription_id = %id, error = %e, "Dropping subscription row");
                    continue;
                }
            };
            subscriptions.push(Subscription {
                id,
                user_id,
                class_id,
                subject_id,
                status,
                start_date: start.map(|t| t.and_utc()),
                end_date: end.map(|t| t.and_utc()),
            });
        }
        Ok(subscriptions)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    #[instrument(skip(self))]
    async fn find_class(&self, class_id: ClassId) -> AccessResult<Option<ClassRecord>> {
        let row: Option<ClassRow> = sqlx::query_as(
            r#"SELECT id::bigint, name, price::bigint, "isActive" FROM "Class" WHERE id = $1"#,
        )
        .bind(class_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(catalog_err)?;

        match row {
            Some(row) => Ok(self.with_subjects(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn active_classes(&self) -> AccessResult<Vec<ClassRecord>> {
        let rows: Vec<ClassRow> = sqlx::query_as(
            r#"SELECT id::bigint, name, price::bigint, "isActive"
               FROM "Class"
               WHERE "isActive" = true
               ORDER BY id"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(catalog_err)?;

        self.with_subjects(rows).await
    }

    #[instrument(skip(self))]
    async fn subject_content(&self, subject_id: &str) -> AccessResult<Vec<ChapterRecord>> {
        let chapters: Vec<ChapterRow> = sqlx::query_as(
            r#"SELECT id, title, "order" FROM "Chapter" WHERE "subjectId" = $1"#,
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await
        .map_err(catalog_err)?;

        let topics: Vec<TopicRow> = sqlx::query_as(
            r#"SELECT t.id, t.title, t."order", t.completed, t."chapterId"
               FROM "Topic" t
               JOIN "Chapter" c ON c.id = t."chapterId"
               WHERE c."subjectId" = $1"#,
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await
        .map_err(catalog_err)?;

        let mut chapters: Vec<ChapterRecord> = chapters
            .into_iter()
            .map(|(id, title, order)| ChapterRecord {
                id,
                title,
                order,
                topics: Vec::new(),
            })
            .collect();

        for (id, title, order, completed, chapter_id) in topics {
            if let Some(chapter) = chapters.iter_mut().find(|c| c.id == chapter_id) {
                chapter.topics.push(TopicRecord {
                    id,
                    title,
                    order,
                    completed,
                });
            }
        }
        Ok(chapters)
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    #[instrument(skip(self))]
    async fn completed_topics(
        &self,
        user_id: &str,
        subject_id: &str,
    ) -> AccessResult<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"SELECT p."topicId"
               FROM "TopicProgress" p
               JOIN "Topic" t ON t.id = p."topicId"
               JOIN "Chapter" c ON c.id = t."chapterId"
               WHERE p."userId" = $1 AND c."subjectId" = $2 AND p.completed = true"#,
        )
        .bind(user_id)
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AccessError::source_unavailable(GrantSource::Progress, e.to_string()))?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
