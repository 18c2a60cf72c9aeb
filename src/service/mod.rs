// SPDX-License-Identifier: Apache-2.0

//! Access Service
//!
//! Request-scoped entry point. Each call fetches the grant facts it needs
//! concurrently, each fetch bounded by the configured timeout, then hands
//! them to the pure resolver. Nothing is cached between calls.
//!
//! Failure policy: a failed or timed-out source grants nothing and is listed
//! in the report's `unavailable_sources`. Not-found errors, and a class
//! listing that cannot be loaded at all, are returned as `Err`.

pub mod report;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::time::{timeout, Duration};
use tracing::{debug, instrument, warn};

use access_core::{
    summary_message, AccessResolver, AccessType, ClassId, ClassRecord, ProgressionGate,
    SchoolGrant, SubjectAccess, SubjectIndex, Subscription, SubscriptionSet, SummaryContext,
    UserRecord,
};

use crate::config::AccessConfig;
use crate::error::{AccessError, AccessResult, GrantSource};
use crate::grants::{CatalogStore, ProgressStore, SubscriptionStore, UserDirectory};
use crate::metrics;

use report::subject_reason;
pub use report::{AccessSummary, ClassAccessReport, SubjectAccessReport, SubjectTopicsReport};

/// Source of "now" for a request
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// User-side grant facts of one request, after degradation
struct UserFacts {
    user: UserRecord,
    rows: Vec<Subscription>,
    unavailable: Vec<GrantSource>,
}

pub struct AccessService {
    users: Arc<dyn UserDirectory>,
    subscriptions: Arc<dyn SubscriptionStore>,
    catalog: Arc<dyn CatalogStore>,
    progress: Arc<dyn ProgressStore>,
    config: AccessConfig,
    clock: Clock,
}

impl AccessService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        subscriptions: Arc<dyn SubscriptionStore>,
        catalog: Arc<dyn CatalogStore>,
        progress: Arc<dyn ProgressStore>,
        config: AccessConfig,
    ) -> Self {
        Self {
            users,
            subscriptions,
            catalog,
            progress,
            config,
            clock: Arc::new(Utc::now),
        }
    }

    /// Service backed by one store implementing every adapter.
    pub fn from_store<S>(store: Arc<S>, config: AccessConfig) -> Self
    where
        S: UserDirectory + SubscriptionStore + CatalogStore + ProgressStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store.clone(), store, config)
    }

    /// Replaces the wall clock, e.g. to pin "now" in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    fn resolver(&self) -> AccessResolver {
        AccessResolver::new(self.config.default_subject_price)
    }

    async fn fetch<T, F>(&self, source: GrantSource, fut: F) -> AccessResult<T>
    where
        F: Future<Output = AccessResult<T>>,
    {
        let timeout_ms = self.config.source_timeout_ms;
        match timeout(Duration::from_millis(timeout_ms), fut).await {
            Ok(result) => result,
            Err(_) => Err(AccessError::Timeout {
                grant_source: source,
                timeout_ms,
            }),
        }
    }

    /// Fetches the user record and effective subscriptions concurrently.
    async fn user_facts(&self, user_id: &str, as_of: DateTime<Utc>) -> UserFacts {
        let (user, rows) = tokio::join!(
            self.fetch(GrantSource::User, self.users.find_user(user_id)),
            self.fetch(
                GrantSource::Subscriptions,
                self.subscriptions.effective_subscriptions(user_id, as_of)
            ),
        );

        let mut unavailable = Vec::new();
        let user = match user {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!(user_id, "Unknown user, resolving without school grant");
                UserRecord::unaffiliated(user_id)
            }
            Err(e) => {
                note_unavailable(&e, &mut unavailable);
                UserRecord::unaffiliated(user_id)
            }
        };
        let rows = rows.unwrap_or_else(|e| {
            note_unavailable(&e, &mut unavailable);
            Vec::new()
        });

        UserFacts {
            user,
            rows,
            unavailable,
        }
    }

    fn partition(
        &self,
        rows: Vec<Subscription>,
        index: &SubjectIndex,
        as_of: DateTime<Utc>,
    ) -> SubscriptionSet {
        let set = SubscriptionSet::partition(rows, index, as_of);
        if !set.skipped.is_empty() {
            metrics::record_malformed_rows(set.skipped.len());
            for skipped in &set.skipped {
                let err = AccessError::from(skipped.clone());
                warn!(error = %err, "Ignored subscription row");
            }
        }
        set
    }

    fn decide(
        &self,
        class: &ClassRecord,
        facts: UserFacts,
        as_of: DateTime<Utc>,
    ) -> ClassAccessReport {
        let index = SubjectIndex::from_classes([class]);
        let subscriptions = self.partition(facts.rows, &index, as_of);
        let grant = SchoolGrant::for_user(&facts.user, &self.config.grade_class_map);
        let decision = self.resolver().resolve(class, &grant, &subscriptions);
        metrics::record_decision(decision.access_type);
        ClassAccessReport::new(class, decision, facts.unavailable)
    }

    /// Access decision for one class.
    ///
    /// Returns `InvalidClassReference` when the class does not exist or is
    /// inactive. A catalog failure yields a report granting nothing.
    #[instrument(skip(self))]
    pub async fn resolve_class_access(
        &self,
        user_id: &str,
        class_id: ClassId,
    ) -> AccessResult<ClassAccessReport> {
        let started = Instant::now();
        let as_of = (self.clock)();

        let (facts, class) = tokio::join!(
            self.user_facts(user_id, as_of),
            self.fetch(GrantSource::Catalog, self.catalog.find_class(class_id)),
        );

        let report = match class {
            Ok(Some(class)) if class.is_active => self.decide(&class, facts, as_of),
            Ok(_) => return Err(AccessError::invalid_class(class_id)),
            Err(e) => {
                let mut unavailable = facts.unavailable;
                note_unavailable(&e, &mut unavailable);
                metrics::record_decision(AccessType::None);
                ClassAccessReport::unavailable(class_id, unavailable)
            }
        };

        metrics::record_duration(started.elapsed().as_micros() as u64);
        debug!(access_type = report.decision.access_type.as_str(), "Class access resolved");
        Ok(report)
    }

    /// Decisions for every active class, ordered by class id.
    ///
    /// This is the only call where a catalog failure is returned as an error:
    /// without the class list there is no decision to degrade to.
    #[instrument(skip(self))]
    pub async fn resolve_all_accessible_classes(
        &self,
        user_id: &str,
    ) -> AccessResult<Vec<ClassAccessReport>> {
        let started = Instant::now();
        let as_of = (self.clock)();

        let (facts, classes) = tokio::join!(
            self.user_facts(user_id, as_of),
            self.fetch(GrantSource::Catalog, self.catalog.active_classes()),
        );
        let mut classes = match classes {
            Ok(classes) => classes,
            Err(e) => {
                note_unavailable(&e, &mut Vec::new());
                return Err(e);
            }
        };
        classes.retain(|c| c.is_active);
        classes.sort_by_key(|c| c.id);

        let index = SubjectIndex::from_classes(&classes);
        let subscriptions = self.partition(facts.rows, &index, as_of);
        let grant = SchoolGrant::for_user(&facts.user, &self.config.grade_class_map);
        let resolver = self.resolver();

        let reports = classes
            .iter()
            .map(|class| {
                let decision = resolver.resolve(class, &grant, &subscriptions);
                metrics::record_decision(decision.access_type);
                ClassAccessReport::new(class, decision, facts.unavailable.clone())
            })
            .collect();

        metrics::record_duration(started.elapsed().as_micros() as u64);
        Ok(reports)
    }

    /// Access to a single subject of a class.
    #[instrument(skip(self))]
    pub async fn check_subject_access(
        &self,
        user_id: &str,
        class_id: ClassId,
        subject_id: &str,
    ) -> AccessResult<SubjectAccessReport> {
        let report = self.resolve_class_access(user_id, class_id).await?;

        let catalog_down = report.unavailable_sources.contains(&GrantSource::Catalog);
        let subject = match report.decision.subject(subject_id) {
            Some(subject) => subject.clone(),
            // Without the catalog the subject cannot be verified; deny it.
            None if catalog_down => SubjectAccess {
                subject_id: subject_id.to_string(),
                name: subject_id.to_string(),
                price: self.config.default_subject_price,
                has_access: false,
                access_type: AccessType::None,
                can_upgrade: false,
            },
            None => return Err(AccessError::invalid_subject(class_id, subject_id)),
        };

        Ok(SubjectAccessReport {
            message: subject_reason(&subject, &report.class_name, &report.unavailable_sources),
            class_id,
            class_name: report.class_name,
            class_access_type: report.decision.access_type,
            can_upgrade_to_class: report.decision.can_upgrade_to_class,
            subject,
            unavailable_sources: report.unavailable_sources,
        })
    }

    /// Topic list of a subject with payment access and sequential unlock
    /// combined.
    #[instrument(skip(self))]
    pub async fn subject_topics(
        &self,
        user_id: &str,
        class_id: ClassId,
        subject_id: &str,
    ) -> AccessResult<SubjectTopicsReport> {
        let (access, content, completed) = tokio::join!(
            self.check_subject_access(user_id, class_id, subject_id),
            self.fetch(GrantSource::Catalog, self.catalog.subject_content(subject_id)),
            self.fetch(
                GrantSource::Progress,
                self.progress.completed_topics(user_id, subject_id)
            ),
        );
        let mut access = access?;

        let chapters = content.unwrap_or_else(|e| {
            note_unavailable(&e, &mut access.unavailable_sources);
            Vec::new()
        });
        let completed: HashSet<String> = completed.unwrap_or_else(|e| {
            note_unavailable(&e, &mut access.unavailable_sources);
            HashSet::new()
        });

        let gate = ProgressionGate::from_chapters(&chapters, &completed);
        Ok(SubjectTopicsReport {
            topics: gate.topic_states(access.has_access()),
            progress: gate.subject_progress(),
            completed: gate.is_subject_completed(),
            access,
        })
    }

    /// User-level status message for dashboards and the browse view.
    ///
    /// Rows are checked against the active catalog, so the counts agree with
    /// `resolve_all_accessible_classes`. Without the catalog only class-wide
    /// rows are counted.
    #[instrument(skip(self))]
    pub async fn access_summary(&self, user_id: &str) -> AccessResult<AccessSummary> {
        let as_of = (self.clock)();
        let (facts, classes) = tokio::join!(
            self.user_facts(user_id, as_of),
            self.fetch(GrantSource::Catalog, self.catalog.active_classes()),
        );
        let UserFacts {
            user,
            mut rows,
            mut unavailable,
        } = facts;

        let index = match classes {
            Ok(classes) => SubjectIndex::from_classes(&classes),
            Err(e) => {
                note_unavailable(&e, &mut unavailable);
                rows.retain(Subscription::is_class_wide);
                SubjectIndex::default()
            }
        };
        let subscriptions = self.partition(rows, &index, as_of);
        let context = SummaryContext::new(&user, &subscriptions);

        Ok(AccessSummary {
            message: summary_message(&context),
            context,
            unavailable_sources: unavailable,
        })
    }
}

fn note_unavailable(err: &AccessError, unavailable: &mut Vec<GrantSource>) {
    let Some(source) = err.grant_source() else {
        warn!(error = %err, "Unexpected adapter error, treating as unavailable");
        return;
    };
    let timed_out = matches!(err, AccessError::Timeout { .. });
    metrics::record_source_failure(timed_out);
    warn!(source = %source, error = %err, "Grant source unavailable, failing closed");
    if !unavailable.contains(&source) {
        unavailable.push(source);
    }
}
