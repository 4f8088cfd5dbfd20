use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::article::{Actor, ArticleId, ArticlePatch, ArticleStatus, ArticleType};
use crate::clock::Clock;
use crate::directory::UserDirectory;
use crate::error::{StoreError, WorkflowError};
use crate::pagination::{PageRequest, Paginated, Pagination};
use crate::schedule::{ScheduleEntry, ScheduleSet, DATE_FORMAT, TIME_FORMAT};
use crate::store::{ArticleFilter, ArticleStore, SortOrder};
use crate::transitions::{Action, TransitionPolicy};

/// Attempts at a read-merge-write before a concurrent writer wins.
const MAX_ATTEMPTS: usize = 3;

/// Confirmation of a schedule request. Echoes the entries that were asked
/// for, not the whole merged set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleReceipt {
    pub article_id: ArticleId,
    pub scheduled_posts: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum CancelOutcome {
    Cancelled {
        article_id: ArticleId,
        removed: usize,
        remaining: ScheduleSet,
        status: ArticleStatus,
    },
    NotFound {
        article_id: ArticleId,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ScheduledPostsQuery {
    pub page: PageRequest,
    /// Restricts rows to one article status.
    pub status: Option<ArticleStatus>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPostRow {
    pub id: ArticleId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub article_type: ArticleType,
    pub status: ArticleStatus,
    pub category: String,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub scheduled_posts: ScheduleSet,
    pub author: String,
}

/// One calendar cell: a single platform entry of a scheduled or posted article.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarRow {
    pub id: String,
    pub title: String,
    pub article_id: ArticleId,
    pub platform: String,
    pub is_posted: bool,
    #[serde(rename = "type")]
    pub kind: ArticleType,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: ArticleStatus,
    pub content: String,
    pub scheduled_date: String,
    pub scheduled_time: String,
}

/// Manages the per-platform schedule attached to each article.
pub struct ScheduleManager<S: ?Sized, D: ?Sized> {
    store: Arc<S>,
    users: Arc<D>,
    clock: Arc<dyn Clock>,
    policy: TransitionPolicy,
}

impl<S: ?Sized, D: ?Sized> Clone for ScheduleManager<S, D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            users: Arc::clone(&self.users),
            clock: Arc::clone(&self.clock),
            policy: self.policy,
        }
    }
}

impl<S, D> ScheduleManager<S, D>
where
    S: ArticleStore + ?Sized,
    D: UserDirectory + ?Sized,
{
    pub fn new(store: Arc<S>, users: Arc<D>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            users,
            clock,
            policy: TransitionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Merges `entries` into the article's schedule by platform and marks the
    /// article SCHEDULED. With `post_now` every entry is stamped with the
    /// current time so the next sweep posts it.
    pub async fn schedule_post(
        &self,
        id: ArticleId,
        editor: &Actor,
        entries: Vec<ScheduleEntry>,
        post_now: bool,
    ) -> Result<ScheduleReceipt, WorkflowError> {
        self.policy.authorize(Action::Schedule, editor.role)?;
        if entries.is_empty() {
            return Err(WorkflowError::Validation(
                "at least one schedule entry is required".into(),
            ));
        }

        let now = self.clock.now();
        let entries: Vec<ScheduleEntry> = entries
            .into_iter()
            .map(|mut entry| {
                if post_now {
                    entry.date = now.format(DATE_FORMAT).to_string();
                    entry.time = now.format(TIME_FORMAT).to_string();
                }
                entry.is_posted = false;
                entry
            })
            .collect();
        for entry in &entries {
            entry
                .local_datetime()
                .map_err(|e| WorkflowError::Validation(e.to_string()))?;
        }

        let mut attempt = 1;
        loop {
            let article = self
                .store
                .find_by_id(id)
                .await?
                .ok_or(WorkflowError::NotFound(id))?;
            self.policy.check(article.status, Action::Schedule)?;

            let mut merged = article.scheduled_posts.clone();
            merged.merge(entries.iter().cloned());
            let patch = ArticlePatch::status(ArticleStatus::Scheduled)
                .with_schedule(merged)
                .with_editor(editor.id.clone());

            match self.store.update(id, patch, Some(article.version)).await {
                Ok(updated) => {
                    info!(
                        article_id = id,
                        platforms = updated.scheduled_posts.len(),
                        post_now,
                        "article scheduled"
                    );
                    return Ok(ScheduleReceipt {
                        article_id: id,
                        scheduled_posts: entries,
                    });
                }
                Err(StoreError::Conflict { .. }) if attempt < MAX_ATTEMPTS => {
                    debug!(article_id = id, attempt, "schedule write raced, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Drops the listed platforms and re-derives the article status from what
    /// is left. A missing article is reported in the outcome, not as an error.
    pub async fn cancel_scheduled_post(
        &self,
        id: ArticleId,
        editor: &Actor,
        platforms: &[String],
    ) -> Result<CancelOutcome, WorkflowError> {
        self.policy.authorize(Action::CancelSchedule, editor.role)?;
        if platforms.is_empty() {
            return Err(WorkflowError::Validation(
                "at least one platform is required".into(),
            ));
        }

        let mut attempt = 1;
        loop {
            let Some(article) = self.store.find_by_id(id).await? else {
                warn!(article_id = id, "cancel requested for missing article");
                return Ok(CancelOutcome::NotFound { article_id: id });
            };
            self.policy.check(article.status, Action::CancelSchedule)?;

            let mut remaining = article.scheduled_posts.clone();
            let removed = remaining.cancel(platforms);
            let status = remaining.derived_status();
            let patch = ArticlePatch::status(status)
                .with_schedule(remaining.clone())
                .with_editor(editor.id.clone());

            match self.store.update(id, patch, Some(article.version)).await {
                Ok(_) => {
                    info!(article_id = id, removed, status = %status, "scheduled posts cancelled");
                    return Ok(CancelOutcome::Cancelled {
                        article_id: id,
                        removed,
                        remaining,
                        status,
                    });
                }
                Err(StoreError::Conflict { .. }) if attempt < MAX_ATTEMPTS => {
                    debug!(article_id = id, attempt, "cancel write raced, retrying");
                    attempt += 1;
                }
                Err(StoreError::NotFound(_)) => {
                    return Ok(CancelOutcome::NotFound { article_id: id });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub async fn fetch_scheduled_posts(
        &self,
        query: &ScheduledPostsQuery,
    ) -> Result<Paginated<ScheduledPostRow>, WorkflowError> {
        let mut filter = ArticleFilter::new();
        if let Some(status) = query.status {
            filter = filter.status(status);
        }
        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            filter = filter.category(category);
        }
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            filter = filter.title_contains(search);
        }

        let articles = self
            .store
            .find_many(
                &filter,
                query.page.skip(),
                Some(query.page.page_size()),
                SortOrder::CreatedAsc,
            )
            .await?;
        let total = self.store.count(&filter).await?;

        let mut items = Vec::with_capacity(articles.len());
        for article in articles {
            let author = match &article.reporter_id {
                Some(reporter) => self.users.display_name(reporter).await,
                None => String::new(),
            };
            items.push(ScheduledPostRow {
                id: article.id,
                title: article.title,
                created_at: article.created_at,
                article_type: article.kind,
                status: article.status,
                category: article.category,
                audio_url: article.audio_url,
                video_url: article.video_url,
                thumbnail_url: article.thumbnail_url,
                scheduled_posts: article.scheduled_posts,
                author,
            });
        }

        Ok(Paginated {
            items,
            pagination: Pagination::new(total, query.page),
        })
    }

    /// One row per platform entry of every SCHEDULED or POSTED article.
    pub async fn fetch_calendar_data(&self) -> Result<Vec<CalendarRow>, WorkflowError> {
        let filter =
            ArticleFilter::new().statuses([ArticleStatus::Scheduled, ArticleStatus::Posted]);
        let articles = self
            .store
            .find_many(&filter, 0, None, SortOrder::CreatedAsc)
            .await?;

        let rows = articles
            .iter()
            .flat_map(|article| {
                article.scheduled_posts.iter().map(move |entry| CalendarRow {
                    id: article.id.to_string(),
                    title: format!("{} - ({})", article.title, entry.platform),
                    article_id: article.id,
                    platform: entry.platform.clone(),
                    is_posted: entry.is_posted,
                    kind: article.kind,
                    audio_url: article.audio_url.clone(),
                    video_url: article.video_url.clone(),
                    thumbnail_url: article.thumbnail_url.clone(),
                    status: article.status,
                    content: article.content.clone(),
                    scheduled_date: entry.date.clone(),
                    scheduled_time: entry.time.clone(),
                })
            })
            .collect();
        Ok(rows)
    }
}
