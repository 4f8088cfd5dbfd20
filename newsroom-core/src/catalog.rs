use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::article::{Actor, Article, ArticleId, ArticleStatus, ArticleType, Role, UserId};
use crate::clock::Clock;
use crate::error::WorkflowError;
use crate::pagination::{PageRequest, Paginated, Pagination};
use crate::store::{ArticleFilter, ArticleStore, SortOrder};

/// Calendar period containing "now", in the newsroom zone. Weeks start on Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    Today,
    Week,
    Month,
}

impl DateRange {
    /// `[start, end)` of the period containing `now`.
    pub fn bounds(self, now: DateTime<Tz>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let today = now.date_naive();
        let (first, next) = match self {
            DateRange::Today => (today, today.checked_add_days(Days::new(1))?),
            DateRange::Week => {
                let back = Days::new(today.weekday().num_days_from_sunday().into());
                let first = today.checked_sub_days(back)?;
                (first, first.checked_add_days(Days::new(7))?)
            }
            DateRange::Month => {
                let first = today.with_day(1)?;
                (first, first.checked_add_months(Months::new(1))?)
            }
        };
        let zone = now.timezone();
        Some((local_midnight(zone, first)?, local_midnight(zone, next)?))
    }
}

fn local_midnight(zone: Tz, day: NaiveDate) -> Option<DateTime<Utc>> {
    zone.from_local_datetime(&day.and_hms_opt(0, 0, 0)?)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Filters for the article history view.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub search: Option<String>,
    pub statuses: Vec<ArticleStatus>,
    pub kind: Option<ArticleType>,
    pub categories: Vec<String>,
    /// Only honoured for editors; reporters always see their own articles.
    pub reporter_ids: Vec<UserId>,
    pub editor_id: Option<UserId>,
    /// Ignored when `created_from` or `created_to` is set.
    pub date_range: Option<DateRange>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

/// Read-only listings over the article store.
pub struct Catalog<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ?Sized> Clone for Catalog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: ArticleStore + ?Sized> Catalog<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Reporters may only read their own articles; editors read anything.
    pub async fn fetch_article(&self, actor: &Actor, id: ArticleId) -> Result<Article, WorkflowError> {
        let article = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(WorkflowError::NotFound(id))?;
        if actor.role == Role::Reporter && !article.is_owned_by(&actor.id) {
            return Err(WorkflowError::not_allowed("access denied to this article"));
        }
        Ok(article)
    }

    pub async fn drafts_by_author(
        &self,
        reporter_id: &str,
        page: PageRequest,
    ) -> Result<Paginated<Article>, WorkflowError> {
        let filter = ArticleFilter::new()
            .reporter(reporter_id)
            .status(ArticleStatus::Draft);
        self.page_of(&filter, SortOrder::CreatedDesc, page).await
    }

    pub async fn reverted_posts(
        &self,
        reporter_id: &str,
        page: PageRequest,
    ) -> Result<Paginated<Article>, WorkflowError> {
        let filter = ArticleFilter::new()
            .reporter(reporter_id)
            .status(ArticleStatus::Reverted);
        self.page_of(&filter, SortOrder::UpdatedDesc, page).await
    }

    /// Submitted articles waiting for an editor, newest first.
    pub async fn review_queue(
        &self,
        page: PageRequest,
        category: Option<&str>,
    ) -> Result<Paginated<Article>, WorkflowError> {
        let mut filter = ArticleFilter::new().status(ArticleStatus::Submitted);
        if let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) {
            filter = filter.category(category);
        }
        self.page_of(&filter, SortOrder::CreatedDesc, page).await
    }

    pub async fn article_history(
        &self,
        actor: &Actor,
        query: &HistoryQuery,
        page: PageRequest,
    ) -> Result<Paginated<Article>, WorkflowError> {
        let mut filter = ArticleFilter {
            kind: query.kind,
            categories: query.categories.clone(),
            created_from: query.created_from,
            created_to: query.created_to,
            title_contains: query.search.clone().filter(|s| !s.is_empty()),
            ..ArticleFilter::default()
        };
        if query.created_from.is_none() && query.created_to.is_none() {
            if let Some((start, end)) = query.date_range.and_then(|r| r.bounds(self.clock.now())) {
                filter.created_from = Some(start);
                filter.created_before = Some(end);
            }
        }
        match actor.role {
            Role::Editor => {
                filter.reporter_ids = query.reporter_ids.clone();
                filter.editor_id = query.editor_id.clone();
                if query.statuses.is_empty() {
                    filter.exclude_statuses.push(ArticleStatus::Draft);
                }
            }
            Role::Reporter => filter.reporter_ids = vec![actor.id.clone()],
        }
        filter.statuses = query.statuses.clone();
        self.page_of(&filter, SortOrder::UpdatedDesc, page).await
    }

    async fn page_of(
        &self,
        filter: &ArticleFilter,
        order: SortOrder,
        page: PageRequest,
    ) -> Result<Paginated<Article>, WorkflowError> {
        let items = self
            .store
            .find_many(filter, page.skip(), Some(page.page_size()), order)
            .await?;
        let total = self.store.count(filter).await?;
        Ok(Paginated {
            items,
            pagination: Pagination::new(total, page),
        })
    }
}
