use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use newsroom_core::{
    next_daily_run, purge_once, sweep_once, Article, ArticleFields, ArticleFilter, ArticleId,
    ArticlePatch, ArticleStatus, ArticleStore, Clock, FixedClock, JsonArticleStore, NewArticle,
    PurgeConfig, ScheduleEntry, ScheduleSet, SortOrder, StoreError, SweepEvent,
    MAX_RETENTION_DAYS, NEWSROOM_TZ,
};

fn ist(y: i32, m: u32, d: u32, h: u32, min: u32) -> FixedClock {
    FixedClock::at(NEWSROOM_TZ, NaiveDate::from_ymd_opt(y, m, d).unwrap(), h, min).unwrap()
}

async fn scheduled<S: ArticleStore + ?Sized>(store: &S, entries: Vec<ScheduleEntry>) -> ArticleId {
    let article = store
        .create(NewArticle {
            reporter_id: "alice".into(),
            status: ArticleStatus::Reviewed,
            fields: ArticleFields::default().with_title("Morning bulletin"),
        })
        .await
        .unwrap();
    let schedule: ScheduleSet = entries.into();
    let status = schedule.derived_status();
    store
        .update(article.id, ArticlePatch::status(status).with_schedule(schedule), None)
        .await
        .unwrap();
    article.id
}

#[tokio::test]
async fn due_entry_is_posted_and_article_becomes_posted() {
    let store = JsonArticleStore::in_memory();
    let id = scheduled(&store, vec![ScheduleEntry::new("twitter", "2025-01-01", "09:00")]).await;

    let report = sweep_once(&store, &ist(2025, 1, 1, 9, 1)).await;
    assert_eq!(report.scanned, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.posted_entries, 1);
    assert_eq!(
        report.events,
        vec![SweepEvent::Posted {
            article_id: id,
            platforms: vec!["twitter".into()],
            status: ArticleStatus::Posted,
        }]
    );

    let article = store.find_by_id(id).await.unwrap().unwrap();
    assert!(article.scheduled_posts.get("twitter").unwrap().is_posted);
    assert_eq!(article.status, ArticleStatus::Posted);
}

#[tokio::test]
async fn entry_due_exactly_now_is_posted() {
    let store = JsonArticleStore::in_memory();
    let id = scheduled(&store, vec![ScheduleEntry::new("twitter", "2025-01-01", "09:00")]).await;

    sweep_once(&store, &ist(2025, 1, 1, 9, 0)).await;
    let article = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(article.status, ArticleStatus::Posted);
}

#[tokio::test]
async fn sweep_reads_schedule_in_kolkata_not_utc() {
    let store = JsonArticleStore::in_memory();
    let id = scheduled(&store, vec![ScheduleEntry::new("twitter", "2025-01-01", "09:00")]).await;

    // 08:59 IST is 03:29 UTC; a UTC reading of "09:00" would be hours away either way
    let report = sweep_once(&store, &ist(2025, 1, 1, 8, 59)).await;
    assert_eq!(report.updated, 0);
    let article = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(article.status, ArticleStatus::Scheduled);
}

#[tokio::test]
async fn partially_due_article_stays_scheduled() {
    let store = JsonArticleStore::in_memory();
    let id = scheduled(
        &store,
        vec![
            ScheduleEntry::new("twitter", "2025-01-01", "09:00"),
            ScheduleEntry::new("linkedin", "2025-01-02", "09:00"),
        ],
    )
    .await;

    sweep_once(&store, &ist(2025, 1, 1, 12, 0)).await;
    let article = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(article.status, ArticleStatus::Scheduled);
    assert!(article.scheduled_posts.get("twitter").unwrap().is_posted);
    assert!(!article.scheduled_posts.get("linkedin").unwrap().is_posted);
}

#[tokio::test]
async fn sweeping_twice_changes_nothing_more() {
    let store = JsonArticleStore::in_memory();
    let id = scheduled(
        &store,
        vec![
            ScheduleEntry::new("twitter", "2025-01-01", "09:00"),
            ScheduleEntry::new("linkedin", "2025-01-02", "09:00"),
        ],
    )
    .await;
    let clock = ist(2025, 1, 1, 12, 0);

    sweep_once(&store, &clock).await;
    let after_first = store.find_by_id(id).await.unwrap().unwrap();
    let second = sweep_once(&store, &clock).await;
    let after_second = store.find_by_id(id).await.unwrap().unwrap();

    assert_eq!(second.updated, 0);
    // no redundant write either
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn articles_outside_scheduled_are_ignored() {
    let store = JsonArticleStore::in_memory();
    let id = scheduled(&store, vec![ScheduleEntry::new("twitter", "2025-01-01", "09:00")]).await;
    store
        .update(id, ArticlePatch::status(ArticleStatus::Published), None)
        .await
        .unwrap();

    let report = sweep_once(&store, &ist(2025, 6, 1, 0, 0)).await;
    assert_eq!(report.scanned, 0);
    let article = store.find_by_id(id).await.unwrap().unwrap();
    assert!(!article.scheduled_posts.get("twitter").unwrap().is_posted);
}

#[tokio::test]
async fn unreadable_entry_does_not_block_the_rest() {
    let store = JsonArticleStore::in_memory();
    let id = scheduled(
        &store,
        vec![
            ScheduleEntry::new("twitter", "not-a-date", "09:00"),
            ScheduleEntry::new("linkedin", "2025-01-01", "09:00"),
        ],
    )
    .await;

    let report = sweep_once(&store, &ist(2025, 1, 1, 10, 0)).await;
    assert_eq!(report.posted_entries, 1);
    let article = store.find_by_id(id).await.unwrap().unwrap();
    assert!(article.scheduled_posts.get("linkedin").unwrap().is_posted);
    assert_eq!(article.status, ArticleStatus::Scheduled);
}

/// Delegates to an in-memory store but refuses to update one article.
struct FlakyStore {
    inner: JsonArticleStore,
    broken: ArticleId,
}

#[async_trait]
impl ArticleStore for FlakyStore {
    async fn find_by_id(&self, id: ArticleId) -> Result<Option<Article>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn create(&self, article: NewArticle) -> Result<Article, StoreError> {
        self.inner.create(article).await
    }

    async fn update(
        &self,
        id: ArticleId,
        patch: ArticlePatch,
        expected_version: Option<u64>,
    ) -> Result<Article, StoreError> {
        if id == self.broken {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk on fire",
            )));
        }
        self.inner.update(id, patch, expected_version).await
    }

    async fn delete(&self, id: ArticleId) -> Result<Article, StoreError> {
        self.inner.delete(id).await
    }

    async fn delete_many(&self, filter: &ArticleFilter) -> Result<usize, StoreError> {
        self.inner.delete_many(filter).await
    }

    async fn find_many(
        &self,
        filter: &ArticleFilter,
        skip: usize,
        take: Option<usize>,
        order: SortOrder,
    ) -> Result<Vec<Article>, StoreError> {
        self.inner.find_many(filter, skip, take, order).await
    }

    async fn count(&self, filter: &ArticleFilter) -> Result<usize, StoreError> {
        self.inner.count(filter).await
    }

    async fn group_by_status(
        &self,
        filter: &ArticleFilter,
    ) -> Result<BTreeMap<ArticleStatus, usize>, StoreError> {
        self.inner.group_by_status(filter).await
    }
}

#[tokio::test]
async fn failure_on_one_article_does_not_stop_the_sweep() {
    let inner = JsonArticleStore::in_memory();
    let first = scheduled(&inner, vec![ScheduleEntry::new("x", "2025-01-01", "09:00")]).await;
    let second = scheduled(&inner, vec![ScheduleEntry::new("x", "2025-01-01", "09:00")]).await;
    let third = scheduled(&inner, vec![ScheduleEntry::new("x", "2025-01-01", "09:00")]).await;
    let store = FlakyStore {
        inner: inner.clone(),
        broken: second,
    };

    let report = sweep_once(&store, &ist(2025, 1, 1, 9, 30)).await;
    assert_eq!(report.failures, 1);
    assert_eq!(report.updated, 2);

    for (id, expected) in [
        (first, ArticleStatus::Posted),
        (second, ArticleStatus::Scheduled),
        (third, ArticleStatus::Posted),
    ] {
        let article = inner.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(article.status, expected, "article {id}");
    }
}

#[tokio::test]
async fn purge_removes_only_articles_past_retention() {
    let january = Arc::new(ist(2025, 1, 1, 8, 0));
    let march = Arc::new(ist(2025, 3, 1, 8, 0));
    let store = JsonArticleStore::in_memory().with_clock(january.clone());
    let old = scheduled(&store, vec![ScheduleEntry::new("x", "2025-01-01", "09:00")]).await;
    let fresh = scheduled(
        &store.clone().with_clock(march.clone()),
        vec![ScheduleEntry::new("x", "2025-03-01", "09:00")],
    )
    .await;

    let created = store.find_by_id(old).await.unwrap().unwrap().created_at;
    assert_eq!(created, january.now_utc());

    // on 1 March only the January article is past 30 days
    assert_eq!(purge_once(&store, &*march, chrono::Duration::days(30)).await.unwrap(), 1);
    assert!(store.find_by_id(old).await.unwrap().is_none());

    let mid_march = ist(2025, 3, 15, 1, 0);
    assert_eq!(purge_once(&store, &mid_march, chrono::Duration::days(30)).await.unwrap(), 0);
    assert!(store.find_by_id(fresh).await.unwrap().is_some());
}

#[tokio::test]
async fn oversized_retention_neither_panics_nor_purges() {
    let store = JsonArticleStore::in_memory();
    scheduled(&store, vec![ScheduleEntry::new("x", "2025-01-01", "09:00")]).await;

    let huge = PurgeConfig {
        retention_days: i64::MAX,
        ..PurgeConfig::default()
    };
    assert_eq!(huge.retention(), chrono::Duration::days(MAX_RETENTION_DAYS));
    let negative = PurgeConfig {
        retention_days: -5,
        ..PurgeConfig::default()
    };
    assert_eq!(negative.retention(), chrono::Duration::zero());

    let clock = ist(2025, 1, 1, 1, 0);
    assert_eq!(purge_once(&store, &clock, huge.retention()).await.unwrap(), 0);
    assert_eq!(purge_once(&store, &clock, chrono::TimeDelta::MAX).await.unwrap(), 0);
    assert_eq!(store.count(&ArticleFilter::new()).await.unwrap(), 1);
}

#[test]
fn next_daily_run_rolls_over_to_tomorrow() {
    let before = ist(2025, 3, 10, 0, 30).now();
    let next = next_daily_run(before, 1);
    assert_eq!(next, ist(2025, 3, 10, 1, 0).now());

    let after = ist(2025, 3, 10, 1, 0).now();
    let next = next_daily_run(after, 1);
    assert_eq!(next, ist(2025, 3, 11, 1, 0).now());
}
