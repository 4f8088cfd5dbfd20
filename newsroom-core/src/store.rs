use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::article::{
    Article, ArticleId, ArticlePatch, ArticleStatus, ArticleType, NewArticle, UserId,
};
use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;

/// Row filter understood by every store. Empty lists and `None` match anything.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub reporter_ids: Vec<UserId>,
    pub editor_id: Option<UserId>,
    pub statuses: Vec<ArticleStatus>,
    pub exclude_statuses: Vec<ArticleStatus>,
    pub kind: Option<ArticleType>,
    pub categories: Vec<String>,
    pub title_contains: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl ArticleFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reporter(mut self, id: impl Into<UserId>) -> Self {
        self.reporter_ids.push(id.into());
        self
    }

    pub fn status(mut self, status: ArticleStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn statuses<I: IntoIterator<Item = ArticleStatus>>(mut self, statuses: I) -> Self {
        self.statuses.extend(statuses);
        self
    }

    pub fn exclude_status(mut self, status: ArticleStatus) -> Self {
        self.exclude_statuses.push(status);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn title_contains(mut self, needle: impl Into<String>) -> Self {
        self.title_contains = Some(needle.into());
        self
    }

    pub fn created_since(mut self, from: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self
    }

    pub fn created_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.created_before = Some(cutoff);
        self
    }

    pub fn matches(&self, article: &Article) -> bool {
        if !self.reporter_ids.is_empty()
            && !article
                .reporter_id
                .as_ref()
                .is_some_and(|r| self.reporter_ids.contains(r))
        {
            return false;
        }
        if let Some(editor) = &self.editor_id {
            if article.editor_id.as_ref() != Some(editor) {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&article.status) {
            return false;
        }
        if self.exclude_statuses.contains(&article.status) {
            return false;
        }
        if self.kind.is_some_and(|k| k != article.kind) {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&article.category) {
            return false;
        }
        if let Some(needle) = &self.title_contains {
            if !article.title.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if self.created_from.is_some_and(|from| article.created_at < from) {
            return false;
        }
        if self.created_to.is_some_and(|to| article.created_at > to) {
            return false;
        }
        if self.created_before.is_some_and(|cutoff| article.created_at >= cutoff) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    CreatedAsc,
    #[default]
    CreatedDesc,
    UpdatedDesc,
}

impl SortOrder {
    fn sort(self, rows: &mut [Article]) {
        match self {
            SortOrder::CreatedAsc => rows.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id))),
            SortOrder::CreatedDesc => rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id))),
            SortOrder::UpdatedDesc => rows.sort_by(|a, b| (b.updated_at, b.id).cmp(&(a.updated_at, a.id))),
        }
    }
}

/// Persistence capability consumed by the engines.
///
/// Every mutation is atomic per article. `update` accepts the version the caller
/// read; a mismatch is reported as [`StoreError::Conflict`] instead of overwriting.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn find_by_id(&self, id: ArticleId) -> Result<Option<Article>, StoreError>;

    async fn create(&self, article: NewArticle) -> Result<Article, StoreError>;

    async fn update(
        &self,
        id: ArticleId,
        patch: ArticlePatch,
        expected_version: Option<u64>,
    ) -> Result<Article, StoreError>;

    async fn delete(&self, id: ArticleId) -> Result<Article, StoreError>;

    async fn delete_many(&self, filter: &ArticleFilter) -> Result<usize, StoreError>;

    async fn find_many(
        &self,
        filter: &ArticleFilter,
        skip: usize,
        take: Option<usize>,
        order: SortOrder,
    ) -> Result<Vec<Article>, StoreError>;

    async fn count(&self, filter: &ArticleFilter) -> Result<usize, StoreError>;

    /// Row count per status. Statuses with no rows are absent.
    async fn group_by_status(
        &self,
        filter: &ArticleFilter,
    ) -> Result<BTreeMap<ArticleStatus, usize>, StoreError>;
}

#[derive(Debug, Clone, Default)]
struct StoreData {
    next_id: ArticleId,
    articles: BTreeMap<ArticleId, Article>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StoreSnapshot {
    #[serde(default)]
    next_id: ArticleId,
    #[serde(default)]
    articles: Vec<Article>,
}

impl From<StoreSnapshot> for StoreData {
    fn from(snapshot: StoreSnapshot) -> Self {
        let max_id = snapshot.articles.iter().map(|a| a.id).max().unwrap_or(0);
        Self {
            next_id: snapshot.next_id.max(max_id + 1).max(1),
            articles: snapshot.articles.into_iter().map(|a| (a.id, a)).collect(),
        }
    }
}

/// Article store kept in memory and, when opened from a file, mirrored to a
/// JSON document after every mutation. Timestamps come from the store's clock.
#[derive(Clone)]
pub struct JsonArticleStore {
    inner: Arc<RwLock<StoreData>>,
    path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for JsonArticleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonArticleStore")
            .field("path", &self.path)
            .field("zone", &self.clock.zone())
            .finish_non_exhaustive()
    }
}

impl Default for JsonArticleStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl JsonArticleStore {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreData {
                next_id: 1,
                articles: BTreeMap::new(),
            })),
            path: None,
            clock: Arc::new(SystemClock::default()),
        }
    }

    /// Opens the store backed by `path`. A corrupt file falls back to the
    /// `.json.tmp` sibling left by an interrupted write, then to an empty store.
    pub async fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!(error = %e, path = %parent.display(), "failed to create store dir");
            }
        }
        let snapshot: StoreSnapshot = read_json_with_tmp_fallback(&path).await;
        let data = StoreData::from(snapshot);
        debug!(articles = data.articles.len(), path = %path.display(), "article store loaded");
        Self {
            inner: Arc::new(RwLock::new(data)),
            path: Some(path),
            clock: Arc::new(SystemClock::default()),
        }
    }

    /// Replaces the clock used to stamp `createdAt` and `updatedAt`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn persist(&self, data: &StoreData) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let snapshot = StoreSnapshot {
            next_id: data.next_id,
            articles: data.articles.values().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Persists `data`, restoring it with `undo` if the write fails so memory
    /// never runs ahead of disk.
    async fn commit(
        &self,
        data: &mut StoreData,
        undo: impl FnOnce(&mut StoreData),
    ) -> Result<(), StoreError> {
        if let Err(err) = self.persist(data).await {
            warn!(error = %err, "failed to persist article store, rolling back");
            undo(data);
            return Err(err);
        }
        Ok(())
    }
}

async fn read_json_with_tmp_fallback<T: DeserializeOwned + Default>(path: &Path) -> T {
    match tokio::fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<T>(&bytes) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to parse JSON, trying tmp fallback");
                let tmp = path.with_extension("json.tmp");
                match tokio::fs::read(&tmp).await {
                    Ok(tmp_bytes) => serde_json::from_slice::<T>(&tmp_bytes).unwrap_or_default(),
                    Err(_) => Default::default(),
                }
            }
        },
        Err(_) => Default::default(),
    }
}

#[async_trait]
impl ArticleStore for JsonArticleStore {
    async fn find_by_id(&self, id: ArticleId) -> Result<Option<Article>, StoreError> {
        Ok(self.inner.read().await.articles.get(&id).cloned())
    }

    async fn create(&self, article: NewArticle) -> Result<Article, StoreError> {
        let mut data = self.inner.write().await;
        let id = data.next_id;
        let created = article.into_article(id, self.clock.now_utc());
        data.next_id += 1;
        data.articles.insert(id, created.clone());
        self.commit(&mut data, |d| {
            d.articles.remove(&id);
            d.next_id = id;
        })
        .await?;
        debug!(article_id = id, status = %created.status, "article created");
        Ok(created)
    }

    async fn update(
        &self,
        id: ArticleId,
        patch: ArticlePatch,
        expected_version: Option<u64>,
    ) -> Result<Article, StoreError> {
        let mut data = self.inner.write().await;
        let article = data.articles.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if let Some(expected) = expected_version {
            if article.version != expected {
                return Err(StoreError::Conflict {
                    id,
                    expected,
                    actual: article.version,
                });
            }
        }
        let previous = article.clone();
        article.apply(patch, self.clock.now_utc());
        let updated = article.clone();
        self.commit(&mut data, |d| {
            d.articles.insert(id, previous);
        })
        .await?;
        Ok(updated)
    }

    async fn delete(&self, id: ArticleId) -> Result<Article, StoreError> {
        let mut data = self.inner.write().await;
        let removed = data.articles.remove(&id).ok_or(StoreError::NotFound(id))?;
        let restore = removed.clone();
        self.commit(&mut data, |d| {
            d.articles.insert(id, restore);
        })
        .await?;
        Ok(removed)
    }

    async fn delete_many(&self, filter: &ArticleFilter) -> Result<usize, StoreError> {
        let mut data = self.inner.write().await;
        let doomed: Vec<ArticleId> = data
            .articles
            .values()
            .filter(|a| filter.matches(a))
            .map(|a| a.id)
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }
        let removed: Vec<Article> = doomed
            .iter()
            .filter_map(|id| data.articles.remove(id))
            .collect();
        let count = removed.len();
        self.commit(&mut data, |d| {
            d.articles.extend(removed.into_iter().map(|a| (a.id, a)));
        })
        .await?;
        Ok(count)
    }

    async fn find_many(
        &self,
        filter: &ArticleFilter,
        skip: usize,
        take: Option<usize>,
        order: SortOrder,
    ) -> Result<Vec<Article>, StoreError> {
        let data = self.inner.read().await;
        let mut rows: Vec<Article> = data
            .articles
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        order.sort(&mut rows);
        let rows = rows.into_iter().skip(skip);
        Ok(match take {
            Some(n) => rows.take(n).collect(),
            None => rows.collect(),
        })
    }

    async fn count(&self, filter: &ArticleFilter) -> Result<usize, StoreError> {
        let data = self.inner.read().await;
        Ok(data.articles.values().filter(|a| filter.matches(a)).count())
    }

    async fn group_by_status(
        &self,
        filter: &ArticleFilter,
    ) -> Result<BTreeMap<ArticleStatus, usize>, StoreError> {
        let data = self.inner.read().await;
        let mut groups = BTreeMap::new();
        for article in data.articles.values().filter(|a| filter.matches(a)) {
            *groups.entry(article.status).or_insert(0) += 1;
        }
        Ok(groups)
    }
}
