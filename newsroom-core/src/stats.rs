use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::article::{ArticleStatus, Role};
use crate::clock::Clock;
use crate::error::WorkflowError;
use crate::store::{ArticleFilter, ArticleStore};

pub type StatusCounts = BTreeMap<ArticleStatus, usize>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReporterStats {
    #[serde(flatten)]
    pub counts: StatusCounts,
    #[serde(rename = "TOTAL")]
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub today_submissions: usize,
    pub pending_reviews: usize,
    pub reverted_submissions: usize,
    pub approved_to_publish: usize,
    pub published: usize,
}

/// Dashboard aggregates derived from per-status counts.
pub struct StatsService<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ArticleStore + ?Sized> StatsService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Per-status counts of a reporter's articles. Scheduling states belong
    /// to editors and are always reported as zero.
    pub async fn reporter_stats(&self, reporter_id: &str) -> Result<ReporterStats, WorkflowError> {
        let filter = ArticleFilter::new().reporter(reporter_id);
        let mut counts = zeroed(self.store.group_by_status(&filter).await?);
        counts.insert(ArticleStatus::Scheduled, 0);
        counts.insert(ArticleStatus::Posted, 0);
        let total = self.store.count(&filter).await?;
        Ok(ReporterStats { counts, total })
    }

    pub async fn editor_dashboard(&self) -> Result<DashboardStats, WorkflowError> {
        let today = ArticleFilter::new().created_since(self.clock.start_of_today());
        let today_submissions = self.store.count(&today).await?;
        let counts = zeroed(self.store.group_by_status(&ArticleFilter::new()).await?);
        let count = |s: ArticleStatus| counts.get(&s).copied().unwrap_or(0);
        Ok(DashboardStats {
            today_submissions,
            pending_reviews: count(ArticleStatus::Submitted),
            reverted_submissions: count(ArticleStatus::Reverted),
            approved_to_publish: count(ArticleStatus::Reviewed),
            published: count(ArticleStatus::Published),
        })
    }

    /// Count for every status across all articles.
    pub async fn status_breakdown(&self) -> Result<StatusCounts, WorkflowError> {
        Ok(zeroed(self.store.group_by_status(&ArticleFilter::new()).await?))
    }

    /// Badge counts for the navigation sidebar of each role. The editor's
    /// SCHEDULED badge also counts REVIEWED articles waiting to be scheduled.
    pub async fn sidebar_stats(&self, role: Role) -> Result<StatusCounts, WorkflowError> {
        let all = self.status_breakdown().await?;
        let count = |s: ArticleStatus| all.get(&s).copied().unwrap_or(0);
        let mut badges = StatusCounts::new();
        match role {
            Role::Reporter => {
                badges.insert(ArticleStatus::Draft, count(ArticleStatus::Draft));
                badges.insert(ArticleStatus::Reverted, count(ArticleStatus::Reverted));
            }
            Role::Editor => {
                badges.insert(ArticleStatus::Submitted, count(ArticleStatus::Submitted));
                badges.insert(ArticleStatus::Published, count(ArticleStatus::Published));
                badges.insert(
                    ArticleStatus::Scheduled,
                    count(ArticleStatus::Scheduled) + count(ArticleStatus::Reviewed),
                );
            }
        }
        Ok(badges)
    }
}

fn zeroed(mut counts: StatusCounts) -> StatusCounts {
    for status in ArticleStatus::ALL {
        counts.entry(status).or_insert(0);
    }
    counts
}
