use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, TimeZone};
use chrono_tz::Tz;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::article::{ArticleId, ArticlePatch, ArticleStatus};
use crate::clock::Clock;
use crate::config::{PurgeConfig, SweepConfig};
use crate::error::{JobError, StoreError};
use crate::store::{ArticleFilter, ArticleStore, SortOrder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepEvent {
    /// Entries of an article went out; `status` is the article's new status.
    Posted {
        article_id: ArticleId,
        platforms: Vec<String>,
        status: ArticleStatus,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub updated: usize,
    pub posted_entries: usize,
    pub conflicts: usize,
    pub failures: usize,
    pub events: Vec<SweepEvent>,
}

/// Handle to a background job. Dropping it leaves the job running.
pub struct JobHandle {
    name: &'static str,
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl JobHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn stop(self) -> Result<(), JobError> {
        let _ = self.cancel_tx.send(());
        self.join.await.map_err(JobError::from)
    }
}

/// Runs one sweep: every due, unposted entry of every SCHEDULED article is
/// marked posted and the article status re-derived. A failure on one article
/// is logged and counted; the rest of the tick carries on.
pub async fn sweep_once<S>(store: &S, clock: &dyn Clock) -> SweepReport
where
    S: ArticleStore + ?Sized,
{
    let mut report = SweepReport::default();
    let filter = ArticleFilter::new().status(ArticleStatus::Scheduled);
    let articles = match store.find_many(&filter, 0, None, SortOrder::CreatedAsc).await {
        Ok(articles) => articles,
        Err(err) => {
            warn!(error = %err, "sweep could not list scheduled articles");
            report.failures += 1;
            return report;
        }
    };
    let now = clock.now();
    report.scanned = articles.len();

    for article in articles {
        if article.scheduled_posts.is_empty() {
            continue;
        }
        let mut schedule = article.scheduled_posts.clone();
        let outcome = schedule.mark_due(&now);
        for (platform, err) in &outcome.invalid {
            warn!(article_id = article.id, %platform, error = %err, "unreadable schedule entry");
        }
        if !outcome.changed() {
            continue;
        }

        let status = schedule.derived_status();
        let patch = ArticlePatch::status(status).with_schedule(schedule);
        match store.update(article.id, patch, Some(article.version)).await {
            Ok(_) => {
                for platform in &outcome.posted {
                    info!(article_id = article.id, %platform, "scheduled post went out");
                }
                report.updated += 1;
                report.posted_entries += outcome.posted.len();
                report.events.push(SweepEvent::Posted {
                    article_id: article.id,
                    platforms: outcome.posted,
                    status,
                });
            }
            Err(StoreError::Conflict { .. }) => {
                debug!(article_id = article.id, "article changed during sweep, next tick will retry");
                report.conflicts += 1;
            }
            Err(err) => {
                warn!(article_id = article.id, error = %err, "failed to record posted entries");
                report.failures += 1;
            }
        }
    }

    report
}

/// Starts the recurring sweep. Events are forwarded to `events` when given.
pub fn spawn_sweeper<S>(
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: SweepConfig,
    events: Option<mpsc::Sender<SweepEvent>>,
) -> JobHandle
where
    S: ArticleStore + ?Sized + 'static,
{
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("sweeper shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let report = sweep_once(store.as_ref(), clock.as_ref()).await;
                    info!(
                        scanned = report.scanned,
                        updated = report.updated,
                        posted = report.posted_entries,
                        conflicts = report.conflicts,
                        failed = report.failures,
                        "sweep tick finished"
                    );
                    if let Some(tx) = &events {
                        for event in report.events {
                            if tx.send(event).await.is_err() {
                                warn!("sweep event receiver dropped");
                                break;
                            }
                        }
                    }
                }
            }
        }
    });

    JobHandle {
        name: "sweeper",
        cancel_tx,
        join,
    }
}

/// Deletes every article created more than `retention` ago, whatever its status.
pub async fn purge_once<S>(
    store: &S,
    clock: &dyn Clock,
    retention: chrono::Duration,
) -> Result<usize, StoreError>
where
    S: ArticleStore + ?Sized,
{
    let Some(cutoff) = clock.now_utc().checked_sub_signed(retention) else {
        warn!(retention_days = retention.num_days(), "retention reaches past the calendar, nothing purged");
        return Ok(0);
    };
    let removed = store
        .delete_many(&ArticleFilter::new().created_before(cutoff))
        .await?;
    info!(removed, %cutoff, "old articles purged");
    Ok(removed)
}

/// Next occurrence of `hour`:00 strictly after `now`, in `now`'s zone.
pub fn next_daily_run(now: DateTime<Tz>, hour: u32) -> DateTime<Tz> {
    let zone = now.timezone();
    let mut day = now.date_naive();
    for _ in 0..3 {
        let candidate = day
            .and_hms_opt(hour.min(23), 0, 0)
            .and_then(|local| zone.from_local_datetime(&local).earliest());
        if let Some(candidate) = candidate.filter(|c| *c > now) {
            return candidate;
        }
        day = match day.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => break,
        };
    }
    now + chrono::Duration::days(1)
}

/// Starts the daily purge, firing at `config.hour` in the clock's zone.
pub fn spawn_purger<S>(store: Arc<S>, clock: Arc<dyn Clock>, config: PurgeConfig) -> JobHandle
where
    S: ArticleStore + ?Sized + 'static,
{
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let join = tokio::spawn(async move {
        loop {
            let now = clock.now();
            let next = next_daily_run(now, config.run_hour());
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!(next_run = %next, "purge scheduled");

            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("purger shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    if let Err(err) = purge_once(store.as_ref(), clock.as_ref(), config.retention()).await {
                        warn!(error = %err, "purge run failed");
                    }
                }
            }
        }
    });

    JobHandle {
        name: "purger",
        cancel_tx,
        join,
    }
}
