pub mod article;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod lifecycle;
pub mod pagination;
pub mod schedule;
pub mod scheduling;
pub mod stats;
pub mod store;
pub mod sweep;
pub mod transitions;

pub use article::{
    Actor, Article, ArticleFields, ArticleId, ArticlePatch, ArticleStatus, ArticleType,
    NewArticle, Role, UserId,
};
pub use catalog::{Catalog, DateRange, HistoryQuery};
pub use clock::{Clock, FixedClock, SystemClock, NEWSROOM_TZ};
pub use config::{PurgeConfig, StoreConfig, SweepConfig, WorkflowConfig, MAX_RETENTION_DAYS};
pub use directory::{StaticDirectory, UserDirectory};
pub use error::{ConfigError, EntryError, JobError, StoreError, WorkflowError};
pub use lifecycle::{EditorEdit, LifecycleEngine};
pub use pagination::{PageRequest, Paginated, Pagination};
pub use schedule::{ScheduleEntry, ScheduleSet};
pub use scheduling::{
    CalendarRow, CancelOutcome, ScheduleManager, ScheduleReceipt, ScheduledPostRow,
    ScheduledPostsQuery,
};
pub use stats::{DashboardStats, ReporterStats, StatsService};
pub use store::{ArticleFilter, ArticleStore, JsonArticleStore, SortOrder};
pub use sweep::{
    next_daily_run, purge_once, spawn_purger, spawn_sweeper, sweep_once, JobHandle, SweepEvent,
    SweepReport,
};
pub use transitions::{Action, TransitionPolicy};
