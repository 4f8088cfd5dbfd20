use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schedule::ScheduleSet;

pub type ArticleId = i64;
pub type UserId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArticleStatus {
    Draft,
    Submitted,
    Reviewed,
    Reverted,
    Scheduled,
    Posted,
    Published,
}

impl ArticleStatus {
    pub const ALL: [ArticleStatus; 7] = [
        ArticleStatus::Draft,
        ArticleStatus::Submitted,
        ArticleStatus::Reviewed,
        ArticleStatus::Reverted,
        ArticleStatus::Scheduled,
        ArticleStatus::Posted,
        ArticleStatus::Published,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArticleStatus::Draft => "DRAFT",
            ArticleStatus::Submitted => "SUBMITTED",
            ArticleStatus::Reviewed => "REVIEWED",
            ArticleStatus::Reverted => "REVERTED",
            ArticleStatus::Scheduled => "SCHEDULED",
            ArticleStatus::Posted => "POSTED",
            ArticleStatus::Published => "PUBLISHED",
        }
    }

    /// Statuses in which the owning reporter may still change the article.
    pub fn is_reporter_editable(self) -> bool {
        matches!(self, ArticleStatus::Draft | ArticleStatus::Reverted)
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArticleType {
    #[default]
    Text,
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Reporter,
    Editor,
}

/// The authenticated user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn reporter(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            role: Role::Reporter,
        }
    }

    pub fn editor(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            role: Role::Editor,
        }
    }

    pub fn is_editor(&self) -> bool {
        self.role == Role::Editor
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "type", default)]
    pub kind: ArticleType,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: ArticleStatus,
    pub reporter_id: Option<UserId>,
    pub editor_id: Option<UserId>,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub scheduled_posts: ScheduleSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Article {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.reporter_id.as_deref() == Some(user_id)
    }

    /// Applies a partial update. Absent fields keep their value; remarks only
    /// survive while the article is REVERTED.
    pub fn apply(&mut self, patch: ArticlePatch, now: DateTime<Utc>) {
        let ArticlePatch {
            fields,
            status,
            remarks,
            editor_id,
            scheduled_posts,
        } = patch;

        if let Some(title) = fields.title {
            self.title = title;
        }
        if let Some(content) = fields.content {
            self.content = content;
        }
        if let Some(category) = fields.category {
            self.category = category;
        }
        if let Some(tags) = fields.tags {
            self.tags = tags;
        }
        if let Some(kind) = fields.kind {
            self.kind = kind;
        }
        if let Some(audio) = fields.audio_url {
            self.audio_url = Some(audio);
        }
        if let Some(video) = fields.video_url {
            self.video_url = Some(video);
        }
        if let Some(thumbnail) = fields.thumbnail_url {
            self.thumbnail_url = Some(thumbnail);
        }
        if let Some(status) = status {
            self.status = status;
        }
        if let Some(remarks) = remarks {
            self.remarks = remarks;
        }
        if let Some(editor_id) = editor_id {
            self.editor_id = Some(editor_id);
        }
        if let Some(posts) = scheduled_posts {
            self.scheduled_posts = posts;
        }

        if self.status != ArticleStatus::Reverted {
            self.remarks.clear();
        }
        self.updated_at = now;
        self.version += 1;
    }
}

/// Author-editable content of an article. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArticleFields {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(rename = "type")]
    pub kind: Option<ArticleType>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl ArticleFields {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_kind(mut self, kind: ArticleType) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Treats blank strings as absent. Submission only overwrites fields the
    /// reporter actually filled in.
    pub(crate) fn without_blanks(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }
        Self {
            title: keep(self.title),
            content: keep(self.content),
            category: keep(self.category),
            tags: self.tags,
            kind: self.kind,
            audio_url: keep(self.audio_url),
            video_url: keep(self.video_url),
            thumbnail_url: keep(self.thumbnail_url),
        }
    }
}

/// A new article as handed to the store, before an id is assigned.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub reporter_id: UserId,
    pub status: ArticleStatus,
    pub fields: ArticleFields,
}

impl NewArticle {
    pub fn into_article(self, id: ArticleId, now: DateTime<Utc>) -> Article {
        let f = self.fields;
        Article {
            id,
            title: f.title.unwrap_or_default(),
            content: f.content.unwrap_or_default(),
            category: f.category.unwrap_or_default(),
            tags: f.tags.unwrap_or_default(),
            kind: f.kind.unwrap_or_default(),
            audio_url: f.audio_url,
            video_url: f.video_url,
            thumbnail_url: f.thumbnail_url,
            status: self.status,
            reporter_id: Some(self.reporter_id),
            editor_id: None,
            remarks: String::new(),
            scheduled_posts: ScheduleSet::default(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArticlePatch {
    pub fields: ArticleFields,
    pub status: Option<ArticleStatus>,
    pub remarks: Option<String>,
    pub editor_id: Option<UserId>,
    pub scheduled_posts: Option<ScheduleSet>,
}

impl ArticlePatch {
    pub fn fields(fields: ArticleFields) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    pub fn status(status: ArticleStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: ArticleStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }

    pub fn with_editor(mut self, editor_id: impl Into<UserId>) -> Self {
        self.editor_id = Some(editor_id.into());
        self
    }

    pub fn with_schedule(mut self, posts: ScheduleSet) -> Self {
        self.scheduled_posts = Some(posts);
        self
    }
}
