use std::sync::Arc;

use tracing::info;

use crate::article::{
    Actor, Article, ArticleFields, ArticleId, ArticlePatch, ArticleStatus, NewArticle, Role,
};
use crate::error::WorkflowError;
use crate::store::ArticleStore;
use crate::transitions::{Action, TransitionPolicy};

/// Everything an editor may overwrite on an article.
#[derive(Debug, Clone, Default)]
pub struct EditorEdit {
    pub fields: ArticleFields,
    pub status: Option<ArticleStatus>,
    pub remarks: Option<String>,
}

/// Applies reporter and editor transitions to articles in the store.
pub struct LifecycleEngine<S: ?Sized> {
    store: Arc<S>,
    policy: TransitionPolicy,
}

impl<S: ?Sized> Clone for LifecycleEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy,
        }
    }
}

impl<S: ArticleStore + ?Sized> LifecycleEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            policy: TransitionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub async fn create_draft(
        &self,
        reporter: &Actor,
        fields: ArticleFields,
    ) -> Result<Article, WorkflowError> {
        self.policy.authorize(Action::CreateDraft, reporter.role)?;
        let article = self
            .store
            .create(NewArticle {
                reporter_id: reporter.id.clone(),
                status: ArticleStatus::Draft,
                fields,
            })
            .await?;
        info!(article_id = article.id, reporter = %reporter.id, "draft created");
        Ok(article)
    }

    /// Saves changes to a draft. `status`, when given, is forced onto the article.
    pub async fn update_draft(
        &self,
        id: ArticleId,
        reporter: &Actor,
        fields: ArticleFields,
        status: Option<ArticleStatus>,
    ) -> Result<Article, WorkflowError> {
        self.policy.authorize(Action::UpdateDraft, reporter.role)?;
        let article = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| WorkflowError::not_allowed(format!("article {id} does not exist")))?;
        if !article.is_owned_by(&reporter.id) {
            return Err(WorkflowError::not_allowed("not allowed to edit this draft"));
        }
        if !article.status.is_reporter_editable() {
            return Err(WorkflowError::not_allowed(format!(
                "only drafts can be edited, article is {}",
                article.status
            )));
        }
        self.policy.check(article.status, Action::UpdateDraft)?;
        if let Some(forced) = status {
            if self.policy == TransitionPolicy::Strict
                && !matches!(forced, ArticleStatus::Draft | ArticleStatus::Submitted)
            {
                return Err(WorkflowError::transition(article.status, "force a reporter status on"));
            }
            ensure_schedule_consistent(&article, forced)?;
        }

        let mut patch = ArticlePatch::fields(fields);
        patch.status = status;
        let updated = self.store.update(id, patch, Some(article.version)).await?;
        info!(article_id = id, status = %updated.status, "draft updated");
        Ok(updated)
    }

    /// Submits an article for review. Without an id a new article is created
    /// directly in SUBMITTED.
    pub async fn submit(
        &self,
        id: Option<ArticleId>,
        reporter: &Actor,
        fields: ArticleFields,
    ) -> Result<Article, WorkflowError> {
        self.policy.authorize(Action::Submit, reporter.role)?;
        let Some(id) = id else {
            let article = self
                .store
                .create(NewArticle {
                    reporter_id: reporter.id.clone(),
                    status: ArticleStatus::Submitted,
                    fields,
                })
                .await?;
            info!(article_id = article.id, reporter = %reporter.id, "article created and submitted");
            return Ok(article);
        };

        let article = self
            .store
            .find_by_id(id)
            .await?
            .filter(|a| a.is_owned_by(&reporter.id))
            .ok_or_else(|| WorkflowError::not_allowed("not allowed to submit this article"))?;
        if !article.status.is_reporter_editable() {
            return Err(WorkflowError::not_allowed(format!(
                "only drafts can be submitted, article is {}",
                article.status
            )));
        }
        self.policy.check(article.status, Action::Submit)?;

        let patch = ArticlePatch::fields(fields.without_blanks()).with_status(ArticleStatus::Submitted);
        let updated = self.store.update(id, patch, Some(article.version)).await?;
        info!(article_id = id, "article submitted");
        Ok(updated)
    }

    /// Records an editor's verdict. Remarks are kept only when reverting.
    pub async fn review(
        &self,
        id: ArticleId,
        editor: &Actor,
        status: ArticleStatus,
        remarks: Option<String>,
    ) -> Result<Article, WorkflowError> {
        let action = Action::Review(status);
        self.policy.authorize(action, editor.role)?;
        let article = self.load(id).await?;
        self.policy.check(article.status, action)?;
        ensure_schedule_consistent(&article, status)?;

        let remarks = if status == ArticleStatus::Reverted {
            remarks.unwrap_or_default()
        } else {
            String::new()
        };
        let patch = ArticlePatch::status(status)
            .with_remarks(remarks)
            .with_editor(editor.id.clone());
        let updated = self.store.update(id, patch, Some(article.version)).await?;
        info!(article_id = id, status = %status, editor = %editor.id, "article reviewed");
        Ok(updated)
    }

    pub async fn publish(&self, id: ArticleId, editor: &Actor) -> Result<Article, WorkflowError> {
        self.policy.authorize(Action::Publish, editor.role)?;
        let article = self.load(id).await?;
        self.policy.check(article.status, Action::Publish)?;

        let patch = ArticlePatch::status(ArticleStatus::Published).with_editor(editor.id.clone());
        let updated = self.store.update(id, patch, Some(article.version)).await?;
        info!(article_id = id, editor = %editor.id, "article published");
        Ok(updated)
    }

    /// Editor overwrite of any subset of fields. Any editor may edit any
    /// article that has an owning reporter.
    pub async fn editor_edit(
        &self,
        id: ArticleId,
        editor: &Actor,
        edit: EditorEdit,
    ) -> Result<Article, WorkflowError> {
        self.policy.authorize(Action::EditorEdit, editor.role)?;
        let article = self.load(id).await?;
        if article.reporter_id.is_none() {
            return Err(WorkflowError::InvalidState(format!(
                "article {id} has no reporter assigned"
            )));
        }
        self.policy.check(article.status, Action::EditorEdit)?;
        if let Some(status) = edit.status {
            ensure_schedule_consistent(&article, status)?;
        }

        let EditorEdit {
            fields,
            status,
            remarks,
        } = edit;
        let patch = ArticlePatch {
            fields,
            status,
            remarks,
            editor_id: Some(editor.id.clone()),
            scheduled_posts: None,
        };
        let updated = self.store.update(id, patch, Some(article.version)).await?;
        info!(article_id = id, editor = %editor.id, "article edited by editor");
        Ok(updated)
    }

    /// Reporters may delete their own articles, editors any article.
    pub async fn delete_article(&self, id: ArticleId, actor: &Actor) -> Result<Article, WorkflowError> {
        self.policy.authorize(Action::Delete, actor.role)?;
        let article = self.load(id).await?;
        if actor.role == Role::Reporter && !article.is_owned_by(&actor.id) {
            return Err(WorkflowError::not_allowed("not allowed to delete this article"));
        }
        let removed = self.store.delete(id).await?;
        info!(article_id = id, by = %actor.id, "article deleted");
        Ok(removed)
    }

    async fn load(&self, id: ArticleId) -> Result<Article, WorkflowError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(WorkflowError::NotFound(id))
    }
}

/// SCHEDULED and POSTED are derived from the schedule set; they can only be
/// forced when the set already implies them.
fn ensure_schedule_consistent(article: &Article, status: ArticleStatus) -> Result<(), WorkflowError> {
    let derived = article.scheduled_posts.derived_status();
    match status {
        ArticleStatus::Scheduled | ArticleStatus::Posted if derived != status => {
            Err(WorkflowError::InvalidState(format!(
                "article {} cannot be {status} while its schedule implies {derived}",
                article.id
            )))
        }
        _ => Ok(()),
    }
}
