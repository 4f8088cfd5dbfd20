//! Which role may move an article out of which status.
//!
//! Two policies exist. `Permissive` keeps only the guards the newsroom has always
//! had: role checks plus the "drafts only" rule for reporter edits. `Strict`
//! additionally requires the article to be in a status listed in [`Action::strict_sources`].

use serde::{Deserialize, Serialize};

use crate::article::{ArticleStatus, Role};
use crate::error::WorkflowError;

use ArticleStatus::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    #[default]
    Permissive,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateDraft,
    UpdateDraft,
    Submit,
    Review(ArticleStatus),
    Publish,
    EditorEdit,
    Schedule,
    CancelSchedule,
    Delete,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::CreateDraft => "create a draft of",
            Action::UpdateDraft => "update the draft of",
            Action::Submit => "submit",
            Action::Review(_) => "review",
            Action::Publish => "publish",
            Action::EditorEdit => "edit",
            Action::Schedule => "schedule",
            Action::CancelSchedule => "cancel the schedule of",
            Action::Delete => "delete",
        }
    }

    pub fn permitted_role(self, role: Role) -> bool {
        match self {
            Action::CreateDraft | Action::UpdateDraft | Action::Submit => role == Role::Reporter,
            Action::Review(_)
            | Action::Publish
            | Action::EditorEdit
            | Action::Schedule
            | Action::CancelSchedule => role == Role::Editor,
            Action::Delete => true,
        }
    }

    /// Statuses an article may be in for this action under the strict policy.
    /// `None` means any status.
    pub fn strict_sources(self) -> Option<&'static [ArticleStatus]> {
        match self {
            Action::UpdateDraft | Action::Submit => Some(&[Draft, Reverted]),
            Action::Review(_) => Some(&[Submitted]),
            Action::Publish | Action::Schedule => Some(&[Reviewed, Scheduled, Posted]),
            Action::CancelSchedule => Some(&[Scheduled, Posted]),
            Action::CreateDraft | Action::EditorEdit | Action::Delete => None,
        }
    }
}

impl TransitionPolicy {
    pub fn authorize(self, action: Action, role: Role) -> Result<(), WorkflowError> {
        if action.permitted_role(role) {
            Ok(())
        } else {
            Err(WorkflowError::not_allowed(format!(
                "{role:?} may not {} an article",
                action.name()
            )))
        }
    }

    pub fn permits(self, from: ArticleStatus, action: Action) -> bool {
        if action == Action::UpdateDraft && !from.is_reporter_editable() {
            return false;
        }
        match self {
            TransitionPolicy::Permissive => true,
            TransitionPolicy::Strict => {
                let source_ok = action
                    .strict_sources()
                    .map_or(true, |sources| sources.contains(&from));
                let target_ok = match action {
                    Action::Review(target) => matches!(target, Reviewed | Reverted),
                    _ => true,
                };
                source_ok && target_ok
            }
        }
    }

    pub fn check(self, from: ArticleStatus, action: Action) -> Result<(), WorkflowError> {
        if self.permits(from, action) {
            Ok(())
        } else {
            Err(WorkflowError::transition(from, action.name()))
        }
    }
}
