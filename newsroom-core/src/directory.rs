use std::collections::HashMap;

use async_trait::async_trait;

use crate::article::UserId;

/// Resolves user ids to display names for denormalised read rows.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn username(&self, user_id: &str) -> Option<String>;

    /// Username, or the raw id when the user is unknown.
    async fn display_name(&self, user_id: &str) -> String {
        self.username(user_id)
            .await
            .unwrap_or_else(|| user_id.to_owned())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: HashMap<UserId, String>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: impl Into<UserId>, username: impl Into<String>) -> Self {
        self.users.insert(id.into(), username.into());
        self
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn username(&self, user_id: &str) -> Option<String> {
        self.users.get(user_id).cloned()
    }
}
