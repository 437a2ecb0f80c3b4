//! Username directory the endpoint queries.
//!
//! The real product backs this with a document database; the trait keeps
//! that collaborator external. The in-memory implementation serves the
//! binary and the tests.

use async_trait::async_trait;
use dashmap::DashSet;

/// Source of truth for taken usernames.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Whether `username` is already taken by a verified user.
    async fn is_username_taken(&self, username: &str) -> anyhow::Result<bool>;
}

/// Process-local directory holding a set of taken usernames.
#[derive(Default)]
pub struct MemoryDirectory {
    taken: DashSet<String>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `username` as taken.
    pub fn insert(&self, username: &str) {
        self.taken.insert(username.to_string());
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn is_username_taken(&self, username: &str) -> anyhow::Result<bool> {
        Ok(self.taken.contains(username))
    }
}
