mod mediawiki;
mod recording;
mod snapshot;
mod types;

pub use mediawiki::MediaWikiClient;
pub use recording::RecordingSource;
pub use snapshot::{PageSnapshot, Snapshot, SnapshotSource, UserSnapshot};
pub use types::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Typed access to the remote encyclopedia.
///
/// Revision lists from `fetch_page_revisions` are newest first; those from
/// `fetch_page_history` are oldest first. Analyzers do not rely on either.
#[async_trait]
pub trait WikiSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_page_info(&self, title: &str) -> Result<PageInfo, WikiError>;
    async fn fetch_page_revisions(&self, title: &str, limit: usize)
        -> Result<Vec<Revision>, WikiError>;
    async fn fetch_page_history(&self, title: &str, days: u32) -> Result<Vec<Revision>, WikiError>;
    async fn fetch_page_contributors(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<ListedContributor>, WikiError>;
    async fn fetch_user_info(&self, username: &str) -> Result<UserInfo, WikiError>;
    async fn fetch_user_contributions(
        &self,
        username: &str,
        limit: usize,
    ) -> Result<Vec<Contribution>, WikiError>;

    /// Looks up one revision of a page; the default scans recent revisions.
    async fn fetch_revision(&self, title: &str, revision_id: u64) -> Result<Revision, WikiError> {
        self.fetch_page_revisions(title, 500)
            .await?
            .into_iter()
            .find(|rev| rev.rev_id == revision_id)
            .ok_or_else(|| WikiError::NotFound(format!("revision {revision_id} of {title}")))
    }

    /// Fixed analysis time for sources that replay captured data.
    fn reference_time(&self) -> Option<DateTime<Utc>> {
        None
    }
}

pub type SourceHandle = Arc<dyn WikiSource>;
