use super::{
    Contribution, ListedContributor, PageInfo, PageSnapshot, Revision, Snapshot, SourceHandle,
    UserInfo, UserSnapshot, WikiError, WikiSource,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Delegates to another source and keeps a copy of every successful fetch.
///
/// Page analyses run concurrently, so captured data lives in concurrent maps.
pub struct RecordingSource {
    inner: SourceHandle,
    pages: DashMap<String, PageSnapshot>,
    users: DashMap<String, UserSnapshot>,
}

impl RecordingSource {
    pub fn new(inner: SourceHandle) -> Self {
        Self {
            inner,
            pages: DashMap::new(),
            users: DashMap::new(),
        }
    }

    /// Freezes everything captured so far.
    pub fn snapshot(&self, language: &str, captured_at: DateTime<Utc>) -> Snapshot {
        Snapshot {
            language: language.to_string(),
            captured_at: Some(captured_at),
            pages: self
                .pages
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
            users: self
                .users
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        }
    }

    fn record_page(&self, title: &str, update: impl FnOnce(&mut PageSnapshot)) {
        let mut entry = self.pages.entry(title.to_string()).or_default();
        update(entry.value_mut());
    }

    fn record_user(&self, username: &str, update: impl FnOnce(&mut UserSnapshot)) {
        let mut entry = self.users.entry(username.to_string()).or_default();
        update(entry.value_mut());
    }
}

#[async_trait]
impl WikiSource for RecordingSource {
    fn name(&self) -> &str {
        "recording"
    }

    async fn fetch_page_info(&self, title: &str) -> Result<PageInfo, WikiError> {
        let info = self.inner.fetch_page_info(title).await?;
        self.record_page(title, |page| page.info = Some(info.clone()));
        Ok(info)
    }

    async fn fetch_page_revisions(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<Revision>, WikiError> {
        let revisions = self.inner.fetch_page_revisions(title, limit).await?;
        self.record_page(title, |page| {
            if revisions.len() > page.revisions.len() {
                page.revisions = revisions.clone();
            }
        });
        Ok(revisions)
    }

    async fn fetch_page_history(&self, title: &str, days: u32) -> Result<Vec<Revision>, WikiError> {
        let history = self.inner.fetch_page_history(title, days).await?;
        self.record_page(title, |page| {
            if history.len() > page.history.len() {
                page.history = history.clone();
            }
        });
        Ok(history)
    }

    async fn fetch_page_contributors(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<ListedContributor>, WikiError> {
        let contributors = self.inner.fetch_page_contributors(title, limit).await?;
        self.record_page(title, |page| page.contributors = contributors.clone());
        Ok(contributors)
    }

    async fn fetch_user_info(&self, username: &str) -> Result<UserInfo, WikiError> {
        let info = self.inner.fetch_user_info(username).await?;
        self.record_user(username, |user| user.info = Some(info.clone()));
        Ok(info)
    }

    async fn fetch_user_contributions(
        &self,
        username: &str,
        limit: usize,
    ) -> Result<Vec<Contribution>, WikiError> {
        let contributions = self.inner.fetch_user_contributions(username, limit).await?;
        self.record_user(username, |user| {
            if contributions.len() > user.contributions.len() {
                user.contributions = contributions.clone();
            }
        });
        Ok(contributions)
    }

    async fn fetch_revision(&self, title: &str, revision_id: u64) -> Result<Revision, WikiError> {
        let revision = self.inner.fetch_revision(title, revision_id).await?;
        self.record_page(title, |page| {
            if !page.revisions.iter().any(|rev| rev.rev_id == revision_id) {
                page.revisions.push(revision.clone());
            }
        });
        Ok(revision)
    }

    fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.inner.reference_time()
    }
}
