use super::{
    Contribution, ListedContributor, PageInfo, Revision, UserInfo, WikiError, WikiSource,
};
use crate::event::parse_timestamp;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Everything fetched for one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSnapshot {
    pub info: Option<PageInfo>,
    /// Newest first.
    pub revisions: Vec<Revision>,
    /// Oldest first.
    pub history: Vec<Revision>,
    pub contributors: Vec<ListedContributor>,
}

/// Everything fetched for one account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSnapshot {
    pub info: Option<UserInfo>,
    pub contributions: Vec<Contribution>,
}

/// A captured dataset that can be replayed offline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub language: String,
    pub captured_at: Option<DateTime<Utc>>,
    pub pages: BTreeMap<String, PageSnapshot>,
    pub users: BTreeMap<String, UserSnapshot>,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self, WikiError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| WikiError::Snapshot(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| WikiError::Snapshot(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<(), WikiError> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| WikiError::Snapshot(e.to_string()))?;
        fs::write(path, raw).map_err(|e| WikiError::Snapshot(format!("{}: {e}", path.display())))
    }
}

/// Serves fetches from a [`Snapshot`] instead of the network.
pub struct SnapshotSource {
    snapshot: Snapshot,
}

impl SnapshotSource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_file(path: &Path) -> Result<Self, WikiError> {
        Snapshot::load(path).map(Self::new)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    fn page(&self, title: &str) -> Result<&PageSnapshot, WikiError> {
        self.snapshot
            .pages
            .get(title)
            .ok_or_else(|| WikiError::NotFound(format!("page {title}")))
    }

    fn user(&self, username: &str) -> Result<&UserSnapshot, WikiError> {
        self.snapshot
            .users
            .get(username)
            .ok_or_else(|| WikiError::NotFound(format!("user {username}")))
    }
}

#[async_trait]
impl WikiSource for SnapshotSource {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn fetch_page_info(&self, title: &str) -> Result<PageInfo, WikiError> {
        self.page(title)?
            .info
            .clone()
            .ok_or_else(|| WikiError::NotFound(format!("page {title}")))
    }

    async fn fetch_page_revisions(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<Revision>, WikiError> {
        let page = self.page(title)?;
        let revisions = if page.revisions.is_empty() {
            page.history.iter().rev().take(limit).cloned().collect()
        } else {
            page.revisions.iter().take(limit).cloned().collect()
        };
        Ok(revisions)
    }

    async fn fetch_page_history(&self, title: &str, days: u32) -> Result<Vec<Revision>, WikiError> {
        let page = self.page(title)?;
        let history: Vec<Revision> = if page.history.is_empty() {
            page.revisions.iter().rev().cloned().collect()
        } else {
            page.history.clone()
        };

        let Some(captured_at) = self.snapshot.captured_at else {
            return Ok(history);
        };
        let cutoff = captured_at - ChronoDuration::days(i64::from(days));
        Ok(history
            .into_iter()
            .filter(|rev| parse_timestamp(&rev.timestamp) >= cutoff)
            .collect())
    }

    async fn fetch_page_contributors(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<ListedContributor>, WikiError> {
        Ok(self.page(title)?.contributors.iter().take(limit).cloned().collect())
    }

    async fn fetch_user_info(&self, username: &str) -> Result<UserInfo, WikiError> {
        self.user(username)?
            .info
            .clone()
            .ok_or_else(|| WikiError::NotFound(format!("user {username}")))
    }

    async fn fetch_user_contributions(
        &self,
        username: &str,
        limit: usize,
    ) -> Result<Vec<Contribution>, WikiError> {
        Ok(self.user(username)?.contributions.iter().take(limit).cloned().collect())
    }

    async fn fetch_revision(&self, title: &str, revision_id: u64) -> Result<Revision, WikiError> {
        let page = self.page(title)?;
        page.revisions
            .iter()
            .chain(page.history.iter())
            .find(|rev| rev.rev_id == revision_id)
            .cloned()
            .ok_or_else(|| WikiError::NotFound(format!("revision {revision_id} of {title}")))
    }

    fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.snapshot.captured_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_snapshot() -> Snapshot {
        let mut snapshot = Snapshot {
            language: "en".into(),
            captured_at: Some(parse_timestamp("2024-03-10T00:00:00Z")),
            ..Default::default()
        };
        let history = vec![
            Revision {
                rev_id: 1,
                timestamp: "2024-01-01T00:00:00Z".into(),
                user: "Old".into(),
                ..Default::default()
            },
            Revision {
                rev_id: 2,
                parent_id: 1,
                timestamp: "2024-03-09T00:00:00Z".into(),
                user: "New".into(),
                ..Default::default()
            },
        ];
        snapshot.pages.insert(
            "Rust".into(),
            PageSnapshot {
                info: Some(PageInfo {
                    page_id: 1,
                    title: "Rust".into(),
                    ..Default::default()
                }),
                history,
                ..Default::default()
            },
        );
        snapshot
    }

    #[tokio::test]
    async fn test_history_respects_capture_window() {
        let source = SnapshotSource::new(create_test_snapshot());
        let recent = source.fetch_page_history("Rust", 30).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].rev_id, 2);

        let newest_first = source.fetch_page_revisions("Rust", 10).await.unwrap();
        assert_eq!(newest_first[0].rev_id, 2);
    }

    #[tokio::test]
    async fn test_missing_entities_are_not_found() {
        let source = SnapshotSource::new(create_test_snapshot());
        assert!(matches!(
            source.fetch_page_info("Nope").await,
            Err(WikiError::NotFound(_))
        ));
        assert!(matches!(
            source.fetch_user_info("Nobody").await,
            Err(WikiError::NotFound(_))
        ));
    }

    #[test]
    fn test_snapshot_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let snapshot = create_test_snapshot();
        snapshot.save(&path).unwrap();
        assert_eq!(Snapshot::load(&path).unwrap(), snapshot);
    }
}
