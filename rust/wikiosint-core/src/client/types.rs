use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum WikiError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl WikiError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            WikiError::Network(_) => true,
            WikiError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A page revision as returned by the history endpoints.
///
/// Timestamps stay raw here; parsing happens in the event model so a bad
/// value degrades the event instead of failing the fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Revision {
    pub rev_id: u64,
    pub parent_id: u64,
    pub user: String,
    pub user_id: u64,
    pub timestamp: String,
    /// Page length in bytes after this revision.
    pub size: i64,
    pub comment: String,
    pub minor: bool,
    pub anonymous: bool,
    pub tags: Vec<String>,
}

/// One entry of a user's contribution list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contribution {
    pub rev_id: u64,
    pub parent_id: u64,
    pub page_id: u64,
    pub namespace: i32,
    pub title: String,
    pub user: String,
    pub timestamp: String,
    pub comment: String,
    pub size: i64,
    pub size_diff: i64,
    pub minor: bool,
    /// Still the latest revision of the page.
    pub top: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    pub user_id: u64,
    pub name: String,
    pub registration: Option<String>,
    pub edit_count: u64,
    pub groups: Vec<String>,
    pub implicit_groups: Vec<String>,
    pub rights: Vec<String>,
    pub block_expiry: Option<String>,
    pub block_reason: Option<String>,
    pub blocked_by: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageInfo {
    pub page_id: u64,
    pub namespace: i32,
    pub title: String,
    pub touched: Option<String>,
    pub last_rev_id: u64,
    pub length: i64,
}

/// Registered contributor entry from the page contributor listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListedContributor {
    pub user_id: u64,
    pub name: String,
}
