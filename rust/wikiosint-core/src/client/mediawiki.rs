use super::{
    Contribution, ListedContributor, PageInfo, Revision, UserInfo, WikiError, WikiSource,
};
use crate::config::HttpConfig;
use crate::event::TIMESTAMP_FORMAT;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Upper bound the API accepts for a single list request.
const MAX_BATCH: usize = 500;

/// MediaWiki action API client for one language edition.
pub struct MediaWikiClient {
    endpoint: String,
    client: reqwest::Client,
    config: HttpConfig,
}

impl MediaWikiClient {
    pub fn new(language: &str, config: HttpConfig) -> Result<Self, WikiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| WikiError::Network(e.to_string()))?;

        Ok(Self {
            endpoint: format!("https://{language}.wikipedia.org/w/api.php"),
            client,
            config,
        })
    }

    /// Points the client at another `api.php`, e.g. a mirror or a local wiki.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn retry_wait(&self, attempt: u32) -> Duration {
        let min = self.config.retry_wait_min_ms;
        let max = self.config.retry_wait_max_ms.max(min);
        let wait = min.saturating_mul(u64::from(attempt) + 1).min(max);
        Duration::from_millis(wait)
    }

    async fn query<T: DeserializeOwned>(&self, params: &[(&str, String)]) -> Result<T, WikiError> {
        let mut attempt = 0;
        loop {
            match self.query_once(params).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let wait = self.retry_wait(attempt);
                    log::debug!(
                        "Request to {} failed ({e}), retrying in {}ms",
                        self.endpoint,
                        wait.as_millis()
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn query_once<T: DeserializeOwned>(
        &self,
        params: &[(&str, String)],
    ) -> Result<T, WikiError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("action", "query"), ("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()
            .await
            .map_err(|e| WikiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WikiError::Status {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| WikiError::Decode(e.to_string()))?;

        if let Some(err) = body.error {
            return Err(WikiError::Decode(format!("{}: {}", err.code, err.info)));
        }
        body.query
            .ok_or_else(|| WikiError::Decode("response has no query block".into()))
    }

    async fn single_page(&self, title: &str, params: &[(&str, String)]) -> Result<ApiPage, WikiError> {
        let query: PagesQuery = self.query(params).await?;
        query
            .pages
            .into_iter()
            .next()
            .filter(|page| !page.missing && !page.invalid)
            .ok_or_else(|| WikiError::NotFound(format!("page {title}")))
    }
}

#[async_trait]
impl WikiSource for MediaWikiClient {
    fn name(&self) -> &str {
        "mediawiki"
    }

    async fn fetch_page_info(&self, title: &str) -> Result<PageInfo, WikiError> {
        let page = self
            .single_page(
                title,
                &[("prop", "info".into()), ("titles", title.to_string())],
            )
            .await?;

        Ok(PageInfo {
            page_id: page.pageid,
            namespace: page.ns,
            title: page.title,
            touched: page.touched,
            last_rev_id: page.lastrevid,
            length: page.length,
        })
    }

    async fn fetch_page_revisions(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<Revision>, WikiError> {
        let page = self
            .single_page(
                title,
                &[
                    ("prop", "revisions".into()),
                    ("titles", title.to_string()),
                    ("rvlimit", limit.clamp(1, MAX_BATCH).to_string()),
                    ("rvprop", "ids|timestamp|user|userid|size|comment|flags|tags".into()),
                ],
            )
            .await?;

        Ok(page.revisions.into_iter().map(Revision::from).collect())
    }

    async fn fetch_page_history(&self, title: &str, days: u32) -> Result<Vec<Revision>, WikiError> {
        let start = Utc::now() - ChronoDuration::days(i64::from(days));
        let page = self
            .single_page(
                title,
                &[
                    ("prop", "revisions".into()),
                    ("titles", title.to_string()),
                    ("rvlimit", MAX_BATCH.to_string()),
                    ("rvstart", start.format(TIMESTAMP_FORMAT).to_string()),
                    ("rvdir", "newer".into()),
                    ("rvprop", "ids|timestamp|user|userid|size|comment|flags|tags".into()),
                ],
            )
            .await?;

        Ok(page.revisions.into_iter().map(Revision::from).collect())
    }

    async fn fetch_page_contributors(
        &self,
        title: &str,
        limit: usize,
    ) -> Result<Vec<ListedContributor>, WikiError> {
        let page = self
            .single_page(
                title,
                &[
                    ("prop", "contributors".into()),
                    ("titles", title.to_string()),
                    ("pclimit", limit.clamp(1, MAX_BATCH).to_string()),
                    ("pcexcludegroup", "bot".into()),
                ],
            )
            .await?;

        Ok(page
            .contributors
            .into_iter()
            .map(|c| ListedContributor {
                user_id: c.userid,
                name: c.name,
            })
            .collect())
    }

    async fn fetch_user_info(&self, username: &str) -> Result<UserInfo, WikiError> {
        let query: UsersQuery = self
            .query(&[
                ("list", "users".into()),
                ("ususers", username.to_string()),
                (
                    "usprop",
                    "blockinfo|groups|implicitgroups|rights|editcount|registration".into(),
                ),
            ])
            .await?;

        let user = query
            .users
            .into_iter()
            .next()
            .filter(|u| !u.missing && !u.invalid)
            .ok_or_else(|| WikiError::NotFound(format!("user {username}")))?;

        Ok(UserInfo {
            user_id: user.userid,
            name: user.name,
            registration: user.registration,
            edit_count: user.editcount,
            groups: user.groups,
            implicit_groups: user.implicitgroups,
            rights: user.rights,
            block_expiry: user.blockexpiry,
            block_reason: user.blockreason,
            blocked_by: user.blockedby,
        })
    }

    async fn fetch_user_contributions(
        &self,
        username: &str,
        limit: usize,
    ) -> Result<Vec<Contribution>, WikiError> {
        let query: ContribsQuery = self
            .query(&[
                ("list", "usercontribs".into()),
                ("ucuser", username.to_string()),
                ("uclimit", limit.clamp(1, MAX_BATCH).to_string()),
                (
                    "ucprop",
                    "ids|title|timestamp|comment|size|sizediff|flags|tags".into(),
                ),
            ])
            .await?;

        Ok(query
            .usercontribs
            .into_iter()
            .map(|c| Contribution {
                rev_id: c.revid,
                parent_id: c.parentid,
                page_id: c.pageid,
                namespace: c.ns,
                title: c.title,
                user: c.user,
                timestamp: c.timestamp,
                comment: c.comment,
                size: c.size,
                size_diff: c.sizediff,
                minor: c.minor,
                top: c.top,
                tags: c.tags,
            })
            .collect())
    }
}

// =============================================================================
// Wire format (formatversion=2)
// =============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    query: Option<T>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct PagesQuery {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiPage {
    pageid: u64,
    ns: i32,
    title: String,
    missing: bool,
    invalid: bool,
    touched: Option<String>,
    lastrevid: u64,
    length: i64,
    revisions: Vec<ApiRevision>,
    contributors: Vec<ApiContributor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiRevision {
    revid: u64,
    parentid: u64,
    user: String,
    userid: u64,
    timestamp: String,
    size: i64,
    comment: String,
    minor: bool,
    anon: bool,
    tags: Vec<String>,
}

impl From<ApiRevision> for Revision {
    fn from(rev: ApiRevision) -> Self {
        Revision {
            rev_id: rev.revid,
            parent_id: rev.parentid,
            user: rev.user,
            user_id: rev.userid,
            timestamp: rev.timestamp,
            size: rev.size,
            comment: rev.comment,
            minor: rev.minor,
            anonymous: rev.anon,
            tags: rev.tags,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiContributor {
    userid: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct UsersQuery {
    #[serde(default)]
    users: Vec<ApiUser>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiUser {
    userid: u64,
    name: String,
    missing: bool,
    invalid: bool,
    editcount: u64,
    registration: Option<String>,
    groups: Vec<String>,
    implicitgroups: Vec<String>,
    rights: Vec<String>,
    blockedby: Option<String>,
    blockreason: Option<String>,
    blockexpiry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContribsQuery {
    #[serde(default)]
    usercontribs: Vec<ApiContrib>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiContrib {
    user: String,
    pageid: u64,
    revid: u64,
    parentid: u64,
    ns: i32,
    title: String,
    timestamp: String,
    comment: String,
    size: i64,
    sizediff: i64,
    minor: bool,
    top: bool,
    tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_revision_page() {
        let raw = r#"{
            "query": {"pages": [{
                "pageid": 42, "ns": 0, "title": "Rust",
                "revisions": [
                    {"revid": 11, "parentid": 10, "user": "Alice", "userid": 7,
                     "timestamp": "2024-03-01T10:00:00Z", "size": 1200,
                     "comment": "rv vandalism", "minor": false, "tags": ["mw-rollback"]},
                    {"revid": 10, "parentid": 9, "user": "127.0.0.1", "userid": 0,
                     "timestamp": "2024-03-01T09:55:00Z", "size": 900,
                     "comment": "", "minor": true, "anon": true}
                ]
            }]}
        }"#;
        let body: ApiResponse<PagesQuery> = serde_json::from_str(raw).unwrap();
        let page = body.query.unwrap().pages.into_iter().next().unwrap();
        let revisions: Vec<Revision> = page.revisions.into_iter().map(Revision::from).collect();

        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[0].tags, vec!["mw-rollback".to_string()]);
        assert!(revisions[1].anonymous);
        assert!(revisions[1].minor);
        assert!(revisions[1].tags.is_empty());
    }

    #[test]
    fn test_missing_user_is_flagged() {
        let raw = r#"{"query": {"users": [{"name": "Nobody", "missing": true}]}}"#;
        let body: ApiResponse<UsersQuery> = serde_json::from_str(raw).unwrap();
        let users = body.query.unwrap().users;
        assert!(users[0].missing);
    }

    #[test]
    fn test_error_body_decodes() {
        let raw = r#"{"error": {"code": "badvalue", "info": "Unrecognized value"}}"#;
        let body: ApiResponse<UsersQuery> = serde_json::from_str(raw).unwrap();
        assert!(body.query.is_none());
        assert_eq!(body.error.unwrap().code, "badvalue");
    }

    #[test]
    fn test_retry_wait_is_linear_and_capped() {
        let client = MediaWikiClient::new("en", HttpConfig::default()).unwrap();
        assert_eq!(client.retry_wait(0), Duration::from_millis(1000));
        assert_eq!(client.retry_wait(2), Duration::from_millis(3000));
        assert_eq!(client.retry_wait(10), Duration::from_millis(5000));
        assert_eq!(client.endpoint(), "https://en.wikipedia.org/w/api.php");
    }
}
