use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;
use wikiosint_core::client::{
    Contribution, PageInfo, PageSnapshot, Revision, UserInfo, UserSnapshot,
};
use wikiosint_core::{
    AnalysisContext, AnalysisError, ContributionAnalyzer, CrossPageAnalyzer, PageAnalyzer,
    RecordingSource, Snapshot, SnapshotSource, SourceHandle, UserAnalyzer, WikiOsintConfig,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn revision(rev_id: u64, parent_id: u64, user: &str, ts: &str, size: i64, comment: &str) -> Revision {
    Revision {
        rev_id,
        parent_id,
        user: user.into(),
        user_id: 1,
        timestamp: ts.into(),
        size,
        comment: comment.into(),
        ..Default::default()
    }
}

fn contribution(rev: &Revision, page_id: u64, title: &str, size_diff: i64) -> Contribution {
    Contribution {
        rev_id: rev.rev_id,
        parent_id: rev.parent_id,
        page_id,
        namespace: 0,
        title: title.into(),
        user: rev.user.clone(),
        timestamp: rev.timestamp.clone(),
        comment: rev.comment.clone(),
        size: rev.size,
        size_diff,
        ..Default::default()
    }
}

fn page(title: &str, id: u64, revisions: Vec<Revision>) -> PageSnapshot {
    PageSnapshot {
        info: Some(PageInfo {
            page_id: id,
            title: title.into(),
            length: revisions.first().map(|r| r.size).unwrap_or(0),
            ..Default::default()
        }),
        revisions,
        ..Default::default()
    }
}

/// Critic trims two pages; Guard and Friend take turns restoring the text
/// within minutes.
fn create_test_snapshot() -> Snapshot {
    let alpha = vec![
        revision(14, 13, "Friend", "2024-05-30T10:20:00Z", 1000, "rv"),
        revision(13, 12, "Critic", "2024-05-30T10:15:00Z", 700, "remove puffery"),
        revision(12, 11, "Guard", "2024-05-30T10:05:00Z", 1000, "Reverted edits by Critic"),
        revision(11, 10, "Critic", "2024-05-30T10:00:00Z", 600, "trim"),
        revision(10, 0, "Friend", "2024-05-29T09:00:00Z", 1000, "create"),
    ];
    let beta = vec![
        revision(24, 23, "Guard", "2024-05-31T08:04:00Z", 2000, "undo"),
        revision(23, 22, "Critic", "2024-05-31T08:00:00Z", 1500, "npov"),
        revision(22, 21, "Friend", "2024-05-31T07:55:00Z", 2000, "rv"),
        revision(21, 20, "Critic", "2024-05-31T07:50:00Z", 1400, "trim"),
        revision(20, 0, "Guard", "2024-05-20T09:00:00Z", 2000, "create"),
    ];

    let critic_contributions = vec![
        contribution(&beta[1], 2, "Beta", -500),
        contribution(&beta[3], 2, "Beta", -600),
        contribution(&alpha[1], 1, "Alpha", -300),
        contribution(&alpha[3], 1, "Alpha", -400),
    ];

    let mut snapshot = Snapshot {
        language: "en".into(),
        captured_at: Some(now()),
        ..Default::default()
    };
    snapshot.pages.insert("Alpha".into(), page("Alpha", 1, alpha));
    snapshot.pages.insert("Beta".into(), page("Beta", 2, beta));
    snapshot.users.insert(
        "Critic".into(),
        UserSnapshot {
            info: Some(UserInfo {
                user_id: 42,
                name: "Critic".into(),
                registration: Some("2024-05-25T00:00:00Z".into()),
                edit_count: 4,
                ..Default::default()
            }),
            contributions: critic_contributions,
        },
    );
    snapshot
}

fn source() -> SourceHandle {
    Arc::new(SnapshotSource::new(create_test_snapshot()))
}

fn ctx() -> AnalysisContext {
    AnalysisContext::with_defaults("en", now())
}

#[tokio::test]
async fn test_user_revocations_are_attributed() {
    let analyzer = UserAnalyzer::from_config(source(), ctx(), &WikiOsintConfig::default());
    let profile = analyzer.analyze("Critic").await.unwrap();

    assert_eq!(profile.username, "Critic");
    assert_eq!(profile.account_age_days(), Some(7));
    assert_eq!(profile.top_pages.len(), 2);
    assert_eq!(profile.revoked_count, 4);
    assert!((profile.revoked_ratio - 1.0).abs() < 1e-9);
    assert_eq!(profile.reverted_by_users.get("Guard"), Some(&2));
    assert_eq!(profile.reverted_by_users.get("Friend"), Some(&2));
    assert!((0..=100).contains(&profile.suspicion_score));
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let analyzer = UserAnalyzer::from_config(source(), ctx(), &WikiOsintConfig::default());
    let err = analyzer.analyze("Nobody").await.unwrap_err();
    assert!(matches!(err, AnalysisError::NotFound { kind: "user", .. }));
}

#[tokio::test]
async fn test_page_profile_counts_conflicts() {
    let analyzer = PageAnalyzer::from_config(source(), ctx(), &WikiOsintConfig::default());
    let profile = analyzer.analyze("Alpha").await.unwrap();

    assert_eq!(profile.title, "Alpha");
    assert_eq!(profile.total_revisions, 5);
    assert_eq!(profile.contributors.len(), 3);
    assert!(profile.conflict_stats.reversions_count >= 1);
    assert!((0..=100).contains(&profile.suspicion_score));

    let critic = profile
        .contributors
        .iter()
        .find(|c| c.username == "Critic")
        .unwrap();
    assert_eq!(critic.edit_count, 2);
    assert_eq!(critic.revoked_contributions.len(), 4);
}

#[tokio::test]
async fn test_contribution_scan() {
    let analyzer = ContributionAnalyzer::from_config(source(), ctx(), &WikiOsintConfig::default());

    let profile = analyzer.analyze(11, "Alpha").await.unwrap();
    assert_eq!(profile.author.username, "Critic");
    assert_eq!(profile.size_delta, -400);
    assert!(profile.author.analysis_error.is_none());

    let recent = analyzer.scan_recent("Alpha", 5).await.unwrap();
    assert_eq!(recent.len(), 5);

    let flagged = analyzer.suspicious("Alpha", 5, 0).await.unwrap();
    assert_eq!(flagged.len(), 5);
    assert!(flagged.windows(2).all(|w| w[0].suspicion_score >= w[1].suspicion_score));

    let err = analyzer.analyze(999, "Alpha").await.unwrap_err();
    assert!(matches!(err, AnalysisError::NotFound { kind: "revision", .. }));
}

#[tokio::test]
async fn test_cross_page_finds_support_pair() {
    let analyzer = CrossPageAnalyzer::new(source(), ctx(), &WikiOsintConfig::default());
    let report = analyzer
        .analyze(&["Alpha".to_string(), "Beta".to_string()])
        .await
        .unwrap();

    assert_eq!(report.total_pages, 2);
    assert!(report
        .coordinated_patterns
        .mutual_support_pairs
        .iter()
        .any(|p| p.involves("Guard") && p.involves("Friend")));
    assert!(report.profile("Beta").is_some());
}

#[tokio::test]
async fn test_recorded_snapshot_replays_identically() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("capture.json");

    let recorder = Arc::new(RecordingSource::new(source()));
    let live = PageAnalyzer::from_config(recorder.clone(), ctx(), &WikiOsintConfig::default())
        .analyze("Beta")
        .await
        .unwrap();
    recorder.snapshot("en", now()).save(&path).unwrap();

    let replayed_source: SourceHandle = Arc::new(SnapshotSource::new(Snapshot::load(&path).unwrap()));
    let replayed = PageAnalyzer::from_config(replayed_source, ctx(), &WikiOsintConfig::default())
        .analyze("Beta")
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_string(&live).unwrap(),
        serde_json::to_string(&replayed).unwrap()
    );
}
