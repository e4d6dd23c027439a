pub mod client;
pub mod config;
pub mod context;
pub mod contribution;
pub mod contributor;
pub mod cross_page;
pub mod edit_war;
pub mod error;
pub mod event;
pub mod keywords;
pub mod page;
pub mod revert;
pub mod revoked;
pub mod scoring;
pub mod support;
pub mod user;

// Re-export common types
pub use crate::client::{
    MediaWikiClient, RecordingSource, Snapshot, SnapshotSource, SourceHandle, WikiError, WikiSource,
};
pub use crate::config::{AnalysisDepth, WikiOsintConfig};
pub use crate::context::AnalysisContext;
pub use crate::contribution::{ContributionAnalyzer, ContributionProfile};
pub use crate::contributor::Contributor;
pub use crate::cross_page::{CrossPageAnalyzer, CrossPageReport};
pub use crate::edit_war::{ConflictStats, EditWarPeriod};
pub use crate::error::AnalysisError;
pub use crate::event::EditEvent;
pub use crate::keywords::{KeywordTables, RevertType};
pub use crate::page::{PageAnalyzer, PageProfile};
pub use crate::revert::RevertClassifier;
pub use crate::revoked::{DetectionMethod, RevokedContribution};
pub use crate::scoring::SuspicionScore;
pub use crate::support::{MutualSupportDetector, MutualSupportPair, SuspicionLevel};
pub use crate::user::{UserAnalyzer, UserProfile};
