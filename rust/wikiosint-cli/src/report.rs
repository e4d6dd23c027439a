//! Text and JSON rendering of analysis results.

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use std::fmt::{self, Write};
use wikiosint_core::contribution::ContributionProfile;
use wikiosint_core::cross_page::CrossPageReport;
use wikiosint_core::page::PageProfile;
use wikiosint_core::user::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Human-readable rendering of one result.
pub trait TextReport {
    fn write_text(&self, out: &mut String) -> fmt::Result;
}

pub fn render<T: Serialize + TextReport>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(value)?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::Text => {
            let mut out = String::new();
            value.write_text(&mut out)?;
            Ok(out)
        }
    }
}

fn banner(out: &mut String, title: &str) -> fmt::Result {
    if !out.is_empty() {
        writeln!(out)?;
    }
    writeln!(out, "=== {title} ===")
}

fn write_score(out: &mut String, score: i32, flags: &[String]) -> fmt::Result {
    if score < 0 {
        writeln!(out, "Suspicion score: unavailable")?;
    } else {
        writeln!(out, "Suspicion score: {score}/100")?;
    }
    if flags.is_empty() {
        writeln!(out, "Flags: none")
    } else {
        writeln!(out, "Flags: {}", flags.join(", "))
    }
}

fn or_unknown<T: fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "unknown".to_string())
}

impl TextReport for UserProfile {
    fn write_text(&self, out: &mut String) -> fmt::Result {
        banner(out, &format!("User: {}", self.username))?;
        writeln!(out, "User ID: {}", self.user_id)?;
        writeln!(out, "Registered: {}", or_unknown(self.registration.map(|r| r.format("%Y-%m-%d"))))?;
        writeln!(out, "Account age: {} days", or_unknown(self.account_age_days()))?;
        writeln!(out, "Edit count: {}", self.edit_count)?;
        if !self.groups.is_empty() {
            writeln!(out, "Groups: {}", self.groups.join(", "))?;
        }
        if self.block.blocked {
            let until = self
                .block
                .expires
                .map(|e| e.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "indefinite".to_string());
            writeln!(
                out,
                "Blocked: yes (by {}, until {until})",
                self.block.blocked_by.as_deref().unwrap_or("unknown")
            )?;
            if let Some(reason) = &self.block.reason {
                writeln!(out, "Block reason: {reason}")?;
            }
        } else {
            writeln!(out, "Blocked: no")?;
        }

        banner(out, "Activity")?;
        writeln!(out, "Average edits/day: {:.2}", self.activity.average_edits_per_day)?;
        writeln!(out, "Most active hour: {}", or_unknown(self.activity.most_active_hour.map(|h| format!("{h:02}:00 UTC"))))?;
        writeln!(out, "Most active day: {}", or_unknown(self.activity.most_active_day.as_deref()))?;
        for (namespace, count) in &self.activity.namespace_distribution {
            writeln!(out, "  {namespace:<16} {count}")?;
        }

        if !self.top_pages.is_empty() {
            banner(out, "Top Pages")?;
            for page in &self.top_pages {
                writeln!(out, "  {:>5}  {}", page.edit_count, page.page_title)?;
            }
        }

        banner(out, "Revoked Contributions")?;
        writeln!(out, "Revoked: {} ({:.1}%)", self.revoked_count, self.revoked_ratio * 100.0)?;
        if !self.reverted_by_users.is_empty() {
            let by: Vec<String> = self
                .reverted_by_users
                .iter()
                .map(|(user, count)| format!("{user} ({count})"))
                .collect();
            writeln!(out, "Reverted by: {}", by.join(", "))?;
        }
        for revoked in &self.revoked_contributions {
            writeln!(
                out,
                "  r{} on {}: {} by {} [{}]",
                revoked.original.revision_id,
                revoked.original.page_title,
                revoked.revert_type,
                revoked.revoked_by.as_deref().unwrap_or("unknown"),
                revoked.detection
            )?;
        }

        banner(out, "Suspicion")?;
        write_score(out, self.suspicion_score, &self.suspicion_flags)
    }
}

impl TextReport for PageProfile {
    fn write_text(&self, out: &mut String) -> fmt::Result {
        banner(out, &format!("Page: {}", self.title))?;
        writeln!(out, "Page ID: {}", self.page_id)?;
        writeln!(out, "Size: {} bytes", self.page_size)?;
        writeln!(out, "Revisions analyzed: {}", self.total_revisions)?;
        writeln!(out, "Last modified: {}", or_unknown(self.last_modified.map(|t| t.format("%Y-%m-%d %H:%M UTC"))))?;

        banner(out, "Contributors")?;
        for contributor in &self.contributors {
            let score = if contributor.suspicion_score < 0 {
                "n/a".to_string()
            } else {
                contributor.suspicion_score.to_string()
            };
            writeln!(
                out,
                "  {:<24} {:>5} edits  {:>+8} bytes  score {:>3}  {}",
                contributor.username,
                contributor.edit_count,
                contributor.total_size_delta,
                score,
                contributor.suspicion_flags.join(",")
            )?;
        }

        let conflicts = &self.conflict_stats;
        banner(out, "Conflicts")?;
        writeln!(out, "Reverts: {}", conflicts.reversions_count)?;
        writeln!(out, "Controversy: {:.2}", conflicts.controversy_score)?;
        writeln!(out, "Recent conflicts (7 days): {}", conflicts.recent_conflicts)?;
        writeln!(out, "Edit-war periods: {}", conflicts.edit_war_periods.len())?;
        for period in &conflicts.edit_war_periods {
            let participants: Vec<&str> = period.participants.iter().map(String::as_str).collect();
            writeln!(
                out,
                "  {} - {}  {} revisions  {}",
                period.start_time.format("%Y-%m-%d %H:%M"),
                period.end_time.format("%Y-%m-%d %H:%M"),
                period.revision_count,
                participants.join(", ")
            )?;
        }

        let quality = &self.quality_metrics;
        banner(out, "Quality")?;
        writeln!(out, "Average edit size: {:.1}", quality.average_edit_size)?;
        writeln!(out, "Anonymous edits: {:.1}%", quality.anonymous_edit_ratio * 100.0)?;
        writeln!(out, "New editors: {:.1}%", quality.new_editor_ratio * 100.0)?;
        writeln!(out, "Contributor diversity: {:.2}", quality.contributor_diversity)?;
        writeln!(
            out,
            "Edits in last 7/30/90 days: {}/{}/{}",
            quality.edit_frequency.edits_last_7_days,
            quality.edit_frequency.edits_last_30_days,
            quality.edit_frequency.edits_last_90_days
        )?;

        banner(out, "Suspicion")?;
        write_score(out, self.suspicion_score, &self.suspicion_flags)
    }
}

impl TextReport for CrossPageReport {
    fn write_text(&self, out: &mut String) -> fmt::Result {
        banner(out, "Cross-Page Analysis")?;
        writeln!(out, "Pages analyzed: {}/{}", self.total_pages, self.pages.len())?;
        for failed in &self.failed_pages {
            writeln!(out, "  failed: {} ({})", failed.title, failed.error)?;
        }
        writeln!(out, "Contributors: {} ({} common)", self.total_contributors, self.common_contributors.len())?;

        if !self.common_contributors.is_empty() {
            banner(out, "Common Contributors")?;
            for contributor in &self.common_contributors {
                writeln!(
                    out,
                    "  {:<24} {:>5} edits on {}",
                    contributor.username,
                    contributor.total_edits,
                    contributor.pages_edited.join(", ")
                )?;
            }
        }

        let patterns = &self.coordinated_patterns;
        banner(out, "Mutual Support")?;
        if patterns.mutual_support_pairs.is_empty() {
            writeln!(out, "No mutual support detected")?;
        }
        for pair in &patterns.mutual_support_pairs {
            writeln!(out, "  {} <-> {}  [{}]", pair.user_a, pair.user_b, pair.suspicion_level)?;
            writeln!(
                out,
                "    events {}  ratio {:.2}  reaction {} min  reciprocity {:.2}  exclusivity {:.2}",
                pair.support_events.len(),
                pair.mutual_support_ratio,
                pair.average_reaction_time,
                pair.reciprocity_score,
                pair.exclusivity_ratio
            )?;
            writeln!(out, "    pages: {}", pair.pages_involved.join(", "))?;
        }
        writeln!(out, "Coordination score: {:.0}", patterns.coordination_score)?;

        let wars: usize = self.edit_war_periods.values().map(Vec::len).sum();
        if wars > 0 {
            banner(out, "Edit Wars")?;
            for (page, periods) in self.edit_war_periods.iter().filter(|(_, p)| !p.is_empty()) {
                writeln!(out, "  {page}: {} periods", periods.len())?;
            }
        }

        if !self.revoked_contributions.is_empty() {
            banner(out, "Revoked Contributions")?;
            for (user, revoked) in &self.revoked_contributions {
                writeln!(out, "  {user}: {}", revoked.len())?;
            }
        }

        banner(out, "Suspicion")?;
        write_score(out, self.suspicion_score, &self.suspicion_flags)
    }
}

impl TextReport for ContributionProfile {
    fn write_text(&self, out: &mut String) -> fmt::Result {
        banner(out, &format!("Revision {} on {}", self.revision_id, self.page_title))?;
        writeln!(out, "Time: {}", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(out, "Author: {}{}", self.author.username, if self.author.is_anonymous { " (anonymous)" } else { "" })?;
        if let Some(error) = &self.author.analysis_error {
            writeln!(out, "Author analysis: {error}")?;
        }
        writeln!(out, "Size change: {:+}", self.size_delta)?;
        writeln!(out, "Comment: {}", self.comment)?;
        writeln!(out, "Revert: {}", if self.is_revert { "yes" } else { "no" })?;

        if let Some(content) = &self.content {
            writeln!(out, "Content type: {}", content.content_type)?;
            if !content.language.pov_words.is_empty() {
                writeln!(out, "POV words: {}", content.language.pov_words.join(", "))?;
            }
        }
        if let Some(context) = &self.context {
            writeln!(
                out,
                "Context: {} related edits, {} nearby reverts{}",
                context.related_edits.len(),
                context.nearby_reverts,
                if context.is_contested { ", contested" } else { "" }
            )?;
            writeln!(out, "Page controversiality: {:.2}", context.controversiality)?;
        }
        let focus = &self.author.page_focus;
        if focus.pages_edited > 0 {
            writeln!(
                out,
                "Author focus: {} pages, top page {:.0}%{}",
                focus.pages_edited,
                focus.top_page_edit_ratio * 100.0,
                if focus.is_specialized_editor { ", specialized" } else { "" }
            )?;
        }
        let compliance = &self.quality.compliance;
        writeln!(
            out,
            "Quality: {:.2} overall, policy {:.2}, vandalism risk {:.2}",
            self.quality.overall_quality, compliance.policy_compliance, compliance.vandalism_risk
        )?;
        if !compliance.violated_policies.is_empty() {
            writeln!(out, "Violated policies: {}", compliance.violated_policies.join(", "))?;
        }
        write_score(out, self.suspicion_score, &self.suspicion_flags)
    }
}

impl TextReport for Vec<ContributionProfile> {
    fn write_text(&self, out: &mut String) -> fmt::Result {
        if self.is_empty() {
            return writeln!(out, "No matching revisions");
        }
        banner(out, &format!("{} revisions", self.len()))?;
        for profile in self {
            writeln!(
                out,
                "  r{:<12} {:>3}/100  {:<24} {:>+7}  {}",
                profile.revision_id,
                profile.suspicion_score,
                profile.author.username,
                profile.size_delta,
                profile.suspicion_flags.join(",")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        score: i32,
    }

    impl TextReport for Sample {
        fn write_text(&self, out: &mut String) -> fmt::Result {
            banner(out, "Sample")?;
            write_score(out, self.score, &["A".to_string(), "B".to_string()])
        }
    }

    #[test]
    fn test_text_rendering() {
        let text = render(&Sample { score: 40 }, OutputFormat::Text).unwrap();
        assert_eq!(text, "=== Sample ===\nSuspicion score: 40/100\nFlags: A, B\n");

        let text = render(&Sample { score: -1 }, OutputFormat::Text).unwrap();
        assert!(text.contains("unavailable"));
    }

    #[test]
    fn test_json_rendering() {
        let json = render(&Sample { score: 40 }, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["score"], 40);
    }
}
