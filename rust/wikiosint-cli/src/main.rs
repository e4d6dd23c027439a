mod report;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use report::{render, OutputFormat};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wikiosint_core::{
    AnalysisContext, AnalysisDepth, ContributionAnalyzer, CrossPageAnalyzer, MediaWikiClient,
    PageAnalyzer, RecordingSource, Snapshot, SnapshotSource, SourceHandle, UserAnalyzer,
    WikiOsintConfig,
};

const CONFIG_ENV: &str = "WIKIOSINT_CONFIG";

#[derive(Parser)]
#[command(author, version, about = "Manipulation-risk analysis of wiki edit histories", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.wikiosint/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Wiki language edition, e.g. en, fr, de
    #[arg(short, long, global = true)]
    lang: Option<String>,

    /// Replay a captured snapshot instead of querying the live wiki
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Capture every live response into a snapshot file
    #[arg(long, global = true, conflicts_with = "snapshot")]
    record: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Also write the rendered report to this file
    #[arg(long, global = true)]
    save: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an account's history and revoked contributions
    User {
        name: String,
        #[arg(long)]
        max_contributions: Option<usize>,
        /// Inspect page histories for silently reverted edits
        #[arg(long)]
        deep: bool,
        #[arg(long)]
        max_pages: Option<usize>,
        #[arg(long)]
        recent_days: Option<u32>,
        /// Skip revoked-contribution detection
        #[arg(long)]
        no_revoked: bool,
    },
    /// Analyze one page: contributors, conflicts, quality
    Page {
        title: String,
        #[arg(long)]
        max_revisions: Option<usize>,
        #[arg(long)]
        max_contributors: Option<usize>,
        /// History window in days
        #[arg(long)]
        days: Option<u32>,
    },
    /// Look for coordinated editing across several pages
    Pages {
        #[arg(num_args = 2.., required = true)]
        titles: Vec<String>,
        #[arg(long)]
        max_revisions: Option<usize>,
        #[arg(long)]
        max_contributors: Option<usize>,
        /// History window in days
        #[arg(long)]
        max_history: Option<u32>,
        #[arg(long)]
        min_common_edits: Option<usize>,
        /// Maximum reaction time in minutes for a support event
        #[arg(long)]
        max_reaction_time: Option<i64>,
        #[arg(long)]
        min_support_ratio: Option<f64>,
        #[arg(long)]
        enable_deep_analysis: bool,
        /// Pages analyzed concurrently
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        workers: Option<u64>,
    },
    /// Analyze individual revisions
    Contribution {
        #[command(subcommand)]
        action: ContributionCommands,
    },
    /// Show the effective configuration
    Config {
        /// Write the defaults to the configuration file
        #[arg(long)]
        init: bool,
    },
}

#[derive(Subcommand)]
enum ContributionCommands {
    /// Analyze one revision
    Analyze {
        revid: u64,
        page: String,
        /// basic, standard or deep
        #[arg(long, value_parser = parse_depth)]
        depth: Option<AnalysisDepth>,
    },
    /// Analyze the most recent revisions of a page
    Recent {
        page: String,
        #[arg(long, value_parser = clap::value_parser!(u64).range(5..=50))]
        limit: Option<u64>,
    },
    /// List recent revisions at or above a score threshold
    Suspicious {
        page: String,
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(i32).range(0..=100))]
        threshold: i32,
        #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u64).range(1..=100))]
        limit: u64,
    },
}

fn parse_depth(raw: &str) -> Result<AnalysisDepth, String> {
    raw.parse()
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(".wikiosint").join("config.json"))
}

/// Data source and clock shared by one command run.
struct Session {
    source: SourceHandle,
    recorder: Option<(Arc<RecordingSource>, PathBuf)>,
    language: String,
    now: DateTime<Utc>,
}

impl Session {
    fn open(cli: &Cli, config: &WikiOsintConfig) -> Result<Self> {
        if let Some(path) = &cli.snapshot {
            let snapshot = Snapshot::load(path)
                .with_context(|| format!("failed to load snapshot {}", path.display()))?;
            let now = snapshot.captured_at.unwrap_or_else(Utc::now);
            let language = cli.lang.clone().unwrap_or_else(|| snapshot.language.clone());
            log::info!("replaying snapshot {} ({} pages, {} users)", path.display(), snapshot.pages.len(), snapshot.users.len());
            return Ok(Self {
                source: Arc::new(SnapshotSource::new(snapshot)),
                recorder: None,
                language,
                now,
            });
        }

        let language = cli.lang.clone().unwrap_or_else(|| config.language.clone());
        let client: SourceHandle = Arc::new(MediaWikiClient::new(&language, config.http.clone())?);
        let (source, recorder) = match &cli.record {
            Some(path) => {
                let recorder = Arc::new(RecordingSource::new(client));
                let source: SourceHandle = recorder.clone();
                (source, Some((recorder, path.clone())))
            }
            None => (client, None),
        };
        Ok(Self {
            source,
            recorder,
            language,
            now: Utc::now(),
        })
    }

    fn context(&self, config: &WikiOsintConfig) -> AnalysisContext {
        AnalysisContext::new(self.language.clone(), config.keywords.clone(), self.now)
    }

    fn finish(&self) -> Result<()> {
        if let Some((recorder, path)) = &self.recorder {
            recorder
                .snapshot(&self.language, self.now)
                .save(path)
                .with_context(|| format!("failed to write snapshot {}", path.display()))?;
            log::info!("snapshot written to {}", path.display());
        }
        Ok(())
    }
}

fn emit(output: &str, save: Option<&Path>) -> Result<()> {
    print!("{output}");
    if let Some(path) = save {
        fs::write(path, output).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let path = config_path(cli.config.as_deref())?;
    let mut config = WikiOsintConfig::load_or_default(&path)?;

    if let Commands::Config { init } = &cli.command {
        if *init {
            config.persist(&path)?;
            eprintln!("Wrote configuration to {}", path.display());
        }
        let mut raw = serde_json::to_string_pretty(&config)?;
        raw.push('\n');
        return emit(&raw, cli.save.as_deref());
    }

    apply_overrides(&cli.command, &mut config);
    config.validate()?;

    let session = Session::open(&cli, &config)?;
    let ctx = session.context(&config);
    let source = session.source.clone();

    let output = match &cli.command {
        Commands::User { name, .. } => {
            let profile = UserAnalyzer::from_config(source, ctx, &config).analyze(name).await?;
            render(&profile, cli.format)?
        }
        Commands::Page { title, .. } => {
            let profile = PageAnalyzer::from_config(source, ctx, &config).analyze(title).await?;
            render(&profile, cli.format)?
        }
        Commands::Pages { titles, .. } => {
            let report = CrossPageAnalyzer::new(source, ctx, &config).analyze(titles).await?;
            render(&report, cli.format)?
        }
        Commands::Contribution { action } => {
            let analyzer = ContributionAnalyzer::from_config(source, ctx, &config);
            match action {
                ContributionCommands::Analyze { revid, page, depth } => {
                    let analyzer = match depth {
                        Some(depth) => analyzer.with_depth(*depth),
                        None => analyzer,
                    };
                    render(&analyzer.analyze(*revid, page).await?, cli.format)?
                }
                ContributionCommands::Recent { page, limit } => {
                    let limit = limit.map(|l| l as usize).unwrap_or(config.contribution.scan_limit);
                    render(&analyzer.scan_recent(page, limit).await?, cli.format)?
                }
                ContributionCommands::Suspicious { page, threshold, limit } => {
                    render(&analyzer.suspicious(page, *limit as usize, *threshold).await?, cli.format)?
                }
            }
        }
        Commands::Config { .. } => unreachable!("handled above"),
    };

    session.finish()?;
    emit(&output, cli.save.as_deref())
}

/// Folds command-line options into the loaded configuration.
fn apply_overrides(command: &Commands, config: &mut WikiOsintConfig) {
    match command {
        Commands::User {
            max_contributions,
            deep,
            max_pages,
            recent_days,
            no_revoked,
            ..
        } => {
            if let Some(n) = max_contributions {
                config.user.max_contributions = *n;
            }
            if let Some(n) = max_pages {
                config.revoked.max_pages_to_analyze = *n;
            }
            if let Some(days) = recent_days {
                config.revoked.recent_days_only = *days;
            }
            if *deep {
                config.revoked.enable_deep_analysis = true;
            }
            if *no_revoked {
                config.revoked.enabled = false;
            }
        }
        Commands::Page {
            max_revisions,
            max_contributors,
            days,
            ..
        } => {
            if let Some(n) = max_revisions {
                config.page.max_revisions = *n;
            }
            if let Some(n) = max_contributors {
                config.page.max_contributors = *n;
            }
            if let Some(days) = days {
                config.page.history_days = *days;
            }
        }
        Commands::Pages {
            max_revisions,
            max_contributors,
            max_history,
            min_common_edits,
            max_reaction_time,
            min_support_ratio,
            enable_deep_analysis,
            workers,
            ..
        } => {
            let cross = &mut config.cross_page;
            if let Some(n) = max_revisions {
                cross.max_revisions_per_page = *n;
            }
            if let Some(n) = max_contributors {
                cross.max_contributors_per_page = *n;
            }
            if let Some(days) = max_history {
                cross.history_days = *days;
            }
            if let Some(n) = min_common_edits {
                cross.min_common_edits = *n;
            }
            if let Some(minutes) = max_reaction_time {
                cross.max_reaction_time_minutes = *minutes;
            }
            if let Some(ratio) = min_support_ratio {
                cross.min_mutual_support_ratio = *ratio;
            }
            if *enable_deep_analysis {
                cross.enable_deep_analysis = true;
            }
            if let Some(n) = workers {
                cross.max_concurrent_pages = *n as usize;
            }
        }
        Commands::Contribution { .. } | Commands::Config { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_pages_needs_two_titles() {
        assert!(Cli::try_parse_from(["wikiosint", "pages", "Alpha"]).is_err());
        assert!(Cli::try_parse_from(["wikiosint", "pages", "Alpha", "Beta"]).is_ok());
    }

    #[test]
    fn test_limits_are_range_checked() {
        assert!(Cli::try_parse_from(["wikiosint", "contribution", "recent", "P", "--limit", "4"]).is_err());
        assert!(Cli::try_parse_from(["wikiosint", "contribution", "suspicious", "P", "--threshold", "101"]).is_err());
        assert!(Cli::try_parse_from(["wikiosint", "pages", "A", "B", "--workers", "0"]).is_err());
    }

    #[test]
    fn test_record_conflicts_with_snapshot() {
        let parsed = Cli::try_parse_from(["wikiosint", "--snapshot", "a.json", "--record", "b.json", "page", "P"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::try_parse_from([
            "wikiosint", "pages", "A", "B", "--min-common-edits", "5", "--workers", "2", "--enable-deep-analysis",
        ])
        .unwrap();
        let mut config = WikiOsintConfig::default();
        apply_overrides(&cli.command, &mut config);
        assert_eq!(config.cross_page.min_common_edits, 5);
        assert_eq!(config.cross_page.max_concurrent_pages, 2);
        assert!(config.cross_page.enable_deep_analysis);

        let cli = Cli::try_parse_from(["wikiosint", "user", "Alice", "--no-revoked"]).unwrap();
        let mut config = WikiOsintConfig::default();
        apply_overrides(&cli.command, &mut config);
        assert!(!config.revoked.enabled);
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let path = config_path(Some(Path::new("/tmp/custom.json"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom.json"));
    }
}
