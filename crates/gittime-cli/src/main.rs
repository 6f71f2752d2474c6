//! GitTime CLI
//!
//! The `gittime` command reconstructs how each feature of a public GitHub
//! repository evolved, commit by commit.
//!
//! ## Commands
//!
//! - `features`: List the features identified in a repository
//! - `evolution`: Narrate one feature's history
//! - `timeline`: Group one feature's history under releases
//!
//! `evolution` and `timeline` take the feature definition itself (JSON from
//! `features --json`, or `--name` with `--files`). Classification is not
//! repeatable, so they never reclassify and never look features up by id.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn, Level};

use gittime_core::metrics::METRICS;
use gittime_core::telemetry::init_tracing;
use gittime_core::{
    AnalysisSession, Collaborators, Feature, FeatureCandidate, FeatureEvolution, FeatureId,
    FeatureRegistry, HostingApi, PipelineConfig, RepoRef, Summarizer, VersionEntry,
};
use gittime_github::GitHubClient;
use gittime_llm::{ChatClient, ChatModel, LlmClassifier, LlmConfig, LlmSummarizer};

#[derive(Parser)]
#[command(name = "gittime")]
#[command(author = "GitTime Contributors")]
#[command(version = gittime_core::VERSION)]
#[command(about = "Feature evolution timelines for GitHub repositories", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output (and JSON-formatted log lines)
    #[arg(long, global = true)]
    json: bool,

    /// Pipeline configuration file (TOML)
    #[arg(long, global = true, env = "GITTIME_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum concurrent summaries per evolution
    #[arg(long, global = true, env = "GITTIME_MAX_CONCURRENT")]
    max_concurrent: Option<usize>,

    /// Maximum commits loaded into the history window
    #[arg(long, global = true, env = "GITTIME_MAX_COMMITS")]
    max_commits: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the features identified in a repository
    Features {
        /// Repository as owner/name or a github.com URL
        repo: String,
    },

    /// Show how one feature evolved, commit by commit
    Evolution {
        /// Repository as owner/name or a github.com URL
        repo: String,

        #[command(flatten)]
        feature: FeatureArgs,
    },

    /// Group one feature's evolution under the releases that shipped it
    Timeline {
        /// Repository as owner/name or a github.com URL
        repo: String,

        #[command(flatten)]
        feature: FeatureArgs,
    },
}

/// The feature to analyse, as produced by an earlier `gittime features`.
#[derive(Args, Debug)]
struct FeatureArgs {
    /// Feature definition as JSON (one entry of `features --json`), or @FILE
    #[arg(long, conflicts_with_all = ["name", "files", "description"], required_unless_present = "name")]
    feature: Option<String>,

    /// Feature name
    #[arg(long, requires = "files")]
    name: Option<String>,

    /// Files owned by the feature (comma-separated or repeated)
    #[arg(long, value_delimiter = ',')]
    files: Vec<String>,

    /// Feature description
    #[arg(long)]
    description: Option<String>,
}

impl FeatureArgs {
    fn to_feature(&self) -> Result<Feature> {
        let candidate = match (&self.feature, &self.name) {
            (Some(raw), _) => parse_feature_definition(raw)?,
            (None, Some(name)) => FeatureCandidate {
                name: name.clone(),
                description: self.description.clone().unwrap_or_default(),
                files: self.files.clone(),
            },
            (None, None) => bail!("Pass --feature, or --name together with --files"),
        };
        Feature::try_from(candidate).context("Invalid feature definition")
    }
}

/// Inline JSON, or `@path` to a file holding it.
fn parse_feature_definition(raw: &str) -> Result<FeatureCandidate> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read feature definition from {path}"))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("Feature definition is not valid JSON")
}

impl Commands {
    fn repo(&self) -> &str {
        match self {
            Commands::Features { repo }
            | Commands::Evolution { repo, .. }
            | Commands::Timeline { repo, .. } => repo,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let config = load_config(&cli)?;
    let repo: RepoRef = cli
        .command
        .repo()
        .parse()
        .with_context(|| format!("Invalid repository reference '{}'", cli.command.repo()))?;

    let result = match &cli.command {
        Commands::Features { .. } => {
            let collaborators = build_collaborators()?;
            let session = AnalysisSession::open(collaborators, repo, &config)
                .await
                .context("Failed to load repository history")?;
            info!(session = %session.id(), features = session.registry().len(), "session ready");
            cmd_features(&session, cli.json)
        }
        Commands::Evolution { feature, .. } => {
            let feature = feature.to_feature()?;
            let session = open_for_feature(repo, feature.clone(), &config).await?;
            cmd_evolution(&session, &feature, cli.json).await
        }
        Commands::Timeline { feature, .. } => {
            let feature = feature.to_feature()?;
            let session = open_for_feature(repo, feature.clone(), &config).await?;
            cmd_timeline(&session, &feature, cli.json).await
        }
    };

    METRICS.flush();
    result
}

/// File configuration first, then command-line overrides.
fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load pipeline configuration")?;
    if let Some(max_concurrent) = cli.max_concurrent {
        config.narrator.max_concurrent_summaries = max_concurrent.max(1);
    }
    if let Some(max_commits) = cli.max_commits {
        config.history.max_commits = max_commits;
    }
    Ok(config)
}

fn build_hosting() -> Result<Arc<dyn HostingApi>> {
    let hosting = GitHubClient::from_env().context("Failed to build GitHub client")?;
    if !hosting.is_authenticated() {
        warn!("GITHUB_TOKEN not set; using the unauthenticated rate limit");
    }
    Ok(Arc::new(hosting))
}

fn build_model() -> Result<(Arc<dyn ChatModel>, LlmConfig)> {
    let llm_config = LlmConfig::from_env();
    let model = ChatClient::new(llm_config.clone()).context("Failed to build LLM client")?;
    Ok((Arc::new(model), llm_config))
}

fn build_summarizer(model: Arc<dyn ChatModel>, config: &LlmConfig) -> Arc<dyn Summarizer> {
    Arc::new(LlmSummarizer::new(model, config.summary_max_tokens))
}

fn build_collaborators() -> Result<Collaborators> {
    let hosting = build_hosting()?;
    let (model, llm_config) = build_model()?;
    Ok(Collaborators {
        hosting,
        classifier: Arc::new(LlmClassifier::new(
            Arc::clone(&model),
            llm_config.classify_max_tokens,
        )),
        summarizer: build_summarizer(model, &llm_config),
    })
}

/// Session over one supplied feature; no classification.
async fn open_for_feature(
    repo: RepoRef,
    feature: Feature,
    config: &PipelineConfig,
) -> Result<AnalysisSession> {
    let hosting = build_hosting()?;
    let (model, llm_config) = build_model()?;
    let session = AnalysisSession::open_with_features(
        hosting,
        build_summarizer(model, &llm_config),
        repo,
        vec![feature],
        config,
    )
    .await
    .context("Failed to load repository history")?;
    info!(session = %session.id(), "session ready");
    Ok(session)
}

// ========== Commands ==========

fn cmd_features(session: &AnalysisSession, json: bool) -> Result<()> {
    let registry = session.registry();
    if json {
        println!("{}", serde_json::to_string_pretty(registry)?);
    } else {
        print!("{}", render_features(session.repo(), registry));
    }
    Ok(())
}

async fn cmd_evolution(session: &AnalysisSession, feature: &Feature, json: bool) -> Result<()> {
    let evolution = session
        .evolution(feature.id())
        .await
        .with_context(|| format!("Failed to build evolution for '{}'", feature.name()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(evolution.as_ref())?);
    } else {
        print!("{}", render_evolution(feature, &evolution));
    }
    Ok(())
}

async fn cmd_timeline(session: &AnalysisSession, feature: &Feature, json: bool) -> Result<()> {
    let versions = session
        .timeline(feature.id())
        .await
        .with_context(|| format!("Failed to build timeline for '{}'", feature.name()))?;

    if json {
        #[derive(Serialize)]
        struct TimelineOutput<'a> {
            feature_id: &'a FeatureId,
            versions: &'a [VersionEntry],
        }
        let output = TimelineOutput {
            feature_id: feature.id(),
            versions: &versions,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", render_timeline(feature, &versions));
    }
    Ok(())
}

// ========== Rendering ==========

fn render_features(repo: &RepoRef, registry: &FeatureRegistry) -> String {
    let mut out = String::new();
    if let Some(reason) = registry.failure_reason() {
        let _ = writeln!(out, "Feature classification failed for {repo}: {reason}");
        return out;
    }

    let _ = writeln!(out, "{} features in {repo}", registry.len());
    let _ = writeln!(out);
    for feature in registry.iter() {
        let _ = writeln!(out, "{}  {}", feature.id(), feature.name());
        let _ = writeln!(out, "    {}", truncate(feature.description(), 100));
        let files: Vec<&str> = feature.files().iter().map(String::as_str).collect();
        let _ = writeln!(out, "    files: {}", files.join(","));
    }
    if !registry.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Pass a feature to `gittime evolution {repo} --name <NAME> --files <FILES>`."
        );
    }
    out
}

fn render_evolution(feature: &Feature, evolution: &FeatureEvolution) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", feature.name(), feature.id());
    let _ = writeln!(out);

    if evolution.entries.is_empty() {
        let _ = writeln!(out, "No commits in the loaded history touch this feature.");
    }

    for entry in &evolution.entries {
        let _ = writeln!(
            out,
            "{} {} {}  {}",
            entry.short_id(),
            entry.date(),
            entry.commit.author,
            entry.commit.headline()
        );
        for file in &entry.diff.per_file {
            let _ = writeln!(
                out,
                "    {:<8} {} +{} -{}",
                file.status.as_str(),
                file.path,
                file.additions,
                file.deletions
            );
        }
        if entry.degraded {
            let _ = writeln!(out, "    [summary unavailable] {}", entry.narrative);
        } else {
            let _ = writeln!(out, "    {}", entry.narrative);
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(
        out,
        "{} commit(s), +{} -{}",
        evolution.commit_count(),
        evolution.total_additions,
        evolution.total_deletions
    );
    if evolution.degraded_count() > 0 {
        let _ = writeln!(
            out,
            "{} summary(ies) could not be generated",
            evolution.degraded_count()
        );
    }
    out
}

fn render_timeline(feature: &Feature, versions: &[VersionEntry]) -> String {
    let mut out = String::new();
    if versions.is_empty() {
        let _ = writeln!(out, "No versions touch feature '{}'.", feature.name());
        return out;
    }
    for version in versions {
        let _ = writeln!(
            out,
            "{} ({}) - {} commit(s)",
            version.version,
            version.date,
            version.commits.len()
        );
        let _ = writeln!(out, "    {}", version.description);
    }
    out
}

/// Truncate a string for display
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let prefix: String = s.chars().take(max_chars).collect();
        format!("{prefix}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gittime_core::{
        CommitId, CommitMeta, DiffStat, EvolutionEntry, FileStat, FileStatus, SUMMARY_UNAVAILABLE,
    };

    fn entry(sha: &str, day: u32, narrative: &str, degraded: bool) -> EvolutionEntry {
        EvolutionEntry {
            commit: CommitMeta {
                id: CommitId::new(sha),
                author: "ada".into(),
                timestamp: Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap(),
                message: format!("change {day}\n\nbody"),
            },
            diff: DiffStat {
                per_file: vec![FileStat {
                    path: "src/a.js".into(),
                    status: FileStatus::Modified,
                    additions: 10,
                    deletions: 2,
                }],
                total_additions: 10,
                total_deletions: 2,
            },
            narrative: narrative.into(),
            degraded,
        }
    }

    #[test]
    fn test_cli_parses_overrides() {
        let cli = Cli::try_parse_from([
            "gittime",
            "--max-concurrent",
            "2",
            "--max-commits",
            "50",
            "evolution",
            "acme/widgets",
            "--name",
            "CSV Export",
            "--files",
            "src/export.js,src/csv.js",
        ])
        .unwrap();
        assert_eq!(cli.max_concurrent, Some(2));
        assert_eq!(cli.command.repo(), "acme/widgets");

        let config = load_config(&cli).unwrap();
        assert_eq!(config.narrator.max_concurrent_summaries, 2);
        assert_eq!(config.history.max_commits, 50);

        let Commands::Evolution { feature, .. } = &cli.command else {
            panic!("expected evolution command");
        };
        let feature = feature.to_feature().unwrap();
        assert_eq!(feature.name(), "CSV Export");
        assert_eq!(feature.files().len(), 2);
    }

    #[test]
    fn test_feature_json_from_listing_round_trips_into_timeline() {
        let listed = Feature::new("Dark Mode", "Theme toggle", ["src/theme.ts"]).unwrap();
        let json = serde_json::to_string(&listed).unwrap();

        let cli =
            Cli::try_parse_from(["gittime", "timeline", "acme/widgets", "--feature", &json]).unwrap();
        let Commands::Timeline { feature, .. } = &cli.command else {
            panic!("expected timeline command");
        };
        assert_eq!(feature.to_feature().unwrap(), listed);
    }

    #[test]
    fn test_feature_definition_is_required_and_validated() {
        assert!(Cli::try_parse_from(["gittime", "evolution", "acme/widgets"]).is_err());
        assert!(
            Cli::try_parse_from(["gittime", "evolution", "acme/widgets", "--name", "X"]).is_err()
        );

        let cli = Cli::try_parse_from([
            "gittime",
            "evolution",
            "acme/widgets",
            "--feature",
            r#"{"name": "Empty", "files": []}"#,
        ])
        .unwrap();
        let Commands::Evolution { feature, .. } = &cli.command else {
            panic!("expected evolution command");
        };
        assert!(feature.to_feature().is_err());
    }

    #[test]
    fn test_render_evolution_marks_degraded_entries() {
        let feature = Feature::new("CSV Export", "Exports rows", ["src/a.js"]).unwrap();
        let evolution = FeatureEvolution::new(
            feature.id().clone(),
            vec![
                entry("1111111aaaa", 1, "Added the exporter.", false),
                entry("3333333cccc", 3, SUMMARY_UNAVAILABLE, true),
            ],
        );

        let text = render_evolution(&feature, &evolution);
        assert!(text.contains("1111111 2024-01-01 ada  change 1"));
        assert!(text.contains("modified src/a.js +10 -2"));
        assert!(text.contains("    Added the exporter."));
        assert!(text.contains("[summary unavailable]"));
        assert!(text.contains("2 commit(s), +20 -4"));
        assert!(text.contains("1 summary(ies) could not be generated"));
    }

    #[test]
    fn test_render_features_reports_classification_failure() {
        let registry = FeatureRegistry::failed("model unavailable");
        let text = render_features(&RepoRef::new("acme", "widgets"), &registry);
        assert_eq!(
            text,
            "Feature classification failed for acme/widgets: model unavailable\n"
        );
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
        assert_eq!(truncate("short", 10), "short");
    }
}
