use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use covdelta::cli::{self, SourceKind, Style};
use covdelta::config::{ReportConfig, DEFAULT_FAIL_DELTA, DEFAULT_TITLE};
use covdelta::files::{ChangedFileSource, GitChangedFiles, GitHubFiles, ListFile, StdinFiles};
use covdelta::{github, summary};

/// Compare coverage summaries of a pull request against its base.
#[derive(Parser)]
#[command(name = "covdelta", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the list of changed files comes from.
#[derive(clap::Args)]
struct ChangedFilesArgs {
    /// File with one changed path per line ("-" for stdin).
    #[arg(long, conflicts_with_all = ["git_diff", "github"])]
    changed_files: Option<PathBuf>,

    /// Take changed files from `git diff --name-only <ARGS>`, e.g. "origin/main...HEAD".
    #[arg(long, conflicts_with = "github")]
    git_diff: Option<String>,

    /// Take changed files from the GitHub pull request (reads GITHUB_* env vars).
    /// Also the default source under `--comment`.
    #[arg(long)]
    github: bool,

    /// Literal prefix to strip from coverage paths before matching.
    #[arg(long)]
    strip_path_prefix: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare current coverage against base coverage for the changed files.
    Report {
        /// Coverage summary of the pull request.
        #[arg(long, default_value = "coverage/coverage-summary.json")]
        coverage: PathBuf,

        /// Coverage summary of the base branch. When missing, every file counts as new.
        #[arg(long)]
        base_coverage: Option<PathBuf>,

        #[command(flatten)]
        changed: ChangedFilesArgs,

        /// Fail when a file's coverage drops by more than this many percentage points.
        #[arg(long, default_value_t = DEFAULT_FAIL_DELTA)]
        fail_delta: f64,

        /// Report title.
        #[arg(long, default_value = DEFAULT_TITLE)]
        title: String,

        /// Extra markdown appended to the report.
        #[arg(long, default_value = "")]
        custom_message: String,

        /// Output style.
        #[arg(long, value_enum, default_value = "text")]
        style: Style,

        /// Post (or update) the markdown report as a pull request comment.
        #[arg(long)]
        comment: bool,
    },

    /// Show the path prefix that aligns coverage paths with the changed files.
    Prefix {
        /// Coverage summary to align.
        #[arg(long, default_value = "coverage/coverage-summary.json")]
        coverage: PathBuf,

        #[command(flatten)]
        changed: ChangedFilesArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            coverage,
            base_coverage,
            changed,
            fail_delta,
            title,
            custom_message,
            style,
            comment,
        } => {
            let config = ReportConfig {
                strip_path_prefix: changed.strip_path_prefix.clone(),
                fail_delta,
                title,
                custom_message,
            }
            .validated()?;
            run_report(&coverage, base_coverage.as_deref(), &changed, &config, style, comment)
        }
        Commands::Prefix { coverage, changed } => {
            let snapshot = load_current(&coverage)?;
            let gh = github_context(changed.github)?;
            let (files, _) = fetch_changed_files(&changed, gh.as_ref())?;
            let out = cli::cmd_prefix(&snapshot, files, changed.strip_path_prefix.as_deref())?;
            print!("{out}");
            Ok(())
        }
    }
}

fn run_report(
    coverage: &Path,
    base_coverage: Option<&Path>,
    changed: &ChangedFilesArgs,
    config: &ReportConfig,
    style: Style,
    comment: bool,
) -> Result<()> {
    let current = load_current(coverage)?;
    let base = match base_coverage {
        Some(path) => summary::load_optional(path)
            .with_context(|| format!("Failed to load base coverage {}", path.display()))?,
        None => Default::default(),
    };

    let gh = github_context(changed.github || comment)?;
    let (files, source_sha) = fetch_changed_files(changed, gh.as_ref())?;
    info!(files = files.len(), "changed files");

    let sha = source_sha.or_else(|| gh.as_ref().and_then(|c| c.sha.clone()));
    let repo_url = gh.as_ref().map(|c| c.repo_url());

    let style = if comment { Style::Markdown } else { style };
    let outcome = cli::cmd_report(&current, &base, files, config, &style, sha, repo_url)?;
    print!("{}", outcome.output);

    if comment {
        if let Some(ref ctx) = gh {
            ctx.post_comment(&outcome.output)?;
        }
    }

    if let Some(pct) = outcome.failure_percent {
        bail!(
            "coverage of a file dropped by {pct}% (allowed: {}%)",
            config.fail_delta
        );
    }
    Ok(())
}

fn load_current(path: &Path) -> Result<covdelta::model::CoverageSnapshot> {
    summary::load(path).with_context(|| format!("Failed to load coverage {}", path.display()))
}

fn github_context(needed: bool) -> Result<Option<github::Context>> {
    if needed {
        Ok(Some(github::Context::from_env()?))
    } else {
        Ok(None)
    }
}

fn fetch_changed_files(
    args: &ChangedFilesArgs,
    gh: Option<&github::Context>,
) -> Result<(Vec<String>, Option<String>)> {
    let kind = cli::select_source(
        args.changed_files.as_deref(),
        args.git_diff.as_deref(),
        gh.is_some(),
    );
    let source: Box<dyn ChangedFileSource + '_> = match (kind, gh) {
        (SourceKind::ListFile(path), _) => Box::new(ListFile { path }),
        (SourceKind::GitDiff(args), _) => Box::new(GitChangedFiles { args }),
        (SourceKind::GitHub, Some(context)) => Box::new(GitHubFiles { context }),
        _ => Box::new(StdinFiles),
    };
    let files = source.fetch_files()?;
    let sha = source.sha().map(str::to_string);
    Ok((files, sha))
}
