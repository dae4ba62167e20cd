use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use cvr::cli;
use cvr::config::{Settings, DEFAULT_THRESHOLD};
use cvr::ingest::Remap;
use cvr::rewrite::Direction;

/// cvr: normalize coverage reports, annotate sources and compose badges.
#[derive(Parser)]
#[command(name = "cvr", version, about)]
struct Cli {
    /// GitHub API token.
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitHub API root.
    #[arg(long, global = true, env = "CVR_API_URL")]
    api_url: Option<String>,

    /// Pass threshold in percent.
    #[arg(long, global = true, env = "CVR_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads a report.
#[derive(Args)]
struct ReportArgs {
    /// Path to the coverage report.
    report: PathBuf,

    /// Override format detection (lcov, cobertura, jacoco, gocover).
    #[arg(long)]
    format: Option<String>,

    /// Prepend this prefix to every path in the report before parsing.
    #[arg(long, conflicts_with = "strip")]
    prepend: Option<String>,

    /// Remove this prefix from the report before parsing.
    #[arg(long)]
    strip: Option<String>,
}

impl ReportArgs {
    fn remap(&self) -> Option<Remap> {
        match (&self.prepend, &self.strip) {
            (Some(prefix), _) => Some(Remap::prepend(prefix.as_str())),
            (None, Some(prefix)) => Some(Remap::strip(prefix.as_str())),
            (None, None) => None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print a source file with covered and missed lines marked.
    Annotate {
        #[command(flatten)]
        input: ReportArgs,

        /// The file path as recorded in the report.
        #[arg(long)]
        file: String,

        /// Where to read the source from (default: the recorded path).
        #[arg(long, conflicts_with = "repo")]
        source: Option<PathBuf>,

        /// Fetch the source from this GitHub repository (owner/name).
        #[arg(long)]
        repo: Option<String>,

        /// Ref to fetch the source at (default: master).
        #[arg(long = "ref", requires = "repo")]
        git_ref: Option<String>,

        /// Print the render payload as JSON instead.
        #[arg(long)]
        json: bool,
    },

    /// Print the aggregate line coverage of a report.
    Percent {
        #[command(flatten)]
        input: ReportArgs,
    },

    /// List per-file coverage, sorted by path.
    Files {
        #[command(flatten)]
        input: ReportArgs,
    },

    /// Print a coverage badge for a report.
    Badge {
        /// Path to the coverage report. Without one the badge shows "new".
        report: Option<PathBuf>,

        /// Override format detection.
        #[arg(long)]
        format: Option<String>,

        /// Render SVG instead of the JSON badge request.
        #[arg(long)]
        svg: bool,
    },

    /// Rewrite the paths in a report and print it.
    Rewrite {
        /// Path to the coverage report.
        report: PathBuf,

        /// The path prefix.
        #[arg(long)]
        prefix: String,

        /// Remove the prefix instead of prepending it.
        #[arg(long)]
        strip: bool,

        /// Override format detection.
        #[arg(long)]
        format: Option<String>,
    },

    /// List every repository the token can see.
    Repos,

    /// Post a pass/fail commit status for a report.
    Status {
        /// Repository as owner/name.
        repository: String,

        /// Commit SHA.
        sha: String,

        #[command(flatten)]
        input: ReportArgs,

        /// Link attached to the status.
        #[arg(long)]
        target_url: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    let settings = Settings::new(cli.token, cli.api_url, cli.threshold)
        .context("Invalid configuration")?;

    let output = match cli.command {
        Commands::Annotate {
            input,
            file,
            repo: Some(repository),
            git_ref,
            json,
            ..
        } => cli::cmd_annotate_remote(
            &settings.github()?,
            &repository,
            git_ref.as_deref(),
            &input.report,
            &file,
            input.format.as_deref(),
            input.remap().as_ref(),
            json,
        )?,
        Commands::Annotate {
            input,
            file,
            source,
            repo: None,
            json,
            ..
        } => cli::cmd_annotate(
            &input.report,
            &file,
            source.as_deref(),
            input.format.as_deref(),
            input.remap().as_ref(),
            json,
        )?,
        Commands::Percent { input } => cli::cmd_percent(
            &input.report,
            input.format.as_deref(),
            input.remap().as_ref(),
            settings.threshold,
        )?,
        Commands::Files { input } => {
            cli::cmd_files(&input.report, input.format.as_deref(), input.remap().as_ref())?
        }
        Commands::Badge {
            report,
            format,
            svg,
        } => cli::cmd_badge(
            report.as_deref(),
            format.as_deref(),
            None,
            settings.threshold,
            svg,
        )?,
        Commands::Rewrite {
            report,
            prefix,
            strip,
            format,
        } => {
            let direction = if strip {
                Direction::Remove
            } else {
                Direction::Prepend
            };
            cli::cmd_rewrite(&report, &prefix, direction, format.as_deref())?
        }
        Commands::Repos => cli::cmd_repos(&settings.github()?)?,
        Commands::Status {
            repository,
            sha,
            input,
            target_url,
        } => cli::cmd_status(
            &settings.github()?,
            &repository,
            &sha,
            &input.report,
            input.format.as_deref(),
            input.remap().as_ref(),
            settings.threshold,
            target_url,
        )?,
    };

    print!("{output}");
    Ok(())
}
