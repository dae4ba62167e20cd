//! Command handler functions for the cvr CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use crate::annotate::{annotate, render_payload};
use crate::badge::badge_request;
use crate::detect::Format;
use crate::discovery::discover_repositories;
use crate::github::{GitHubClient, StatusRequest};
use crate::ingest::{ingest, resolve_format, Remap};
use crate::model::CoverageReport;
use crate::rewrite::{rewrite_path, Direction};

fn load(report: &Path, format: Option<&str>, remap: Option<&Remap>) -> Result<CoverageReport> {
    ingest(report, format, remap).with_context(|| format!("Failed to read {}", report.display()))
}

/// Annotated source of `file`, or its render payload as JSON.
///
/// The source is read from `source` when given, otherwise from `file`
/// itself relative to the working directory.
pub fn cmd_annotate(
    report: &Path,
    file: &str,
    source: Option<&Path>,
    format: Option<&str>,
    remap: Option<&Remap>,
    json: bool,
) -> Result<String> {
    let coverage = load(report, format, remap)?;
    let source_path = source.unwrap_or_else(|| Path::new(file));
    let read_source = || {
        std::fs::read_to_string(source_path)
            .with_context(|| format!("Failed to read source {}", source_path.display()))
    };
    render_annotation(&coverage, report, file, read_source, json)
}

/// Like [`cmd_annotate`], with the source fetched from `repository` at
/// `git_ref` (default `master`).
#[allow(clippy::too_many_arguments)]
pub fn cmd_annotate_remote(
    client: &GitHubClient,
    repository: &str,
    git_ref: Option<&str>,
    report: &Path,
    file: &str,
    format: Option<&str>,
    remap: Option<&Remap>,
    json: bool,
) -> Result<String> {
    let (owner, repo) = split_repository(repository)?;
    let coverage = load(report, format, remap)?;
    let read_source = || {
        client
            .file_content(owner, repo, git_ref, file)
            .with_context(|| format!("Failed to fetch {file} from {repository}"))
    };
    render_annotation(&coverage, report, file, read_source, json)
}

// The source is only fetched once the file is known to have coverage.
fn render_annotation(
    coverage: &CoverageReport,
    report: &Path,
    file: &str,
    read_source: impl FnOnce() -> Result<String>,
    json: bool,
) -> Result<String> {
    let file_coverage = coverage
        .find_file(file)
        .ok_or_else(|| anyhow!("No coverage data for '{}' in {}", file, report.display()))?;
    let text = read_source()?;

    if json {
        let payload = render_payload(file_coverage, &text, file);
        let mut out = serde_json::to_string_pretty(&payload)?;
        out.push('\n');
        Ok(out)
    } else {
        let mut out = annotate(file_coverage, &text, coverage.format);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }
}

fn split_repository(repository: &str) -> Result<(&str, &str)> {
    match repository.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => Ok((owner, repo)),
        _ => bail!("Repository must be given as owner/name, got '{repository}'"),
    }
}

pub fn cmd_percent(
    report: &Path,
    format: Option<&str>,
    remap: Option<&Remap>,
    threshold: f64,
) -> Result<String> {
    let coverage = load(report, format, remap)?;
    let percent = coverage.percent();
    let verdict = if percent >= threshold { "pass" } else { "fail" };
    Ok(format!("{percent:.2}% ({verdict}, threshold {threshold}%)\n"))
}

pub fn cmd_files(report: &Path, format: Option<&str>, remap: Option<&Remap>) -> Result<String> {
    let mut coverage = load(report, format, remap)?;
    coverage.sort_by_path();

    let mut out = String::new();
    writeln!(
        out,
        "{:<60} {:>8} {:>8} {:>8}",
        "FILE", "LINES", "COVERED", "RATE"
    )?;
    writeln!(out, "{}", "-".repeat(88))?;

    for f in &coverage.files {
        writeln!(
            out,
            "{:<60} {:>8} {:>8} {:>7.1}%",
            f.file,
            f.lines.found,
            f.lines.hit,
            f.percent()
        )?;
    }
    writeln!(out, "{}", "-".repeat(88))?;
    writeln!(
        out,
        "{:<60} {:>8} {:>8} {:>7.1}%",
        "TOTAL",
        coverage.files.iter().map(|f| f.lines.found).sum::<u64>(),
        coverage.files.iter().map(|f| f.lines.hit).sum::<u64>(),
        coverage.percent()
    )?;

    Ok(out)
}

/// Badge for `report`, or the no-data badge when there is none.
pub fn cmd_badge(
    report: Option<&Path>,
    format: Option<&str>,
    remap: Option<&Remap>,
    threshold: f64,
    svg: bool,
) -> Result<String> {
    let percent = match report {
        Some(path) => Some(load(path, format, remap)?.percent()),
        None => None,
    };
    let badge = badge_request(percent, threshold);

    let mut out = if svg {
        badge.to_svg()
    } else {
        serde_json::to_string_pretty(&badge)?
    };
    out.push('\n');
    Ok(out)
}

/// Rewritten report text. Nothing is parsed.
pub fn cmd_rewrite(
    report: &Path,
    prefix: &str,
    direction: Direction,
    format: Option<&str>,
) -> Result<String> {
    let content =
        std::fs::read(report).with_context(|| format!("Failed to read {}", report.display()))?;
    let format: Format = resolve_format(report, &content, format)?;
    let text = String::from_utf8(content)
        .with_context(|| format!("{} is not UTF-8", report.display()))?;
    Ok(rewrite_path(&text, prefix, format, direction)?)
}

/// Every repository the token can see, one `full_name` per line.
pub fn cmd_repos(client: &GitHubClient) -> Result<String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let repos = runtime.block_on(discover_repositories(client))?;

    let mut out = String::new();
    for repo in &repos {
        writeln!(out, "{}", repo.full_name)?;
    }
    Ok(out)
}

/// Post a pass/fail commit status computed from `report`.
#[allow(clippy::too_many_arguments)]
pub fn cmd_status(
    client: &GitHubClient,
    repository: &str,
    sha: &str,
    report: &Path,
    format: Option<&str>,
    remap: Option<&Remap>,
    threshold: f64,
    target_url: Option<String>,
) -> Result<String> {
    let (owner, repo) = split_repository(repository)?;
    let percent = load(report, format, remap)?.percent();
    let status = StatusRequest::for_coverage(Some(percent), threshold, target_url);
    client.create_status(owner, repo, sha, &status)?;
    Ok(format!(
        "Posted {} status to {}@{}: {}\n",
        status.state.as_str(),
        repository,
        sha,
        status.description
    ))
}
