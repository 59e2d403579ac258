//! Pull request annotation
//!
//! Renders the analysis as a markdown section and writes it into a GitHub
//! pull request description. Re-running replaces the previous section; any
//! text the author wrote above it is kept.

use anyhow::{Context, Result};
use breakcheck_core::{PrConfig, Report};
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use std::collections::BTreeSet;

/// Markdown section describing a report
pub fn analysis_section(report: &Report, title: &str) -> String {
    let mut md = String::new();
    md.push_str(title);
    md.push_str("\n\n");

    if !report.has_breaking_changes() {
        md.push_str("✅ No breaking changes detected\n");
        push_warnings(&mut md, report);
        return md;
    }

    md.push_str("### Summary\n");
    md.push_str(&format!(
        "Found {} potential breaking change(s)\n\n",
        report.summary.total
    ));

    md.push_str("### Detailed Analysis\n\n");
    for (kind, changes) in report.grouped_by_kind() {
        md.push_str(&format!("#### {}\n", kind.title()));
        for change in changes {
            md.push_str(&format!("- **File**: `{}`\n", change.file_path()));
            md.push_str("  ```\n");
            for line in change.details().summary_lines() {
                md.push_str(&format!("  {}\n", line));
            }
            md.push_str("  ```\n");
        }
    }

    md.push_str("\n### Impact Assessment\n");
    let affected = report.affected_models();
    if affected.is_empty() {
        md.push_str("No downstream models were identified.\n");
    } else {
        md.push_str("The following models might be affected:\n\n");
        for model in affected {
            md.push_str(&format!("- `{}`\n", model));
        }
    }

    md.push_str("\n### Recommendations\n");
    md.push_str("Please review the following before merging:\n\n");
    md.push_str("1. Verify all column removals are intentional\n");
    md.push_str("2. Check data type changes for potential data loss\n");
    md.push_str("3. Review affected downstream dependencies\n");
    md.push_str("4. Update documentation if necessary\n");

    push_warnings(&mut md, report);
    md
}

fn push_warnings(md: &mut String, report: &Report) {
    if report.warnings.is_empty() {
        return;
    }

    md.push_str("\n### Warnings\n");
    let kinds: BTreeSet<&str> = report.warnings.iter().map(|w| w.kind().as_str()).collect();
    md.push_str(&format!(
        "Parts of the analysis did not run ({}):\n\n",
        kinds.into_iter().collect::<Vec<_>>().join(", ")
    ));
    for warning in &report.warnings {
        md.push_str(&format!("- `{}`: {}\n", warning.subject(), warning.message()));
    }
}

/// Replace the analysis section in an existing description
pub fn merge_description(current: &str, section: &str, title: &str) -> String {
    let base = current.split(title).next().unwrap_or_default().trim();

    if base.is_empty() {
        section.to_string()
    } else {
        format!("{}\n\n{}", base, section)
    }
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    #[serde(default)]
    body: Option<String>,
}

/// Minimal GitHub REST client for pull request descriptions
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Client authenticated with `GITHUB_TOKEN`
    pub fn from_env(config: &PrConfig) -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .context("GitHub token not found. Set the GITHUB_TOKEN environment variable")?;
        Ok(Self::new(config.api_url.clone(), token))
    }

    fn pull_url(&self, repo: &str, number: u64) -> String {
        format!("{}/repos/{}/pulls/{}", self.api_url, repo, number)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, concat!("breakcheck/", env!("CARGO_PKG_VERSION")))
    }

    async fn description(&self, repo: &str, number: u64) -> Result<String> {
        let resp = self
            .request(reqwest::Method::GET, &self.pull_url(repo, number))
            .send()
            .await
            .context("request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("fetching PR failed ({}): {}", status, text));
        }

        let pull: PullRequest = resp.json().await.context("invalid json response")?;
        Ok(pull.body.unwrap_or_default())
    }

    async fn set_description(&self, repo: &str, number: u64, body: &str) -> Result<()> {
        let resp = self
            .request(reqwest::Method::PATCH, &self.pull_url(repo, number))
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await
            .context("request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("updating PR failed ({}): {}", status, text));
        }

        Ok(())
    }

    /// Write the analysis section into a pull request description
    pub async fn update_description(
        &self,
        repo: &str,
        number: u64,
        report: &Report,
        config: &PrConfig,
    ) -> Result<()> {
        let current = self.description(repo, number).await?;
        let section = analysis_section(report, &config.section_title);
        let merged = merge_description(&current, &section, &config.section_title);

        tracing::debug!(repo, number, "updating pull request description");
        self.set_description(repo, number, &merged)
            .await
            .with_context(|| format!("Failed to update PR description for {}#{}", repo, number))
    }
}
