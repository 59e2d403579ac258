use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use breakcheck_core::{Config, CONFIG_FILE_NAME};
use breakcheck_dbt::ManifestFile;
use breakcheck_engine::{model_impact, ChangeAnalyzer};
use breakcheck_vcs::GitRepository;

mod output;
mod pr;

/// Exit status when the run completed without dependency analysis
const EXIT_GRAPH_SKIPPED: u8 = 2;

/// breakcheck - Breaking change detection for dbt projects
#[derive(Parser)]
#[command(name = "breakcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: <project-dir>/breakcheck.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare changed models against the base branch
    Check {
        /// Path to the dbt project directory
        #[arg(short, long, default_value = ".")]
        project_dir: PathBuf,

        /// Revision to compare against (overrides base_ref from config)
        #[arg(short, long)]
        base_branch: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Also write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the markdown analysis section to this file
        #[arg(short, long)]
        markdown: Option<PathBuf>,

        /// Update the pull request description with the results
        #[arg(long, requires_all = ["repo_name", "pr_number"])]
        update_pr: bool,

        /// GitHub repository (org/repo)
        #[arg(long)]
        repo_name: Option<String>,

        /// Pull request number
        #[arg(long)]
        pr_number: Option<u64>,
    },

    /// Show downstream impact for a model
    Impact {
        /// Model name to analyze (short name or unique_id)
        model: String,

        /// Path to the dbt project directory
        #[arg(short, long, default_value = ".")]
        project_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Check {
            project_dir,
            base_branch,
            json,
            output,
            markdown,
            update_pr,
            repo_name,
            pr_number,
        } => {
            let mut config = load_config(cli.config.as_deref(), &project_dir, cli.verbose)?;
            if let Some(base) = base_branch {
                config.base_ref = base;
            }

            let pr_target = match (update_pr, repo_name, pr_number) {
                (true, Some(repo), Some(number)) => Some((repo, number)),
                _ => None,
            };

            check_command(&config, json, output.as_deref(), markdown.as_deref(), pr_target).await
        }
        Commands::Impact { model, project_dir } => {
            let config = load_config(cli.config.as_deref(), &project_dir, cli.verbose)?;
            impact_command(&config, &model)
        }
    }
}

/// Explicit config file, else `<project_dir>/breakcheck.toml`, else defaults
fn load_config(explicit: Option<&Path>, project_dir: &Path, verbose: bool) -> Result<Config> {
    let mut config = if let Some(path) = explicit {
        Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?
    } else {
        let candidate = project_dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            Config::from_file(&candidate)
                .with_context(|| format!("Failed to load config {}", candidate.display()))?
        } else {
            if verbose {
                eprintln!("{}", "No config file found, using defaults".yellow());
            }
            Config::default()
        }
    };

    config.project_root = project_dir.to_path_buf();

    if verbose {
        eprintln!("{} dialect: {:?}", "Using".cyan(), config.dialect);
        eprintln!("{} base: {}", "Using".cyan(), config.base_ref);
    }

    Ok(config)
}

/// Check command - diff changed models against the base revision
async fn check_command(
    config: &Config,
    json: bool,
    output: Option<&Path>,
    markdown: Option<&Path>,
    pr_target: Option<(String, u64)>,
) -> Result<ExitCode> {
    let git = GitRepository::discover(&config.project_root)?
        .with_base_ref(config.base_ref.clone())
        .with_extensions(config.extensions.clone());
    let manifest = ManifestFile::new(config.manifest_location());

    let outcome = ChangeAnalyzer::from_config(&git, &manifest, config).analyze()?;
    let graph_analyzed = outcome.graph_analyzed;
    let report = outcome.into_report();

    if json {
        println!("{}", report.to_json()?);
    } else {
        output::print_report(&report);
    }

    if let Some(path) = output {
        report
            .save_to_file(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        eprintln!("{} {}", "Report saved to:".green(), path.display());
    }

    if let Some(path) = markdown {
        let section = pr::analysis_section(&report, &config.pr.section_title);
        std::fs::write(path, section)
            .with_context(|| format!("Failed to write markdown to {}", path.display()))?;
        eprintln!("{} {}", "Markdown saved to:".green(), path.display());
    }

    if let Some((repo, number)) = pr_target {
        let client = pr::GitHubClient::from_env(&config.pr)?;
        client
            .update_description(&repo, number, &report, &config.pr)
            .await?;
        eprintln!(
            "{} PR #{} description with analysis results",
            "Updated".green(),
            number
        );
    }

    if !graph_analyzed {
        eprintln!(
            "{}",
            "Dependency analysis was skipped. Run 'dbt compile' to generate the manifest."
                .yellow()
        );
        return Ok(ExitCode::from(EXIT_GRAPH_SKIPPED));
    }

    Ok(ExitCode::SUCCESS)
}

/// Impact command - show downstream dependencies
fn impact_command(config: &Config, model: &str) -> Result<ExitCode> {
    let manifest = ManifestFile::new(config.manifest_location());
    tracing::debug!(path = %manifest.path().display(), "loading manifest");

    let impact = model_impact(&manifest, model)
        .map_err(|e| anyhow::anyhow!("Failed to load manifest: {}", e))?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Model '{}' not found in manifest. Try using the full unique_id (e.g., 'model.project.{}')",
                model,
                model
            )
        })?;

    output::print_impact(&impact);
    Ok(ExitCode::SUCCESS)
}
