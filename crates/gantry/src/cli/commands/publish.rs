//! Publish command

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use console::style;
use tracing::debug;

use gantry_play::{
    classify, Diagnostic, EditTransaction, FileArtifactSource, PlayConfig, PlayEditApi,
    PublishOutcome, ReleaseNote, ReleasePlan, RolloutCompletion, ServiceAccountKey,
    ServiceAccountTokenProvider,
};

use crate::cli::{Cli, OutputFormat};
use crate::exit_codes;

/// Publish artifacts to Google Play
#[derive(Debug, Args)]
pub struct PublishCommand {
    /// Paths to artifacts (apk or aab)
    #[arg(required = true)]
    pub artifacts: Vec<PathBuf>,

    /// Package name
    #[arg(long, required = true)]
    pub package_name: String,

    /// Path to service account JSON key
    #[arg(long, env = "GOOGLE_PLAY_SERVICE_ACCOUNT")]
    pub service_account: PathBuf,

    /// Release track (internal, alpha, beta, production)
    #[arg(long, default_value = "internal")]
    pub track: String,

    /// Staged rollout fraction (0.0-1.0)
    #[arg(long)]
    pub rollout: Option<f64>,

    /// In-app update priority (0-5)
    #[arg(long)]
    pub priority: Option<i32>,

    /// Release notes (format: "en-US:notes,de-DE:notes")
    #[arg(long)]
    pub release_notes: Option<String>,

    /// Mark the release completed when the rollout fraction reaches 1.0
    #[arg(long)]
    pub complete_at_full: bool,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "60")]
    pub timeout: u64,

    /// Dry run - read the artifacts and show the plan without uploading
    #[arg(long)]
    pub dry_run: bool,
}

impl PublishCommand {
    pub fn execute(&self, cli: &Cli) -> i32 {
        match self.try_execute(cli) {
            Ok(code) => code,
            Err(err) => {
                eprintln!("{:#}", err);
                exit_codes::ERROR
            }
        }
    }

    fn try_execute(&self, cli: &Cli) -> anyhow::Result<i32> {
        let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
        Ok(rt.block_on(self.run(cli)))
    }

    async fn run(&self, cli: &Cli) -> i32 {
        debug!(
            "Publishing {} artifact(s) to {} as {}",
            self.artifacts.len(),
            self.track,
            self.package_name
        );

        let source = Arc::new(FileArtifactSource::new(self.artifacts.clone()));

        if self.dry_run {
            return self.dry_run_report(cli, &source).await;
        }

        let key = match ServiceAccountKey::from_file(&self.service_account) {
            Ok(key) => key,
            Err(err) => return report_failure(cli, &classify(&err)),
        };
        let token = Arc::new(ServiceAccountTokenProvider::new(key));

        let mut config = PlayConfig::new(self.package_name.clone());
        config.timeout_secs = self.timeout;

        let api = match PlayEditApi::new(config, token) {
            Ok(api) => Arc::new(api),
            Err(err) => return report_failure(cli, &classify(&err)),
        };

        let plan = ReleasePlan {
            track: self.track.clone(),
            rollout_fraction: self.rollout,
            update_priority: self.priority,
            release_notes: parse_release_notes(self.release_notes.as_deref()),
        };

        let completion = if self.complete_at_full {
            RolloutCompletion::CompleteAtFull
        } else {
            RolloutCompletion::StayInProgress
        };

        let transaction =
            EditTransaction::new(api, source, vec![plan]).with_completion(completion);

        // Stop initiating new calls on Ctrl-C; in-flight calls finish so the
        // remote edit is not left in an unknown state.
        let cancelled = transaction.cancel_flag();
        let cancel = transaction.cancel_flag();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::SeqCst);
            }
        });

        if !cli.quiet {
            println!(
                "{} {} artifact(s) to Google Play ({})",
                style("Publishing").cyan(),
                self.artifacts.len(),
                self.track
            );
        }

        let outcome = transaction.run().await;

        if cancelled.load(Ordering::SeqCst) {
            self.render_outcome(cli, &outcome);
            return exit_codes::CANCELLED;
        }

        self.render_outcome(cli, &outcome)
    }

    async fn dry_run_report(&self, cli: &Cli, source: &Arc<FileArtifactSource>) -> i32 {
        use gantry_play::ArtifactSource;

        let artifacts = match source.artifacts().await {
            Ok(artifacts) => artifacts,
            Err(err) => return report_failure(cli, &classify(&err)),
        };

        if !cli.quiet {
            println!(
                "{} would publish to track '{}':",
                style("Dry run").yellow(),
                self.track
            );
            for artifact in &artifacts {
                println!("  {} ({} bytes)", artifact.name, artifact.bytes.len());
            }
        }

        exit_codes::SUCCESS
    }

    fn render_outcome(&self, cli: &Cli, outcome: &PublishOutcome) -> i32 {
        match cli.format {
            OutputFormat::Json => {
                match serde_json::to_string_pretty(outcome) {
                    Ok(json) => println!("{}", json),
                    Err(err) => eprintln!("Failed to render outcome: {}", err),
                }
            }
            OutputFormat::Text => {
                if outcome.success() {
                    println!("{}", style("Publish successful!").green().bold());
                    let codes: Vec<String> = outcome
                        .version_codes
                        .iter()
                        .map(|c| c.to_string())
                        .collect();
                    println!("  Version codes: {}", style(codes.join(", ")).cyan());
                    println!(
                        "  Console:       {}",
                        style(format!(
                            "https://play.google.com/console/developers/app/{}/tracks",
                            self.package_name
                        ))
                        .dim()
                    );
                } else if let Some(diagnostic) = &outcome.diagnostic {
                    println!("{}", style("Publish failed").red().bold());
                    println!("{}", diagnostic.message);
                }
            }
        }

        match &outcome.diagnostic {
            None => exit_codes::SUCCESS,
            Some(diagnostic) => exit_codes::for_category(diagnostic.category),
        }
    }
}

/// Render a pre-transaction failure and return its exit code.
fn report_failure(cli: &Cli, diagnostic: &Diagnostic) -> i32 {
    match cli.format {
        OutputFormat::Json => match serde_json::to_string_pretty(diagnostic) {
            Ok(json) => println!("{}", json),
            Err(err) => eprintln!("Failed to render diagnostic: {}", err),
        },
        OutputFormat::Text => {
            println!("{}", style("Publish failed").red().bold());
            println!("{}", diagnostic.message);
        }
    }

    exit_codes::for_category(diagnostic.category)
}

/// Parse `"lang:text,lang:text"` release notes. Malformed pairs become
/// absent entries, which the notes transform preserves positionally.
fn parse_release_notes(raw: Option<&str>) -> Option<Vec<Option<ReleaseNote>>> {
    raw.map(|notes| {
        notes
            .split(',')
            .map(|pair| {
                let mut parts = pair.splitn(2, ':');
                match (parts.next(), parts.next()) {
                    (Some(language), Some(text)) => Some(ReleaseNote {
                        language: language.trim().to_string(),
                        text: text.to_string(),
                    }),
                    _ => None,
                }
            })
            .collect()
    })
}
