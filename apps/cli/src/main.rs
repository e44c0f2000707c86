use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{HttpTransport, SelectedFile, SessionController};
use shared::domain::TopK;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod repl;

use config::{load_settings, parse_server_url, Settings};

#[derive(Parser, Debug)]
#[command(name = "docqa", about = "Upload a document and query the analysis service")]
struct Cli {
    /// Path to a TOML config file (defaults to ./docqa.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Number of retrieved passages per request.
    #[arg(long, global = true, value_parser = clap::value_parser!(i64).range(1..=12))]
    top_k: Option<i64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the service is reachable.
    Health,
    /// Run a scripted session: upload, then any requested analyses.
    Run {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        analyze: bool,
        #[arg(long)]
        question: Option<String>,
        /// Comma separated field names to fill.
        #[arg(long)]
        fields: Option<String>,
        /// Save the last raw response as rag_response.json.
        #[arg(long)]
        export: bool,
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
    /// Interactive session on stdin.
    Repl,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }
    if let Some(top_k) = cli.top_k {
        settings.default_top_k = top_k;
    }

    let base_url = parse_server_url(&settings.server_url)?;
    info!(server_url = %base_url, top_k = settings.default_top_k, "docqa: starting session");
    let transport = HttpTransport::with_timeout(base_url, settings.request_timeout())
        .context("failed to build http client")?;
    let controller = SessionController::new(Arc::new(transport));
    controller.set_result_count(TopK(settings.default_top_k));
    controller.set_form_fields_spec(settings.default_form_fields.clone());

    match cli.command {
        Command::Health => {
            let health = controller
                .ping()
                .await
                .context("analysis service health check failed")?;
            match health.message {
                Some(message) => println!("{}: {message}", health.status),
                None => println!("{}", health.status),
            }
        }
        Command::Run {
            file,
            analyze,
            question,
            fields,
            export,
            export_dir,
        } => {
            let script = Script {
                file,
                analyze,
                question,
                fields,
                export_dir: export
                    .then(|| export_dir.unwrap_or_else(|| settings.export_dir.clone())),
            };
            run_script(&controller, &settings, script).await?;
        }
        Command::Repl => repl::run(&controller, &settings).await?,
    }

    Ok(())
}

struct Script {
    file: Option<PathBuf>,
    analyze: bool,
    question: Option<String>,
    fields: Option<String>,
    export_dir: Option<PathBuf>,
}

/// Runs the requested operations in pipeline order. Every step runs even if
/// an earlier one failed; the exit status reports whether any did.
async fn run_script(
    controller: &SessionController,
    settings: &Settings,
    script: Script,
) -> Result<()> {
    let mut failures = 0usize;

    if let Some(path) = &script.file {
        let file = SelectedFile::from_path(path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        controller.select_file(file);
        let outcome = controller.upload().await.map(|_| ());
        failures += usize::from(outcome.is_err());
        repl::report(controller, outcome);
    }

    if script.analyze {
        let outcome = controller.analyze_certificate().await.map(|_| ());
        failures += usize::from(outcome.is_err());
        repl::report(controller, outcome);
    }

    if let Some(question) = &script.question {
        let outcome = controller.ask(question).await.map(|_| ());
        failures += usize::from(outcome.is_err());
        repl::report(controller, outcome);
    }

    if let Some(fields) = &script.fields {
        controller.set_form_fields_spec(fields.clone());
        let outcome = controller.fill_form().await.map(|_| ());
        failures += usize::from(outcome.is_err());
        repl::report(controller, outcome);
    }

    if let Some(dir) = &script.export_dir {
        match repl::export_to(controller, dir).await? {
            Some(path) => println!("saved {}", path.display()),
            None => println!("nothing to export"),
        }
    }

    info!(
        failures,
        top_k = settings.default_top_k,
        "docqa: scripted session finished"
    );
    if failures > 0 {
        bail!("{failures} operation(s) failed");
    }
    Ok(())
}
