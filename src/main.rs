use clap::Parser;
use gmail_archiver::cli::Cli;
use gmail_archiver::gmail_api::try_authenticate;
use gmail_archiver::logging::init_logging;
use gmail_archiver::{
    archive_inbox, exit_status, ArchiveReport, ArchiverConfig, GmailClient, Result,
};
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let _cli = Cli::parse();

    let config = match ArchiverConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // No logger yet
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.log_path) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    info!("Gmail Archiver started.");
    let outcome = run(&config).await;
    match &outcome {
        Ok(report) if report.is_complete() => info!("Gmail Archiver finished."),
        Ok(report) if report.halted => error!(
            "Run stopped early after {} of {} emails. Rerun later to archive the rest.",
            report.archived, report.total
        ),
        Ok(report) => error!("{} emails could not be archived.", report.failed),
        Err(e) => {
            error!("{}", e);
            if e.halts_run() {
                error!("Could not complete the run. Rerun later.");
            }
        }
    }
    ExitCode::from(exit_status(&outcome))
}

async fn run(config: &ArchiverConfig) -> Result<ArchiveReport> {
    let credential = try_authenticate(config).await.map_err(|e| {
        error!("Could not authenticate with Gmail. Exiting.");
        e
    })?;

    let gmail = GmailClient::new(
        reqwest::Client::new(),
        credential.access_token,
        config.api_base_url.clone(),
    );
    archive_inbox(&gmail).await
}
