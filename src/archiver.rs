use tracing::{error, info, warn};

use crate::error::Result;
use crate::gmail_api::{list_inbox, MailService};

/// Outcome of one archiving run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub total: usize,
    pub archived: usize,
    pub failed: usize,
    /// Set when a rate-limit or service error stopped the loop early.
    pub halted: bool,
    pub error: Option<String>,
}

impl ArchiveReport {
    /// Messages never attempted because the run halted.
    pub fn remaining(&self) -> usize {
        self.total - self.archived - self.failed
    }

    pub fn is_complete(&self) -> bool {
        !self.halted && self.failed == 0
    }
}

/// Process exit status for a run: 0 only when every listed message was
/// archived.
pub fn exit_status(outcome: &Result<ArchiveReport>) -> u8 {
    match outcome {
        Ok(report) if report.is_complete() => 0,
        _ => 1,
    }
}

/// List every inbox message and archive each one in turn.
pub async fn archive_inbox<M: MailService + ?Sized>(service: &M) -> Result<ArchiveReport> {
    let message_ids = list_inbox(service).await?;
    Ok(archive_messages(service, &message_ids).await)
}

/// Archive the given messages one request at a time.
///
/// A failure on a single message is logged and counted, and the loop moves
/// on. Rate limiting and service outages stop the loop; the ids after the
/// failing one are left for the next run.
pub async fn archive_messages<M: MailService + ?Sized>(
    service: &M,
    message_ids: &[String],
) -> ArchiveReport {
    let mut report = ArchiveReport {
        total: message_ids.len(),
        ..Default::default()
    };

    if message_ids.is_empty() {
        info!("No emails to archive.");
        return report;
    }

    info!("Starting to archive {} emails...", report.total);
    for (i, message_id) in message_ids.iter().enumerate() {
        match service.archive_message(message_id).await {
            Ok(()) => {
                report.archived += 1;
                info!(
                    "Archived email {}/{} (ID: {})",
                    i + 1,
                    report.total,
                    message_id
                );
            }
            Err(e) if e.halts_run() => {
                error!("Stopping at email ID {}: {}", message_id, e);
                report.halted = true;
                report.error = Some(e.to_string());
                break;
            }
            Err(e) => {
                report.failed += 1;
                error!("Error archiving email ID {}: {}", message_id, e);
            }
        }
    }

    info!(
        "Successfully archived {} out of {} emails.",
        report.archived, report.total
    );
    if report.halted {
        warn!(
            "{} emails were not processed. Rerun later to archive the rest.",
            report.remaining()
        );
    }
    report
}
