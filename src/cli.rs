use clap::Parser;

/// Archive every message in a Gmail inbox.
///
/// Paths and endpoints come from the environment (or a `.env` file):
/// GMAIL_ARCHIVER_CREDENTIALS, GMAIL_ARCHIVER_TOKEN, GMAIL_ARCHIVER_LOG and
/// GMAIL_ARCHIVER_API_BASE. If Gmail rate-limits the run, rerun it later.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about)]
pub struct Cli {}
