//! Archive a Gmail inbox: authenticate with OAuth 2.0, list the messages
//! carrying the `INBOX` label and remove that label from each one.

pub mod archiver;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gmail_api;
pub mod logging;
pub mod types;

pub use archiver::{archive_inbox, archive_messages, exit_status, ArchiveReport};
pub use config::ArchiverConfig;
pub use credentials::Credential;
pub use error::{Error, Result};
pub use gmail_api::{GmailClient, MailService};
