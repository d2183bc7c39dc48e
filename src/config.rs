//! Runtime settings for the archiver

use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

pub const DEFAULT_CLIENT_SECRET_FILE: &str = "credentials.json";
pub const DEFAULT_TOKEN_FILE: &str = "token.json";
pub const DEFAULT_LOG_FILE: &str = "gmail_archiver.log";

#[derive(Debug, Clone)]
pub struct ArchiverConfig {
    /// OAuth client configuration downloaded from the Cloud console.
    pub client_secret_path: PathBuf,
    pub token_path: PathBuf,
    pub log_path: PathBuf,
    pub api_base_url: String,
    pub scopes: Vec<String>,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            client_secret_path: PathBuf::from(DEFAULT_CLIENT_SECRET_FILE),
            token_path: PathBuf::from(DEFAULT_TOKEN_FILE),
            log_path: PathBuf::from(DEFAULT_LOG_FILE),
            api_base_url: GMAIL_API_BASE.to_string(),
            scopes: vec![GMAIL_MODIFY_SCOPE.to_string()],
        }
    }
}

impl ArchiverConfig {
    /// Load settings from the environment
    ///
    /// Reads from `.env` file if present. All variables are optional:
    /// - `GMAIL_ARCHIVER_CREDENTIALS` (default: `credentials.json`)
    /// - `GMAIL_ARCHIVER_TOKEN` (default: `token.json`)
    /// - `GMAIL_ARCHIVER_LOG` (default: `gmail_archiver.log`)
    /// - `GMAIL_ARCHIVER_API_BASE` (default: the Gmail v1 `users/me` endpoint)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let path_var = |key: &str, default: PathBuf| -> Result<PathBuf> {
            match lookup(key) {
                Some(value) if value.trim().is_empty() => {
                    Err(Error::Config(format!("{key} is set but empty")))
                }
                Some(value) => Ok(PathBuf::from(value)),
                None => Ok(default),
            }
        };

        let api_base_url = match lookup("GMAIL_ARCHIVER_API_BASE") {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                url.trim_end_matches('/').to_string()
            }
            Some(url) => {
                return Err(Error::Config(format!(
                    "Invalid GMAIL_ARCHIVER_API_BASE: {url}"
                )))
            }
            None => defaults.api_base_url,
        };

        Ok(Self {
            client_secret_path: path_var("GMAIL_ARCHIVER_CREDENTIALS", defaults.client_secret_path)?,
            token_path: path_var("GMAIL_ARCHIVER_TOKEN", defaults.token_path)?,
            log_path: path_var("GMAIL_ARCHIVER_LOG", defaults.log_path)?,
            api_base_url,
            scopes: defaults.scopes,
        })
    }
}
