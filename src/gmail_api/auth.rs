use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tracing::{error, info, warn};
use yup_oauth2::storage::{TokenInfo, TokenStorage};
use yup_oauth2::{ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod};

use crate::config::ArchiverConfig;
use crate::credentials::Credential;
use crate::error::{Error, Result};

// Define a trait for token persistence to allow mocking
#[cfg_attr(test, mockall::automock)]
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<Credential>>;
    fn save(&self, credential: &Credential) -> Result<()>;
}

/// Token persistence backed by a JSON file on disk.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let credential: Credential = serde_json::from_str(&contents)?;
        Ok(Some(credential))
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(credential)?;
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        // The open mode only applies to new files
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

// Define a trait for token refresh to allow mocking
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credential: &Credential) -> Result<Credential>;
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

/// Exchanges a refresh token at the credential's token endpoint.
pub struct HttpTokenRefresher {
    client: reqwest::Client,
}

impl HttpTokenRefresher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::Authorization("No refresh token stored".to_string()))?;

        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", credential.client_id.as_str()),
        ];
        if let Some(secret) = credential.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        let response = self
            .client
            .post(&credential.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Authorization(format!(
                "Token refresh failed ({}): {}",
                status, error_text
            )));
        }

        let refreshed: RefreshResponse = response.json().await?;
        Ok(apply_refresh(credential, refreshed, Utc::now()))
    }
}

fn apply_refresh(
    credential: &Credential,
    refreshed: RefreshResponse,
    now: DateTime<Utc>,
) -> Credential {
    let mut updated = credential.clone();
    updated.access_token = refreshed.access_token;
    updated.expiry = refreshed
        .expires_in
        .map(|secs| now + Duration::seconds(secs));
    // Google omits the refresh token on refresh; keep the one we have
    if let Some(refresh_token) = refreshed.refresh_token {
        updated.refresh_token = Some(refresh_token);
    }
    if let Some(scope) = refreshed.scope {
        updated.scopes = scope.split_whitespace().map(str::to_string).collect();
    }
    updated
}

// Define a trait for OAuth flow operations to allow mocking
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    async fn perform_flow(
        &self,
        secret: ApplicationSecret,
        scopes: Vec<String>,
    ) -> Result<Credential>;
}

// yup-oauth2 keeps the refresh token to itself; this storage hands it back
#[derive(Default)]
struct CapturedToken {
    slot: Arc<Mutex<Option<TokenInfo>>>,
}

#[async_trait]
impl TokenStorage for CapturedToken {
    async fn set(&self, _scopes: &[&str], token: TokenInfo) -> anyhow::Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("token slot poisoned"))?;
        *slot = Some(token);
        Ok(())
    }

    async fn get(&self, _target_scopes: &[&str]) -> Option<TokenInfo> {
        None
    }
}

// Implement the trait for the real InstalledFlowAuthenticator
pub struct RealOAuthFlow;

#[async_trait]
impl OAuthFlow for RealOAuthFlow {
    async fn perform_flow(
        &self,
        secret: ApplicationSecret,
        scopes: Vec<String>,
    ) -> Result<Credential> {
        let captured = CapturedToken::default();
        let slot = captured.slot.clone();

        let auth = InstalledFlowAuthenticator::builder(
            secret.clone(),
            InstalledFlowReturnMethod::HTTPRedirect,
        )
        .with_storage(Box::new(captured))
        .build()
        .await
        .map_err(|e| Error::Authorization(format!("Could not start OAuth flow: {}", e)))?;

        let scopes_refs: Vec<&str> = scopes.iter().map(|s| s.as_str()).collect();
        let access = auth
            .token(&scopes_refs)
            .await
            .map_err(|e| Error::Authorization(e.to_string()))?;

        let info = slot.lock().ok().and_then(|mut slot| slot.take());
        let (access_token, refresh_token, expires_at) = match info {
            Some(info) => (
                info.access_token
                    .unwrap_or_else(|| access.token().unwrap_or("").to_string()),
                info.refresh_token,
                info.expires_at.or(access.expiration_time()),
            ),
            None => (
                access.token().unwrap_or("").to_string(),
                None,
                access.expiration_time(),
            ),
        };

        Ok(Credential {
            access_token,
            refresh_token,
            token_uri: secret.token_uri,
            client_id: secret.client_id,
            client_secret: Some(secret.client_secret),
            scopes,
            expiry: expires_at.and_then(expiry_from),
        })
    }
}

// yup-oauth2 reports expiry as a `time` value; the token file stores chrono
fn expiry_from(at: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(at.unix_timestamp(), at.nanosecond())
}

/// Read the OAuth client configuration downloaded from the Cloud console.
pub async fn load_client_secret(path: &Path) -> Result<ApplicationSecret> {
    if !path.exists() {
        error!(
            "OAuth client configuration file '{}' not found.",
            path.display()
        );
        return Err(Error::Config(format!(
            "OAuth client configuration '{}' not found. Create a Desktop OAuth client in the Google Cloud console and save its JSON there.",
            path.display()
        )));
    }

    yup_oauth2::read_application_secret(path).await.map_err(|e| {
        Error::Config(format!(
            "Invalid client configuration '{}': {}",
            path.display(),
            e
        ))
    })
}

// Main authentication function
pub async fn try_authenticate(config: &ArchiverConfig) -> Result<Credential> {
    let token_store = FileTokenStore::new(&config.token_path);
    let refresher = HttpTokenRefresher::new(reqwest::Client::new());
    let oauth_flow_impl = RealOAuthFlow;

    try_authenticate_internal(
        &token_store,
        &refresher,
        &oauth_flow_impl,
        &config.client_secret_path,
        &config.scopes,
    )
    .await
}

pub async fn try_authenticate_internal<S: TokenStore, R: TokenRefresher, O: OAuthFlow>(
    token_store: &S,
    refresher: &R,
    oauth_flow_impl: &O,
    client_secret_path: &Path,
    scopes: &[String],
) -> Result<Credential> {
    let mut needs_saving = false;

    let mut credential = match token_store.load() {
        Ok(Some(credential)) => {
            info!("Loaded stored credentials");
            Some(credential)
        }
        Ok(None) => None,
        Err(e) => {
            warn!(
                "Could not load stored credentials: {}. Will attempt to re-authenticate.",
                e
            );
            None
        }
    };

    if let Some(existing) = credential.take() {
        let now = Utc::now();
        if !existing.has_scopes(scopes) {
            info!("Stored credentials lack the required scope. Attempting new OAuth flow.");
        } else if existing.is_valid(now) {
            info!("Existing credentials are valid.");
            credential = Some(existing);
        } else if existing.can_refresh() {
            info!("Existing credentials expired. Attempting to refresh token...");
            match refresher.refresh(&existing).await {
                Ok(refreshed) => {
                    info!("Token refreshed successfully.");
                    credential = Some(refreshed);
                    needs_saving = true;
                }
                Err(e) => {
                    error!("Error refreshing token: {}. Will attempt new OAuth flow.", e);
                }
            }
        } else {
            info!("Stored credentials are not valid and cannot be refreshed. Attempting new OAuth flow.");
        }
    }

    let credential = match credential {
        Some(credential) => credential,
        None => {
            info!("Starting OAuth flow; a browser authorization is required.");
            let secret = load_client_secret(client_secret_path).await?;
            let obtained = oauth_flow_impl
                .perform_flow(secret, scopes.to_vec())
                .await
                .map_err(|e| {
                    error!("Error during OAuth flow: {}", e);
                    if matches!(e, Error::Authorization(_)) {
                        e
                    } else {
                        Error::Authorization(e.to_string())
                    }
                })?;
            info!("OAuth flow completed. Credentials obtained.");
            needs_saving = true;
            obtained
        }
    };

    if needs_saving {
        // The run can still proceed on an unsaved credential
        match token_store.save(&credential) {
            Ok(()) => info!("Credentials saved"),
            Err(e) => error!("Error saving credentials: {}", e),
        }
    }

    if !credential.is_valid(Utc::now()) || !credential.has_scopes(scopes) {
        error!("Failed to obtain valid credentials after all attempts.");
        return Err(Error::Authorization(
            "Failed to obtain valid credentials with the required scope".to_string(),
        ));
    }

    Ok(credential)
}
