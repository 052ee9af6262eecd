//! OAuth2 credentials for the device registration API
//!
//! Reads the authorized-user JSON written by the OAuth tooling
//! (`refresh_token`, `client_id`, `client_secret`, `token_uri`). Access tokens
//! are minted from the refresh token on demand and cached until shortly
//! before they expire.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{Error, Result};

/// Default OAuth token endpoint
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the reported expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

/// On-disk credentials layout
#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    token: Option<String>,
    refresh_token: String,
    #[serde(default)]
    token_uri: Option<String>,
    client_id: String,
    client_secret: String,
    #[serde(default)]
    scopes: Vec<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    token: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_none_or(|at| now + Duration::seconds(EXPIRY_MARGIN_SECS) < at)
    }
}

/// OAuth2 authorized-user credentials
pub struct Credentials {
    refresh_token: SecretString,
    client_id: String,
    client_secret: SecretString,
    token_uri: String,
    scopes: Vec<String>,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Load credentials from `path`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credentials`] if the file is missing or malformed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Credentials(format!("cannot read {}: {e}", path.display()))
        })?;
        let credentials = Self::from_json(&content)
            .map_err(|e| Error::Credentials(format!("{}: {e}", path.display())))?;

        tracing::debug!(
            path = %path.display(),
            client_id = %credentials.client_id,
            "loaded OAuth credentials"
        );
        Ok(credentials)
    }

    /// Parse credentials from the authorized-user JSON document
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credentials`] if required fields are missing
    pub fn from_json(content: &str) -> Result<Self> {
        let file: CredentialsFile = serde_json::from_str(content)
            .map_err(|e| Error::Credentials(format!("invalid credentials: {e}")))?;

        // A token without expiry info is only trusted until the first refresh
        let cached = file.token.map(|t| CachedToken {
            token: SecretString::from(t),
            expires_at: Some(Utc::now()),
        });

        Ok(Self {
            refresh_token: SecretString::from(file.refresh_token),
            client_id: file.client_id,
            client_secret: SecretString::from(file.client_secret),
            token_uri: file.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            scopes: file.scopes,
            cached: Mutex::new(cached),
        })
    }

    /// Default credentials location: `~/.config/kestrel/credentials.json`
    #[must_use]
    pub fn default_path() -> PathBuf {
        directories::BaseDirs::new().map_or_else(
            || PathBuf::from(".config/kestrel/credentials.json"),
            |d| d.config_dir().join("kestrel").join("credentials.json"),
        )
    }

    /// OAuth client id
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Granted scopes
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Return a valid access token, refreshing it if needed
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credentials`] if the token endpoint rejects the refresh
    pub async fn access_token(&self, client: &reqwest::Client) -> Result<SecretString> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.token.clone());
        }

        let fresh = self.refresh(client).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        drop(cached);
        Ok(token)
    }

    async fn refresh(&self, client: &reqwest::Client) -> Result<CachedToken> {
        tracing::debug!(token_uri = %self.token_uri, "refreshing OAuth access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.expose_secret()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ];

        let resp = client.post(&self.token_uri).form(&params).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Credentials(format!(
                "token refresh failed: {status} - {body}"
            )));
        }

        let token: TokenResponse = resp.json().await?;
        Ok(CachedToken {
            token: SecretString::from(token.access_token),
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUTHORIZED_USER: &str = r#"{
        "token": null,
        "refresh_token": "1//refresh",
        "token_uri": "https://oauth2.example.test/token",
        "client_id": "client.apps.example",
        "client_secret": "shh",
        "scopes": ["https://www.googleapis.com/auth/assistant-sdk-prototype"]
    }"#;

    #[test]
    fn parses_authorized_user_file() {
        let creds = Credentials::from_json(AUTHORIZED_USER).unwrap();
        assert_eq!(creds.client_id(), "client.apps.example");
        assert_eq!(creds.token_uri, "https://oauth2.example.test/token");
        assert_eq!(creds.scopes().len(), 1);
    }

    #[test]
    fn token_uri_defaults() {
        let creds = Credentials::from_json(
            r#"{"refresh_token": "r", "client_id": "c", "client_secret": "s"}"#,
        )
        .unwrap();
        assert_eq!(creds.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn missing_refresh_token_is_rejected() {
        let err =
            Credentials::from_json(r#"{"client_id": "c", "client_secret": "s"}"#).unwrap_err();
        assert!(matches!(err, Error::Credentials(_)));
    }

    #[test]
    fn missing_file_is_credentials_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Credentials::load(&dir.path().join("credentials.json")).unwrap_err();
        assert!(matches!(err, Error::Credentials(_)));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let creds = Credentials::from_json(AUTHORIZED_USER).unwrap();
        let debug = format!("{creds:?}");
        assert!(!debug.contains("shh"));
        assert!(!debug.contains("1//refresh"));
    }

    #[test]
    fn token_freshness_respects_margin() {
        let now = Utc::now();
        let stale = CachedToken {
            token: SecretString::from("t".to_string()),
            expires_at: Some(now + Duration::seconds(10)),
        };
        let fresh = CachedToken {
            token: SecretString::from("t".to_string()),
            expires_at: Some(now + Duration::seconds(3600)),
        };
        assert!(!stale.is_fresh(now));
        assert!(fresh.is_fresh(now));
    }
}
