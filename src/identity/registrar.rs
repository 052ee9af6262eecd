//! Device registration with the Embedded Assistant device API
//!
//! Registration is idempotent: the device is looked up first and only created
//! when the API reports it unknown.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Serialize;
use url::Url;

use super::credentials::Credentials;
use crate::{Error, Result};

/// Device API base URL
pub const DEVICE_API_URL: &str = "https://embeddedassistant.googleapis.com/v1alpha2/";

/// Client type reported for devices driven by the assistant library
const CLIENT_TYPE: &str = "SDK_LIBRARY";

/// Arguments of a single registration call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationCall {
    /// Cloud project owning the model
    pub project_id: String,
    /// Device model id
    pub model_id: String,
    /// Device instance id reported by the assistant session
    pub device_id: String,
    /// Optional display name
    pub nickname: Option<String>,
}

/// Performs the cloud-side registration of a device
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Register the device, succeeding if it is already registered
    ///
    /// # Errors
    ///
    /// Returns error on network, auth or API failure
    async fn register(&self, call: &RegistrationCall) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct DeviceResource<'a> {
    id: &'a str,
    model_id: &'a str,
    client_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    nickname: Option<&'a str>,
}

/// Registrar backed by the Embedded Assistant HTTP API
#[derive(Debug, Clone)]
pub struct CloudRegistrar {
    client: reqwest::Client,
    credentials: Arc<Credentials>,
    base_url: Url,
}

impl CloudRegistrar {
    /// Create a registrar against the public device API
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(credentials: Arc<Credentials>) -> Result<Self> {
        let base_url = Url::parse(DEVICE_API_URL)
            .map_err(|e| Error::Config(format!("invalid device API url: {e}")))?;
        Self::with_base_url(credentials, base_url)
    }

    /// Create a registrar against a custom API root
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn with_base_url(credentials: Arc<Credentials>, base_url: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("kestrel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            credentials,
            base_url,
        })
    }

    fn devices_url(&self, project_id: &str) -> Result<Url> {
        devices_url(&self.base_url, project_id)
    }
}

/// `{base}/projects/{project}/devices`
fn devices_url(base: &Url, project_id: &str) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| Error::Config(format!("device API url cannot be a base: {base}")))?
        .pop_if_empty()
        .extend(["projects", project_id, "devices"]);
    Ok(url)
}

/// `{base}/projects/{project}/devices/{device}`
fn device_url(base: &Url, project_id: &str, device_id: &str) -> Result<Url> {
    let mut url = devices_url(base, project_id)?;
    url.path_segments_mut()
        .map_err(|()| Error::Config(format!("device API url cannot be a base: {base}")))?
        .push(device_id);
    Ok(url)
}

#[async_trait]
impl Registrar for CloudRegistrar {
    async fn register(&self, call: &RegistrationCall) -> Result<()> {
        let token = self.credentials.access_token(&self.client).await?;

        let lookup = device_url(&self.base_url, &call.project_id, &call.device_id)?;
        let resp = self
            .client
            .get(lookup.clone())
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        let status = resp.status();
        tracing::debug!(url = %lookup, %status, "device lookup");

        if status.is_success() {
            tracing::info!(device_id = %call.device_id, "device already registered");
            return Ok(());
        }
        if status != StatusCode::NOT_FOUND {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Registration(format!(
                "device lookup failed: {status} - {body}"
            )));
        }

        tracing::info!(
            device_id = %call.device_id,
            model_id = %call.model_id,
            project_id = %call.project_id,
            "registering device"
        );

        let resp = self
            .client
            .post(self.devices_url(&call.project_id)?)
            .bearer_auth(token.expose_secret())
            .json(&DeviceResource {
                id: &call.device_id,
                model_id: &call.model_id,
                client_type: CLIENT_TYPE,
                nickname: call.nickname.as_deref(),
            })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Registration(format!(
                "failed to register device: {status} - {body}"
            )));
        }

        tracing::info!(device_id = %call.device_id, "device registered");
        Ok(())
    }
}
