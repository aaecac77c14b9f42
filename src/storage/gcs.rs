//! Google Cloud Storage backend using OpenDAL.
//!
//! Authenticates with a service-account key given inline (`CREDENTIAL_JSON`
//! or a service-account `CREDENTIALS` map) or as a file (`CREDENTIAL_FILE`).
//! Signing URLs needs the private key from that service account.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use opendal::services::Gcs;
use opendal::Metadata;
use std::path::Path;

use super::blob::{normalize, BlobMetadata, NativeBlob};
use super::error::{BucketError, BucketResult};
use super::settings::AdapterSettings;
use super::traits::{BackendKind, Client, StorageBackend};
use super::transfer;

/// Public endpoint used for object location URLs.
const PUBLIC_ENDPOINT: &str = "https://storage.googleapis.com";

/// Google Cloud Storage backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct GcsBackend;

impl GcsBackend {
    pub fn new() -> Self {
        Self
    }

    /// Create a boxed GCS backend.
    pub fn boxed() -> Box<dyn StorageBackend> {
        Box::new(Self::new())
    }

    /// Build the OpenDAL GCS builder from settings.
    fn builder(settings: &AdapterSettings) -> Result<Gcs> {
        let mut builder = Gcs::default().bucket(settings.bucket()?);

        if let Some(endpoint) = settings.endpoint() {
            builder = builder.endpoint(endpoint);
        }

        // The credential loader takes the key document base64 encoded
        if let Some(json) = settings.service_account_json()? {
            builder = builder.credential(&STANDARD.encode(json));
        } else if let Some(path) = settings.credential_file() {
            if !Path::new(path).is_file() {
                return Err(anyhow!("CREDENTIAL_FILE {} does not exist", path));
            }
            builder = builder.credential_path(path);
        } else {
            return Err(anyhow!(
                "one of CREDENTIAL_JSON, CREDENTIAL_FILE or CREDENTIALS is required"
            ));
        }

        Ok(builder)
    }

    /// Build a client without the connectivity check.
    pub(crate) fn client(settings: &AdapterSettings) -> Result<Client> {
        let op = transfer::build_operator(Self::builder(settings)?, settings)?;
        Ok(Client::new(BackendKind::Gcs, op))
    }

    /// Public URL of an uploaded object.
    fn public_url(settings: &AdapterSettings, key: &str) -> BucketResult<String> {
        let base = settings.endpoint().unwrap_or(PUBLIC_ENDPOINT);
        transfer::object_url(base, Some(settings.bucket()?), key)
    }
}

#[async_trait]
impl StorageBackend for GcsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gcs
    }

    async fn authenticate(&self, settings: &AdapterSettings) -> BucketResult<Client> {
        let client = Self::client(settings).map_err(|e| {
            tracing::error!("Failed to build GCS client: {:#}", e);
            BucketError::Authentication
        })?;

        client.operator().check().await.map_err(|e| {
            tracing::error!(
                "Failed to connect to GCS: {}. Check your credentials and bucket name.",
                e
            );
            BucketError::Authentication
        })?;

        tracing::info!(
            "Authenticated against GCS bucket {} (project {})",
            settings.bucket()?,
            settings.project_name.as_deref().unwrap_or("-")
        );
        Ok(client)
    }

    async fn upload(
        &self,
        local_path: &Path,
        settings: &AdapterSettings,
        client: &Client,
        remote_name: Option<&str>,
    ) -> BucketResult<String> {
        let key = transfer::put_file(client, local_path, remote_name).await?;
        Self::public_url(settings, &key)
    }

    async fn get_blob(
        &self,
        remote_name: &str,
        settings: &AdapterSettings,
        client: Option<&Client>,
    ) -> BucketResult<BlobMetadata> {
        let owned;
        let client = match client {
            Some(client) => client,
            None => {
                owned = Self::client(settings).map_err(|e| {
                    tracing::error!("Failed to build GCS client for get_blob: {:#}", e);
                    BucketError::Config("cannot build a GCS client from the settings".to_string())
                })?;
                &owned
            }
        };

        match transfer::stat_object(client, remote_name).await? {
            Some(metadata) => normalize(
                NativeBlob::Gcs {
                    path: remote_name.to_string(),
                    metadata,
                },
                settings,
                None,
            ),
            None => Err(BucketError::NotFound(remote_name.to_string())),
        }
    }

    async fn get_head_object(
        &self,
        remote_name: &str,
        _settings: &AdapterSettings,
        _client: &Client,
    ) -> BucketResult<(bool, Option<Metadata>)> {
        tracing::warn!("get_head_object requested for {} on GCS", remote_name);
        Err(BucketError::UnsupportedOperation {
            operation: "get_head_object",
            backend: BackendKind::Gcs.as_str(),
        })
    }
}
