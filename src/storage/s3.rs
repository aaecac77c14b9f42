//! Amazon S3 backend using OpenDAL.
//!
//! Works with AWS S3 and S3-compatible services (MinIO, Cloudflare R2,
//! DigitalOcean Spaces) through the `ENDPOINT` setting.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use opendal::services::S3;
use std::path::Path;

use super::blob::{normalize, BlobMetadata, NativeBlob};
use super::error::{BucketError, BucketResult};
use super::settings::AdapterSettings;
use super::traits::{BackendKind, Client, StorageBackend};
use super::transfer;

/// Signature versions OpenDAL can produce. S3 only signs with SigV4.
const SUPPORTED_SIGNATURE_VERSIONS: &[&str] = &["s3v4", "v4", "aws4-hmac-sha256"];

/// S3 storage backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct S3Backend;

impl S3Backend {
    pub fn new() -> Self {
        Self
    }

    /// Create a boxed S3 backend.
    pub fn boxed() -> Box<dyn StorageBackend> {
        Box::new(Self::new())
    }

    /// Build the OpenDAL S3 builder from settings.
    fn builder(settings: &AdapterSettings) -> Result<S3> {
        let bucket = settings.bucket()?;

        let version = settings.signature_version();
        if !SUPPORTED_SIGNATURE_VERSIONS.contains(&version.to_ascii_lowercase().as_str()) {
            return Err(anyhow!("SIGNATURE_VERSION {} is not supported", version));
        }

        let mut builder = S3::default().bucket(bucket).region(settings.region());

        // Custom endpoint for S3-compatible services
        if let Some(endpoint) = settings.endpoint() {
            builder = builder.endpoint(endpoint);
        }

        // Static credentials skip the environment and instance-metadata lookups
        if let (Some(access_key), Some(secret_key)) = (settings.access_key(), settings.secret_key()) {
            builder = builder
                .access_key_id(access_key)
                .secret_access_key(secret_key)
                .disable_config_load()
                .disable_ec2_metadata();

            if let Some(token) = settings.session_token() {
                builder = builder.session_token(token);
            }
        }

        Ok(builder)
    }

    /// Build a client without the connectivity check.
    pub(crate) fn client(settings: &AdapterSettings) -> Result<Client> {
        let op = transfer::build_operator(Self::builder(settings)?, settings)?;
        Ok(Client::new(BackendKind::S3, op))
    }

    /// Location URL of an uploaded object.
    ///
    /// Path-style below a custom endpoint, virtual-hosted style on AWS.
    fn location_url(settings: &AdapterSettings, key: &str) -> BucketResult<String> {
        let bucket = settings.bucket()?;
        match settings.endpoint() {
            Some(endpoint) => transfer::object_url(endpoint, Some(bucket), key),
            None => {
                let base = format!("https://{}.s3.{}.amazonaws.com", bucket, settings.region());
                transfer::object_url(&base, None, key)
            }
        }
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }

    async fn authenticate(&self, settings: &AdapterSettings) -> BucketResult<Client> {
        let client = Self::client(settings).map_err(|e| {
            tracing::error!("Failed to build S3 client: {:#}", e);
            BucketError::Authentication
        })?;

        // Test the connection by checking if we can access the bucket
        client.operator().check().await.map_err(|e| {
            tracing::error!(
                "Failed to connect to S3: {}. Check your credentials and bucket name.",
                e
            );
            BucketError::Authentication
        })?;

        tracing::info!("Authenticated against S3 bucket {}", settings.bucket()?);
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
        Self::location_url(settings, &key)
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
                    tracing::error!("Failed to build S3 client for get_blob: {:#}", e);
                    BucketError::Config("cannot build an S3 client from the settings".to_string())
                })?;
                &owned
            }
        };

        match transfer::stat_object(client, remote_name).await? {
            // Head responses carry no key, so the requested name is passed along
            Some(metadata) => normalize(NativeBlob::S3 { metadata }, settings, Some(remote_name)),
            None => Err(BucketError::NotFound(remote_name.to_string())),
        }
    }
}
