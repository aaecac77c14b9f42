//! Storage adapter facade.
//!
//! Resolves the configured backend, authenticates once, then forwards every
//! call to the backend together with the stored settings and client.

use chrono::{DateTime, Utc};
use opendal::Metadata;
use std::path::Path;

use super::blob::BlobMetadata;
use super::error::BucketResult;
use super::registry::BackendRegistry;
use super::settings::AdapterSettings;
use super::traits::{
    BackendKind, BoxedStorageBackend, Client, Expiry, FilePointer, TransferStatus,
    DEFAULT_SIGNED_URL_EXPIRY_SECS,
};

/// Uniform file-storage interface over the configured backend.
///
/// An `Adapter` only exists in the ready state: construction fails if the
/// backend cannot be resolved or authentication fails. The client is never
/// refreshed; build a new adapter if credentials rotate.
///
/// # Example
///
/// ```ignore
/// use bucket_adapter::storage::{Adapter, AdapterSettings};
///
/// let settings = AdapterSettings::from_path("settings.json").await?;
/// let adapter = Adapter::new(settings).await?;
///
/// let url = adapter.upload("report.pdf".as_ref(), None).await?;
/// let signed = adapter.generate_signed_url("report.pdf", 60).await?;
/// ```
pub struct Adapter {
    settings: AdapterSettings,
    backend: BoxedStorageBackend,
    client: Client,
}

impl Adapter {
    /// Construct an adapter using the built-in backends.
    pub async fn new(settings: AdapterSettings) -> BucketResult<Self> {
        Self::with_registry(settings, &BackendRegistry::with_defaults()).await
    }

    /// Construct an adapter resolving `NAME` through `registry`.
    pub async fn with_registry(
        settings: AdapterSettings,
        registry: &BackendRegistry,
    ) -> BucketResult<Self> {
        let backend = registry.resolve(settings.backend_name()?)?;
        let client = backend.authenticate(&settings).await?;

        tracing::debug!("Adapter ready on {}", backend.kind());
        Ok(Self {
            settings,
            backend,
            client,
        })
    }

    pub fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Upload a local file; the key defaults to `local_path` as given.
    pub async fn upload(&self, local_path: &Path, remote_name: Option<&str>) -> BucketResult<String> {
        self.backend
            .upload(local_path, &self.settings, &self.client, remote_name)
            .await
    }

    /// Download an object; the local path defaults to the key as given.
    pub async fn download(
        &self,
        remote_name: &str,
        local_path: Option<&Path>,
    ) -> BucketResult<TransferStatus> {
        self.backend
            .download(remote_name, &self.settings, &self.client, local_path)
            .await
    }

    pub async fn download_to_file_pointer(
        &self,
        remote_name: &str,
        target: FilePointer<'_>,
    ) -> BucketResult<TransferStatus> {
        self.backend
            .download_to_file_pointer(remote_name, target, &self.settings, &self.client)
            .await
    }

    /// Presigned `GET` URL valid for `expiry_secs` seconds.
    pub async fn generate_signed_url(&self, remote_name: &str, expiry_secs: u64) -> BucketResult<String> {
        self.backend
            .generate_signed_url(remote_name, &self.settings, &self.client, expiry_secs)
            .await
    }

    /// Presigned `GET` URL with the default one hour expiry.
    pub async fn generate_default_signed_url(&self, remote_name: &str) -> BucketResult<String> {
        self.generate_signed_url(remote_name, DEFAULT_SIGNED_URL_EXPIRY_SECS)
            .await
    }

    pub async fn generate_signed_url_with_custom_expiry(
        &self,
        remote_name: &str,
        expiry: Option<Expiry>,
    ) -> BucketResult<String> {
        self.backend
            .generate_signed_url_with_custom_expiry(remote_name, &self.settings, &self.client, expiry)
            .await
    }

    /// Shorthand for an absolute expiry.
    pub async fn generate_signed_url_until(
        &self,
        remote_name: &str,
        expires_at: DateTime<Utc>,
    ) -> BucketResult<String> {
        self.generate_signed_url_with_custom_expiry(remote_name, Some(Expiry::At(expires_at)))
            .await
    }

    pub async fn get_blob(&self, remote_name: &str) -> BucketResult<BlobMetadata> {
        self.backend
            .get_blob(remote_name, &self.settings, Some(&self.client))
            .await
    }

    pub async fn get_head_object(&self, remote_name: &str) -> BucketResult<(bool, Option<Metadata>)> {
        self.backend
            .get_head_object(remote_name, &self.settings, &self.client)
            .await
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("backend", &self.backend.kind())
            .field("bucket", &self.settings.bucket_name)
            .finish()
    }
}
