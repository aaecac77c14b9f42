//! Backend capability traits.
//!
//! This module defines the contract every storage backend implements and the
//! small value types that flow through it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::io::AsyncWrite;
use opendal::{Metadata, Operator};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::blob::BlobMetadata;
use super::error::BucketResult;
use super::settings::AdapterSettings;
use super::transfer;

/// Expiry applied to signed URLs when the caller does not pick one.
pub const DEFAULT_SIGNED_URL_EXPIRY_SECS: u64 = 3600;

/// Supported backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Amazon S3 and S3-compatible services
    S3,
    /// Google Cloud Storage
    Gcs,
    /// Local filesystem
    LocalFs,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::S3 => "s3",
            BackendKind::Gcs => "gcs",
            BackendKind::LocalFs => "fs",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::S3 => "Amazon S3",
            BackendKind::Gcs => "Google Cloud Storage",
            BackendKind::LocalFs => "Local Filesystem",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Authenticated handle produced by [`StorageBackend::authenticate`].
///
/// Wraps a finished OpenDAL operator. Cloning is cheap and shares the
/// underlying HTTP client.
#[derive(Clone, Debug)]
pub struct Client {
    kind: BackendKind,
    operator: Operator,
}

impl Client {
    pub(crate) fn new(kind: BackendKind, operator: Operator) -> Self {
        Self { kind, operator }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }
}

/// Signed URL expiry, either relative to now or an absolute point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    In(Duration),
    At(DateTime<Utc>),
}

impl Expiry {
    pub fn seconds(secs: u64) -> Self {
        Expiry::In(Duration::from_secs(secs))
    }

    /// Resolve to a duration measured from `now`.
    ///
    /// Signing primitives only take durations, so absolute expiries are
    /// converted here. Presigned URLs carry whole seconds, so the remaining
    /// time is rounded up to the next second. An absolute expiry that is not
    /// in the future yields `None`.
    pub fn duration_from(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Expiry::In(duration) => Some(*duration),
            Expiry::At(at) => {
                let remaining = at.signed_duration_since(now).to_std().ok()?;
                if remaining.is_zero() {
                    return None;
                }
                let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                Some(Duration::from_secs(secs))
            }
        }
    }
}

impl Default for Expiry {
    fn default() -> Self {
        Expiry::seconds(DEFAULT_SIGNED_URL_EXPIRY_SECS)
    }
}

/// Outcome of a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStatus {
    /// Remote object key.
    pub key: String,
    /// Local destination, when the bytes went to a file.
    pub local_path: Option<PathBuf>,
    pub bytes: u64,
}

impl TransferStatus {
    pub fn message(&self) -> String {
        match &self.local_path {
            Some(path) => format!(
                "Downloaded {} ({} bytes) to {}",
                self.key,
                self.bytes,
                path.display()
            ),
            None => format!("Downloaded {} ({} bytes)", self.key, self.bytes),
        }
    }
}

/// Writable target for [`StorageBackend::download_to_file_pointer`].
pub type FilePointer<'a> = &'a mut (dyn AsyncWrite + Unpin + Send);

/// Capability set every storage backend provides.
///
/// Methods receive the adapter's settings and authenticated client on every
/// call; backends keep no state of their own. Transfers, signing and head
/// lookups default to the shared OpenDAL plumbing, so a backend only
/// implements its policy points: authentication, upload URLs and blob
/// normalization, plus head-object where it differs.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Get the backend kind.
    fn kind(&self) -> BackendKind;

    /// Build and verify a client from the credential fields in `settings`.
    ///
    /// Every failure is reported as `BucketError::Authentication`; the
    /// underlying cause is only logged.
    async fn authenticate(&self, settings: &AdapterSettings) -> BucketResult<Client>;

    /// Upload a local file and return the object's location URL.
    ///
    /// # Arguments
    ///
    /// * `local_path` - File to upload
    /// * `remote_name` - Object key; defaults to `local_path` verbatim
    async fn upload(
        &self,
        local_path: &Path,
        settings: &AdapterSettings,
        client: &Client,
        remote_name: Option<&str>,
    ) -> BucketResult<String>;

    /// Download an object into a local file.
    ///
    /// # Arguments
    ///
    /// * `remote_name` - Object key
    /// * `local_path` - Destination; defaults to `remote_name` verbatim
    async fn download(
        &self,
        remote_name: &str,
        _settings: &AdapterSettings,
        client: &Client,
        local_path: Option<&Path>,
    ) -> BucketResult<TransferStatus> {
        transfer::get_file(client, remote_name, local_path).await
    }

    /// Stream an object into an already-open writer.
    async fn download_to_file_pointer(
        &self,
        remote_name: &str,
        target: FilePointer<'_>,
        _settings: &AdapterSettings,
        client: &Client,
    ) -> BucketResult<TransferStatus> {
        transfer::get_into(client, remote_name, target).await
    }

    /// Presigned `GET` URL valid for `expiry_secs` seconds.
    async fn generate_signed_url(
        &self,
        remote_name: &str,
        _settings: &AdapterSettings,
        client: &Client,
        expiry_secs: u64,
    ) -> BucketResult<String> {
        transfer::signed_url(client, remote_name, Some(Expiry::seconds(expiry_secs))).await
    }

    /// Presigned `GET` URL with a relative or absolute expiry.
    ///
    /// `None` falls back to [`DEFAULT_SIGNED_URL_EXPIRY_SECS`].
    async fn generate_signed_url_with_custom_expiry(
        &self,
        remote_name: &str,
        _settings: &AdapterSettings,
        client: &Client,
        expiry: Option<Expiry>,
    ) -> BucketResult<String> {
        transfer::signed_url(client, remote_name, expiry).await
    }

    /// Normalized metadata for an object.
    ///
    /// Without a client the backend builds an unchecked one from `settings`.
    async fn get_blob(
        &self,
        remote_name: &str,
        settings: &AdapterSettings,
        client: Option<&Client>,
    ) -> BucketResult<BlobMetadata>;

    /// Raw backend metadata, `(false, None)` when the object is absent.
    ///
    /// Backends without a head-object concept return
    /// `BucketError::UnsupportedOperation`.
    async fn get_head_object(
        &self,
        remote_name: &str,
        _settings: &AdapterSettings,
        client: &Client,
    ) -> BucketResult<(bool, Option<Metadata>)> {
        transfer::head_object(client, remote_name).await
    }
}

/// A boxed storage backend for dynamic dispatch.
pub type BoxedStorageBackend = Box<dyn StorageBackend>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::error::BucketError;
    use chrono::TimeDelta;
    use opendal::services::Fs;

    /// Backend that only implements its policy points.
    struct PolicyOnly;

    #[async_trait]
    impl StorageBackend for PolicyOnly {
        fn kind(&self) -> BackendKind {
            BackendKind::LocalFs
        }

        async fn authenticate(&self, settings: &AdapterSettings) -> BucketResult<Client> {
            let root = settings.root().ok_or(BucketError::Authentication)?;
            let op = transfer::build_operator(Fs::default().root(root), settings)
                .map_err(|_| BucketError::Authentication)?;
            Ok(Client::new(BackendKind::LocalFs, op))
        }

        async fn upload(
            &self,
            local_path: &Path,
            _settings: &AdapterSettings,
            client: &Client,
            remote_name: Option<&str>,
        ) -> BucketResult<String> {
            transfer::put_file(client, local_path, remote_name).await
        }

        async fn get_blob(
            &self,
            remote_name: &str,
            _settings: &AdapterSettings,
            _client: Option<&Client>,
        ) -> BucketResult<BlobMetadata> {
            Err(BucketError::NotFound(remote_name.to_string()))
        }
    }

    #[tokio::test]
    async fn test_default_methods_use_shared_transfers() {
        let bucket = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let mut settings = AdapterSettings::new("fs", "b");
        settings.root = Some(bucket.path().to_str().unwrap().to_string());

        let client = PolicyOnly.authenticate(&settings).await.unwrap();
        let source = scratch.path().join("in.txt");
        std::fs::write(&source, b"hello").unwrap();
        PolicyOnly
            .upload(&source, &settings, &client, Some("in.txt"))
            .await
            .unwrap();

        let target = scratch.path().join("out.txt");
        let status = PolicyOnly
            .download("in.txt", &settings, &client, Some(&target))
            .await
            .unwrap();
        assert_eq!(status.bytes, 5);
        assert_eq!(std::fs::read(&target).unwrap(), b"hello");

        let mut buffer: Vec<u8> = Vec::new();
        PolicyOnly
            .download_to_file_pointer("in.txt", &mut buffer, &settings, &client)
            .await
            .unwrap();
        assert_eq!(buffer, b"hello");

        let (exists, _) = PolicyOnly
            .get_head_object("in.txt", &settings, &client)
            .await
            .unwrap();
        assert!(exists);

        let result = PolicyOnly
            .generate_signed_url("in.txt", &settings, &client, 60)
            .await;
        assert!(matches!(result, Err(BucketError::UnsupportedOperation { .. })));
    }

    #[test]
    fn test_relative_expiry() {
        let now = Utc::now();
        assert_eq!(
            Expiry::seconds(60).duration_from(now),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            Expiry::default().duration_from(now),
            Some(Duration::from_secs(DEFAULT_SIGNED_URL_EXPIRY_SECS))
        );
    }

    #[test]
    fn test_absolute_expiry_becomes_duration() {
        let now = Utc::now();
        let at = now + TimeDelta::seconds(90);
        assert_eq!(
            Expiry::At(at).duration_from(now),
            Some(Duration::from_secs(90))
        );
    }

    #[test]
    fn test_past_expiry_is_rejected() {
        let now = Utc::now();
        assert_eq!(Expiry::At(now).duration_from(now), None);
        assert_eq!(
            Expiry::At(now - TimeDelta::seconds(5)).duration_from(now),
            None
        );
    }

    #[test]
    fn test_sub_second_expiry_rounds_up() {
        let now = Utc::now();
        assert_eq!(
            Expiry::At(now + TimeDelta::milliseconds(400)).duration_from(now),
            Some(Duration::from_secs(1))
        );
        assert_eq!(
            Expiry::At(now + TimeDelta::milliseconds(90_250)).duration_from(now),
            Some(Duration::from_secs(91))
        );
    }

    #[test]
    fn test_transfer_status_message() {
        let status = TransferStatus {
            key: "report.pdf".to_string(),
            local_path: Some(PathBuf::from("out/report.pdf")),
            bytes: 12,
        };
        assert_eq!(
            status.message(),
            "Downloaded report.pdf (12 bytes) to out/report.pdf"
        );
    }

    #[test]
    fn test_backend_kind_names() {
        assert_eq!(BackendKind::S3.as_str(), "s3");
        assert_eq!(BackendKind::Gcs.to_string(), "Google Cloud Storage");
    }
}
