//! Local filesystem backend using OpenDAL.
//!
//! For development and testing. A bucket is a directory below `ROOT`
//! (the current directory when unset), behind the same trait interface as
//! the cloud backends.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use opendal::services::Fs;
use std::path::{Path, PathBuf};
use url::Url;

use super::blob::{normalize, BlobMetadata, NativeBlob};
use super::error::{BucketError, BucketResult};
use super::settings::AdapterSettings;
use super::traits::{BackendKind, Client, StorageBackend};
use super::transfer;

/// Local filesystem backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFsBackend;

impl LocalFsBackend {
    pub fn new() -> Self {
        Self
    }

    /// Create a boxed local filesystem backend.
    pub fn boxed() -> Box<dyn StorageBackend> {
        Box::new(Self::new())
    }

    /// Absolute directory that holds the bucket's objects.
    fn bucket_dir(settings: &AdapterSettings) -> Result<PathBuf> {
        let root = PathBuf::from(settings.root().unwrap_or("."));
        Ok(std::path::absolute(root)?.join(settings.bucket()?))
    }

    pub(crate) fn client(settings: &AdapterSettings) -> Result<Client> {
        let dir = Self::bucket_dir(settings)?;
        let root = dir
            .to_str()
            .ok_or_else(|| anyhow!("Invalid path encoding"))?;

        let op = transfer::build_operator(Fs::default().root(root), settings)?;
        Ok(Client::new(BackendKind::LocalFs, op))
    }

    fn file_url(settings: &AdapterSettings, key: &str) -> BucketResult<String> {
        let dir = Self::bucket_dir(settings)
            .map_err(|e| BucketError::Config(format!("invalid bucket directory: {}", e)))?;
        let base = Url::from_directory_path(&dir)
            .map_err(|_| BucketError::Config(format!("{} is not an absolute path", dir.display())))?;
        transfer::object_url(base.as_str(), None, key)
    }
}

#[async_trait]
impl StorageBackend for LocalFsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalFs
    }

    async fn authenticate(&self, settings: &AdapterSettings) -> BucketResult<Client> {
        let client = Self::client(settings).map_err(|e| {
            tracing::error!("Failed to build local filesystem client: {:#}", e);
            BucketError::Authentication
        })?;

        client.operator().check().await.map_err(|e| {
            tracing::error!("Local bucket directory is not usable: {}", e);
            BucketError::Authentication
        })?;

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
        Self::file_url(settings, &key)
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
                owned = Self::client(settings)
                    .map_err(|e| BucketError::Config(format!("invalid bucket directory: {}", e)))?;
                &owned
            }
        };

        match transfer::stat_object(client, remote_name).await? {
            Some(metadata) => normalize(
                NativeBlob::LocalFs {
                    path: remote_name.to_string(),
                    metadata,
                },
                settings,
                None,
            ),
            None => Err(BucketError::NotFound(remote_name.to_string())),
        }
    }
}
