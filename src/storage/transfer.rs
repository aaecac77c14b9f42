//! Transfer helpers shared by the OpenDAL-backed backends.
//!
//! Backends differ in how they build their operator and in a few policy
//! points (object URLs, head-object support, blob normalization). The byte
//! moving, presigning and error mapping are the same for all of them and
//! live here.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use futures::{AsyncWrite, AsyncWriteExt, StreamExt};
use opendal::layers::{LoggingLayer, RetryLayer, TimeoutLayer};
use opendal::{Builder, ErrorKind, Metadata, Operator};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::path::{Path, PathBuf};
use url::Url;

use super::error::{BucketError, BucketResult};
use super::settings::AdapterSettings;
use super::traits::{Client, Expiry, FilePointer, TransferStatus};

/// Chunk size for multipart uploads.
const UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Bytes left unescaped in object URL paths, the same set OpenDAL signs with.
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Finish an OpenDAL builder with the layers every backend shares.
///
/// Logging is always on. Timeout and retry layers are only added when the
/// settings ask for them, so the client's own defaults apply otherwise.
pub(crate) fn build_operator<B: Builder>(builder: B, settings: &AdapterSettings) -> Result<Operator> {
    let mut op = Operator::new(builder)?
        .layer(LoggingLayer::default())
        .finish();

    if let Some(timeout) = settings.timeout() {
        op = op.layer(TimeoutLayer::new().with_timeout(timeout));
    }
    if let Some(max_times) = settings.max_retries() {
        op = op.layer(RetryLayer::new().with_max_times(max_times));
    }

    Ok(op)
}

/// Key used when the caller gives no remote name: the local path as typed.
pub(crate) fn default_key(local_path: &Path) -> String {
    local_path.to_string_lossy().into_owned()
}

/// Stream a local file into `key`.
pub(crate) async fn upload_file(op: &Operator, local_path: &Path, key: &str) -> Result<u64> {
    let mut file = async_fs::File::open(local_path)
        .await
        .with_context(|| format!("cannot open {}", local_path.display()))?;

    let writer = op.writer_with(key).chunk(UPLOAD_CHUNK_SIZE).await?;
    let mut sink = writer.into_futures_async_write();
    let bytes = futures::io::copy(&mut file, &mut sink).await?;
    sink.close().await?;

    Ok(bytes)
}

/// Stream `key` into `target`, returning the number of bytes written.
pub(crate) async fn copy_object<W>(op: &Operator, key: &str, target: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin + Send + ?Sized,
{
    let reader = op.reader(key).await?;
    let mut stream = reader.into_bytes_stream(..).await?;

    let mut bytes = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        target.write_all(&chunk).await?;
        bytes += chunk.len() as u64;
    }
    target.flush().await?;

    Ok(bytes)
}

/// Download `key` into a local file.
///
/// Bytes land in a temporary file next to `local_path` that is renamed over
/// it once the transfer completes. A missing key, a non-file entry or a
/// failed read leaves any existing local file untouched.
pub(crate) async fn download_to_path(op: &Operator, key: &str, local_path: &Path) -> Result<u64> {
    let metadata = op.stat(key).await?;
    if !metadata.is_file() {
        bail!("{} is a {:?} entry, not a file", key, metadata.mode());
    }

    let dir = match local_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let (file, temp_path) = tempfile::Builder::new()
        .prefix(".download-")
        .tempfile_in(dir)
        .with_context(|| format!("cannot create a temporary file in {}", dir.display()))?
        .into_parts();

    let mut file = async_fs::File::from(file);
    let bytes = copy_object(op, key, &mut file).await?;
    file.sync_all().await?;
    drop(file);

    temp_path
        .persist(local_path)
        .with_context(|| format!("cannot move download into {}", local_path.display()))?;

    Ok(bytes)
}

/// Stat `key`, mapping a missing object to `None`.
pub(crate) async fn stat_object(client: &Client, key: &str) -> BucketResult<Option<Metadata>> {
    match client.operator().stat(key).await {
        Ok(metadata) => Ok(Some(metadata)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => {
            tracing::error!("Failed to stat {} on {}: {}", key, client.kind().as_str(), e);
            Err(BucketError::Request {
                operation: "stat",
                key: key.to_string(),
            })
        }
    }
}

/// Presigned `GET` URL for `key`.
///
/// `None` uses the default expiry. Absolute expiries are turned into a
/// duration from now because presigning only accepts durations.
pub(crate) async fn signed_url(client: &Client, key: &str, expiry: Option<Expiry>) -> BucketResult<String> {
    let op = client.operator();
    if !op.info().full_capability().presign_read {
        return Err(BucketError::UnsupportedOperation {
            operation: "generate_signed_url",
            backend: client.kind().as_str(),
        });
    }

    let expiry = expiry.unwrap_or_default();
    let Some(duration) = expiry.duration_from(Utc::now()) else {
        tracing::error!("Refusing to sign {}: expiry {:?} is not in the future", key, expiry);
        return Err(BucketError::Signing(key.to_string()));
    };

    match op.presign_read(key, duration).await {
        Ok(request) => Ok(request.uri().to_string()),
        Err(e) => {
            tracing::error!("Failed to sign {} on {}: {}", key, client.kind().as_str(), e);
            Err(BucketError::Signing(key.to_string()))
        }
    }
}

/// Upload `local_path` and return the key it was stored under.
pub(crate) async fn put_file(
    client: &Client,
    local_path: &Path,
    remote_name: Option<&str>,
) -> BucketResult<String> {
    let key = remote_name.map(str::to_string).unwrap_or_else(|| default_key(local_path));

    match upload_file(client.operator(), local_path, &key).await {
        Ok(bytes) => {
            tracing::info!("Uploaded {} ({} bytes) to {}", local_path.display(), bytes, key);
            Ok(key)
        }
        Err(e) => {
            tracing::error!("Failed to upload {} to {}: {:#}", local_path.display(), key, e);
            Err(BucketError::Upload(key))
        }
    }
}

/// Download `key` to `local_path`, or to a file named after the key.
pub(crate) async fn get_file(
    client: &Client,
    key: &str,
    local_path: Option<&Path>,
) -> BucketResult<TransferStatus> {
    let local = local_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(key));

    match download_to_path(client.operator(), key, &local).await {
        Ok(bytes) => {
            tracing::info!("Downloaded {} ({} bytes) to {}", key, bytes, local.display());
            Ok(TransferStatus {
                key: key.to_string(),
                local_path: Some(local),
                bytes,
            })
        }
        Err(e) => {
            tracing::error!("Failed to download {} to {}: {:#}", key, local.display(), e);
            Err(BucketError::Download(key.to_string()))
        }
    }
}

/// Stream `key` into an open writer.
pub(crate) async fn get_into(
    client: &Client,
    key: &str,
    target: FilePointer<'_>,
) -> BucketResult<TransferStatus> {
    match copy_object(client.operator(), key, target).await {
        Ok(bytes) => {
            tracing::debug!("Streamed {} ({} bytes) into writer", key, bytes);
            Ok(TransferStatus {
                key: key.to_string(),
                local_path: None,
                bytes,
            })
        }
        Err(e) => {
            tracing::error!("Failed to stream {}: {:#}", key, e);
            Err(BucketError::Download(key.to_string()))
        }
    }
}

/// Raw metadata lookup shared by backends that have a head-object concept.
pub(crate) async fn head_object(client: &Client, key: &str) -> BucketResult<(bool, Option<Metadata>)> {
    let metadata = stat_object(client, key).await?;
    Ok((metadata.is_some(), metadata))
}

/// Build an object URL below `base`, optionally prefixed by the bucket.
///
/// The key is laid out the way OpenDAL addresses it: empty segments are
/// dropped, `.` and `..` segments are kept, everything else is
/// percent-encoded. The path is appended as text because URL parsing would
/// resolve dot segments into a different object.
pub(crate) fn object_url(base: &str, bucket: Option<&str>, key: &str) -> BucketResult<String> {
    let url = Url::parse(base)
        .map_err(|e| BucketError::Config(format!("invalid endpoint {}: {}", base, e)))?;
    if url.cannot_be_a_base() || url.query().is_some() || url.fragment().is_some() {
        return Err(BucketError::Config(format!("endpoint {} cannot hold a path", base)));
    }

    let mut location = url.as_str().trim_end_matches('/').to_string();
    let segments = bucket
        .into_iter()
        .chain(key.split('/'))
        .filter(|segment| !segment.is_empty());
    for segment in segments {
        location.push('/');
        location.extend(utf8_percent_encode(segment, KEY_SEGMENT));
    }
    if key.ends_with('/') {
        location.push('/');
    }

    Ok(location)
}
