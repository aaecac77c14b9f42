//! Backend-agnostic blob metadata.
//!
//! Backends hand the normalizer an explicitly tagged [`NativeBlob`], so the
//! field mapping is picked by tag rather than by inspecting the native
//! object.

use chrono::{DateTime, Utc};
use opendal::{EntryMode, Metadata};
use serde::{Deserialize, Serialize};

use super::error::{BucketError, BucketResult};
use super::settings::AdapterSettings;

/// Normalized metadata for a stored object.
///
/// Fields the backend cannot resolve stay `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub name: Option<String>,
    pub time_created: Option<DateTime<Utc>>,
    pub bucket: Option<String>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    /// Size in bytes.
    pub size: Option<u64>,
}

impl BlobMetadata {
    /// Get a human-readable size string.
    pub fn size_display(&self) -> String {
        match self.size {
            Some(bytes) if bytes >= 1_073_741_824 => {
                format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
            }
            Some(bytes) if bytes >= 1_048_576 => {
                format!("{:.1} MB", bytes as f64 / 1_048_576.0)
            }
            Some(bytes) if bytes >= 1024 => {
                format!("{:.1} KB", bytes as f64 / 1024.0)
            }
            Some(bytes) => format!("{} B", bytes),
            None => "-".to_string(),
        }
    }
}

/// Native metadata tagged with the backend that produced it.
#[derive(Debug, Clone)]
pub enum NativeBlob {
    /// GCS objects carry their own name.
    Gcs { path: String, metadata: Metadata },
    /// S3 head responses carry no name; the caller supplies it.
    S3 { metadata: Metadata },
    LocalFs { path: String, metadata: Metadata },
}

impl NativeBlob {
    fn metadata(&self) -> &Metadata {
        match self {
            NativeBlob::Gcs { metadata, .. }
            | NativeBlob::S3 { metadata }
            | NativeBlob::LocalFs { metadata, .. } => metadata,
        }
    }

    fn describe(&self) -> String {
        match self {
            NativeBlob::Gcs { path, .. } | NativeBlob::LocalFs { path, .. } => path.clone(),
            NativeBlob::S3 { .. } => "s3 object".to_string(),
        }
    }
}

/// Convert a tagged native object into a [`BlobMetadata`].
///
/// # Arguments
///
/// * `native` - Backend metadata with its backend tag
/// * `settings` - Adapter settings; supplies the bucket name
/// * `explicit_name` - Object name for backends whose metadata has none (S3)
///
/// # Errors
///
/// Returns [`BucketError::UnsupportedBlobShape`] when the metadata does not
/// describe a file (a directory marker or an entry of unknown mode).
pub fn normalize(
    native: NativeBlob,
    settings: &AdapterSettings,
    explicit_name: Option<&str>,
) -> BucketResult<BlobMetadata> {
    let mode = native.metadata().mode();
    if mode != EntryMode::FILE {
        return Err(BucketError::UnsupportedBlobShape(format!(
            "{} is a {:?} entry, not a file",
            native.describe(),
            mode
        )));
    }

    let bucket = settings.bucket_name.clone();
    let blob = match native {
        NativeBlob::Gcs { path, metadata } | NativeBlob::LocalFs { path, metadata } => {
            from_metadata(Some(path), bucket, &metadata)
        }
        NativeBlob::S3 { metadata } => {
            from_metadata(explicit_name.map(str::to_string), bucket, &metadata)
        }
    };

    Ok(blob)
}

fn from_metadata(name: Option<String>, bucket: Option<String>, metadata: &Metadata) -> BlobMetadata {
    BlobMetadata {
        name,
        time_created: metadata.last_modified(),
        bucket,
        content_type: metadata.content_type().map(str::to_string),
        content_encoding: metadata.content_encoding().map(str::to_string),
        // Not exposed by the storage client.
        content_language: None,
        size: Some(metadata.content_length()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file_metadata() -> Metadata {
        let mut metadata = Metadata::new(EntryMode::FILE)
            .with_content_length(2048)
            .with_content_type("application/pdf".to_string())
            .with_last_modified(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        metadata.set_content_encoding("gzip");
        metadata
    }

    #[test]
    fn test_gcs_blob_uses_native_name() {
        let settings = AdapterSettings::new("gcs", "my-bucket");
        let native = NativeBlob::Gcs {
            path: "reports/q1.pdf".to_string(),
            metadata: file_metadata(),
        };

        let blob = normalize(native, &settings, Some("ignored.pdf")).unwrap();
        assert_eq!(blob.name.as_deref(), Some("reports/q1.pdf"));
        assert_eq!(blob.size, Some(2048));
        assert_eq!(blob.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(blob.content_encoding.as_deref(), Some("gzip"));
        assert_eq!(blob.bucket.as_deref(), Some("my-bucket"));
        assert_eq!(
            blob.time_created,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(blob.content_language, None);
    }

    #[test]
    fn test_s3_blob_takes_explicit_name() {
        let settings = AdapterSettings::new("s3", "test-bucket");
        let native = NativeBlob::S3 {
            metadata: file_metadata(),
        };

        let blob = normalize(native, &settings, Some("report.pdf")).unwrap();
        assert_eq!(blob.name.as_deref(), Some("report.pdf"));
        assert_eq!(blob.bucket.as_deref(), Some("test-bucket"));
        assert_eq!(blob.size, Some(2048));
    }

    #[test]
    fn test_s3_blob_without_name_leaves_it_unset() {
        let settings = AdapterSettings::new("s3", "test-bucket");
        let native = NativeBlob::S3 {
            metadata: file_metadata(),
        };

        let blob = normalize(native, &settings, None).unwrap();
        assert_eq!(blob.name, None);
        assert_eq!(blob.content_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_directory_is_not_a_blob() {
        let settings = AdapterSettings::new("gcs", "my-bucket");
        let native = NativeBlob::Gcs {
            path: "reports/".to_string(),
            metadata: Metadata::new(EntryMode::DIR),
        };

        let result = normalize(native, &settings, None);
        assert!(matches!(result, Err(BucketError::UnsupportedBlobShape(_))));
    }

    #[test]
    fn test_unknown_mode_is_not_a_blob() {
        let settings = AdapterSettings::new("s3", "b");
        let native = NativeBlob::S3 {
            metadata: Metadata::new(EntryMode::Unknown),
        };

        assert!(normalize(native, &settings, Some("x")).is_err());
    }

    #[test]
    fn test_size_display() {
        let mut blob = BlobMetadata {
            name: None,
            time_created: None,
            bucket: None,
            content_type: None,
            content_encoding: None,
            content_language: None,
            size: Some(500),
        };
        assert_eq!(blob.size_display(), "500 B");

        blob.size = Some(1_500_000);
        assert_eq!(blob.size_display(), "1.4 MB");

        blob.size = None;
        assert_eq!(blob.size_display(), "-");
    }
}
