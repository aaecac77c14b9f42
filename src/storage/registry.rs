//! Backend registry.
//!
//! Maps backend-name constants to constructors. The adapter resolves its
//! `NAME` setting here once, at construction, so a misconfigured name fails
//! before any request is made.

use std::collections::BTreeMap;

use super::error::{BucketError, BucketResult};
use super::gcs::GcsBackend;
use super::local_fs::LocalFsBackend;
use super::s3::S3Backend;
use super::traits::BoxedStorageBackend;

/// Constructor stored in the registry.
pub type BackendConstructor = fn() -> BoxedStorageBackend;

/// Registry of storage backends by name.
///
/// # Example
///
/// ```ignore
/// use bucket_adapter::storage::BackendRegistry;
///
/// let registry = BackendRegistry::with_defaults();
/// let backend = registry.resolve("s3")?;
/// ```
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    constructors: BTreeMap<String, BackendConstructor>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry with the built-in backends and their aliases.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("s3", S3Backend::boxed);
        registry.register("aws", S3Backend::boxed);
        registry.register("gcs", GcsBackend::boxed);
        registry.register("gcp", GcsBackend::boxed);
        registry.register("fs", LocalFsBackend::boxed);
        registry.register("local", LocalFsBackend::boxed);
        registry
    }

    /// Add or replace a backend. Names are matched case-insensitively.
    pub fn register(&mut self, name: &str, constructor: BackendConstructor) {
        self.constructors
            .insert(name.trim().to_ascii_lowercase(), constructor);
    }

    /// Construct the backend registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BucketError::UnknownBackend`] when nothing is registered
    /// under that name.
    pub fn resolve(&self, name: &str) -> BucketResult<BoxedStorageBackend> {
        self.constructors
            .get(&name.trim().to_ascii_lowercase())
            .map(|constructor| constructor())
            .ok_or_else(|| BucketError::UnknownBackend(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors
            .contains_key(&name.trim().to_ascii_lowercase())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}
