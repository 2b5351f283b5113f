//! Storage backend abstraction for object storage (S3/MinIO, local, memory).
//!
//! The pipeline only needs three capabilities from a store: list a prefix,
//! read an object, and overwrite an object. Existence checks are implied by
//! `get` returning [`Error::NotFound`] and by `list` returning an empty vec.
//!
//! ## Prefix semantics
//!
//! Prefixes are directory-like (`silver_layer/`). Object-store backends list
//! by path segment, so a prefix that stops in the middle of a segment is not
//! supported.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, PutPayload};

use crate::error::{Error, Result};

/// Metadata about a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object path (key).
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification timestamp, when the backend reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Storage backend trait for object storage.
///
/// All backends (S3-compatible, local directory, memory) implement this trait.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads an entire object.
    ///
    /// Returns `Error::NotFound` if the object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes an object, replacing any previous content at `path`.
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;

    /// Lists objects under the given prefix.
    ///
    /// Returns an empty vec if no objects match. Order is backend-defined;
    /// use [`StorageBackend::list_sorted`] when order matters.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Lists objects under the prefix, ordered by key.
    async fn list_sorted(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let mut objects = self.list(prefix).await?;
        objects.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(objects)
    }
}

/// In-memory storage backend.
///
/// Thread-safe via `RwLock`. Used by tests and by `memory://` store URLs.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored key, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

fn poisoned() -> Error {
    Error::Internal {
        message: "lock poisoned".into(),
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| poisoned())?;

        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {path}")))
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        self.objects.write().map_err(|_| poisoned())?.insert(
            path.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;

        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(path, obj)| ObjectMeta {
                path: path.clone(),
                size: obj.data.len() as u64,
                last_modified: Some(obj.last_modified),
            })
            .collect())
    }
}

/// Connection settings for `s3://` store URLs (AWS S3 or MinIO).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct S3Settings {
    /// Endpoint URL, e.g. `http://minio:9000`.
    pub endpoint: Option<String>,
    /// Access key id.
    pub access_key: Option<String>,
    /// Secret access key.
    pub secret_key: Option<String>,
    /// Region name; defaults to `us-east-1` when unset.
    pub region: Option<String>,
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Settings")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("region", &self.region)
            .finish()
    }
}

impl S3Settings {
    /// Default region used when none is configured.
    pub const DEFAULT_REGION: &'static str = "us-east-1";

    /// Validates that endpoint and credentials are present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` naming the first missing setting.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("endpoint", &self.endpoint),
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
        ];
        for (name, value) in required {
            if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                return Err(Error::InvalidInput(format!(
                    "s3 setting '{name}' is required and cannot be empty"
                )));
            }
        }
        Ok(())
    }

    fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(Self::DEFAULT_REGION)
    }
}

/// Storage backend over any [`ObjectStore`] implementation.
#[derive(Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    location: String,
}

impl fmt::Debug for ObjectStoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreBackend")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl ObjectStoreBackend {
    /// Wraps an existing object store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, location: impl Into<String>) -> Self {
        Self {
            store,
            location: location.into(),
        }
    }

    /// Builds a backend from a store URL.
    ///
    /// Supported forms:
    /// - `memory://`
    /// - `file:///absolute/dir` (created if missing)
    /// - `s3://bucket` (uses `s3` for endpoint, credentials and region)
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for unsupported URLs or invalid S3
    /// settings, and a storage error if the store cannot be constructed.
    pub fn from_url(url: &str, s3: &S3Settings) -> Result<Self> {
        let url = url.trim();
        if url == "memory://" {
            return Ok(Self::new(Arc::new(InMemory::new()), url));
        }

        if let Some(dir) = url.strip_prefix("file://") {
            if dir.is_empty() {
                return Err(Error::InvalidInput(
                    "file:// store URL requires a directory".into(),
                ));
            }
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::io(format!("create store directory {dir}"), e))?;
            let local = LocalFileSystem::new_with_prefix(dir)
                .map_err(|e| Error::storage_with_source(format!("open {url}"), e))?;
            return Ok(Self::new(Arc::new(local), url));
        }

        if let Some(bucket) = url.strip_prefix("s3://") {
            let bucket = bucket.trim_end_matches('/');
            if bucket.is_empty() {
                return Err(Error::InvalidInput("s3:// store URL requires a bucket".into()));
            }
            s3.validate()?;
            let endpoint = s3.endpoint.as_deref().unwrap_or_default();
            let store = AmazonS3Builder::new()
                .with_bucket_name(bucket)
                .with_region(s3.region())
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"))
                .with_access_key_id(s3.access_key.as_deref().unwrap_or_default())
                .with_secret_access_key(s3.secret_key.as_deref().unwrap_or_default())
                .build()
                .map_err(|e| Error::storage_with_source(format!("open {url}"), e))?;
            tracing::info!(bucket, endpoint, "initialized s3 object store");
            return Ok(Self::new(Arc::new(store), url));
        }

        Err(Error::InvalidInput(format!(
            "unsupported store URL '{url}' (expected memory://, file:// or s3://)"
        )))
    }
}

/// Converts a key to a store path without percent-encoding its segments.
///
/// Stores report listed locations in this raw form, so a key returned by
/// [`StorageBackend::list`] can be passed back to `get` unchanged.
fn store_path(path: &str) -> Result<StorePath> {
    StorePath::parse(path.trim_matches('/'))
        .map_err(|e| Error::InvalidInput(format!("invalid object key '{path}': {e}")))
}

fn map_store_error(op: &str, path: &str, err: object_store::Error) -> Error {
    match err {
        object_store::Error::NotFound { .. } => {
            Error::NotFound(format!("object not found: {path}"))
        }
        other => Error::storage_with_source(format!("{op} {path} failed"), other),
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let result = self
            .store
            .get(&store_path(path)?)
            .await
            .map_err(|e| map_store_error("get", path, e))?;
        result
            .bytes()
            .await
            .map_err(|e| map_store_error("read", path, e))
    }

    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        self.store
            .put(&store_path(path)?, PutPayload::from(data))
            .await
            .map_err(|e| map_store_error("put", path, e))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let prefix_path = store_path(prefix)?;
        let prefix_arg = if prefix_path.as_ref().is_empty() {
            None
        } else {
            Some(&prefix_path)
        };

        let objects: Vec<object_store::ObjectMeta> = self
            .store
            .list(prefix_arg)
            .try_collect()
            .await
            .map_err(|e| map_store_error("list", prefix, e))?;

        Ok(objects
            .into_iter()
            .map(|meta| ObjectMeta {
                path: meta.location.to_string(),
                size: meta.size as u64,
                last_modified: Some(meta.last_modified),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_roundtrip() {
        let backend = MemoryBackend::new();
        let data = Bytes::from("hello world");

        backend
            .put("test/file.json", data.clone())
            .await
            .expect("put should succeed");

        let retrieved = backend
            .get("test/file.json")
            .await
            .expect("get should succeed");
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn memory_backend_put_overwrites() {
        let backend = MemoryBackend::new();
        backend.put("a.json", Bytes::from("v1")).await.unwrap();
        backend.put("a.json", Bytes::from("v2")).await.unwrap();

        assert_eq!(backend.get("a.json").await.unwrap(), Bytes::from("v2"));
        assert_eq!(backend.keys(), vec!["a.json".to_string()]);
    }

    #[tokio::test]
    async fn memory_backend_missing_object_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.get("missing.json").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_with_prefix() {
        let backend = MemoryBackend::new();
        backend.put("a/2.json", Bytes::from("a2")).await.unwrap();
        backend.put("a/1.json", Bytes::from("a1")).await.unwrap();
        backend.put("b/1.json", Bytes::from("b1")).await.unwrap();

        let list_a = backend.list_sorted("a/").await.expect("should succeed");
        let paths: Vec<&str> = list_a.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["a/1.json", "a/2.json"]);
        assert_eq!(list_a[0].size, 2);

        assert!(backend.list("c/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn object_store_backend_memory_url() {
        let backend = ObjectStoreBackend::from_url("memory://", &S3Settings::default())
            .expect("memory store");

        backend
            .put("silver_layer/ca/breweries_ca.parquet", Bytes::from("pq"))
            .await
            .unwrap();
        backend
            .put("golden_layer/out.parquet", Bytes::from("gold"))
            .await
            .unwrap();

        let listed = backend.list_sorted("silver_layer/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "silver_layer/ca/breweries_ca.parquet");
        assert_eq!(listed[0].size, 2);

        let err = backend.get("silver_layer/missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn object_store_backend_local_directory() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}", dir.path().join("lake").display());
        let backend = ObjectStoreBackend::from_url(&url, &S3Settings::default()).unwrap();

        backend
            .put("bronze_layer/raw/b.json", Bytes::from("[]"))
            .await
            .unwrap();

        assert!(dir.path().join("lake/bronze_layer/raw/b.json").exists());
        assert_eq!(
            backend.get("bronze_layer/raw/b.json").await.unwrap(),
            Bytes::from("[]")
        );
    }

    async fn listed_keys_read_back(backend: &ObjectStoreBackend) {
        let keys = [
            "silver_layer/kärnten/breweries_kärnten.parquet",
            "bronze_layer/raw/café brews.json",
        ];
        for key in keys {
            backend.put(key, Bytes::from(key)).await.unwrap();
        }

        let listed: Vec<String> = backend
            .list_sorted("")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.path)
            .collect();
        assert_eq!(listed, vec![keys[1].to_string(), keys[0].to_string()]);

        for key in &listed {
            assert_eq!(backend.get(key).await.unwrap(), Bytes::from(key.clone()));
        }
        let under = backend.list("silver_layer/kärnten/").await.unwrap();
        assert_eq!(under.len(), 1);
    }

    #[tokio::test]
    async fn non_ascii_keys_survive_list_then_get_in_memory() {
        let backend = ObjectStoreBackend::from_url("memory://", &S3Settings::default()).unwrap();
        listed_keys_read_back(&backend).await;
    }

    #[tokio::test]
    async fn non_ascii_keys_survive_list_then_get_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}", dir.path().join("lake").display());
        let backend = ObjectStoreBackend::from_url(&url, &S3Settings::default()).unwrap();
        listed_keys_read_back(&backend).await;
        assert!(dir.path().join("lake/silver_layer/kärnten").is_dir());
    }

    #[tokio::test]
    async fn key_with_empty_segment_is_invalid_input() {
        let backend = ObjectStoreBackend::from_url("memory://", &S3Settings::default()).unwrap();
        let err = backend.put("silver_layer//x.parquet", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn s3_url_requires_credentials() {
        let settings = S3Settings {
            endpoint: Some("http://minio:9000".into()),
            access_key: Some("key".into()),
            secret_key: Some("  ".into()),
            region: None,
        };
        let err = ObjectStoreBackend::from_url("s3://datalake", &settings).unwrap_err();
        assert!(err.to_string().contains("secret_key"));
    }

    #[test]
    fn unsupported_url_is_rejected() {
        let err = ObjectStoreBackend::from_url("gs://bucket", &S3Settings::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn s3_settings_debug_redacts_secret() {
        let settings = S3Settings {
            secret_key: Some("hunter2".into()),
            ..S3Settings::default()
        };
        let debug = format!("{settings:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
