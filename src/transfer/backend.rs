// src/transfer/backend.rs

//! Storage backends for artifact archives
//!
//! The transfer engine is polymorphic over a small capability set: store a
//! blob at a key, retrieve a blob by key, list keys under a prefix. Two
//! backends exist: a local-directory store for prototyping and tests, and
//! an S3-compatible object store for CI. Selection is an environment
//! toggle, never a code path inside the engine.

use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{Config, ENV_BUCKET, ENV_STAGING_DIR};
use crate::error::{Error, Result};

/// Blob storage capability set for artifact archives
pub trait ArtifactStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Store the file at `source` under `key`
    fn put(&self, key: &str, source: &Path) -> Result<()>;

    /// Retrieve the blob at `key` into `dest`
    ///
    /// A missing key is `Error::NotFoundError`, distinct from transient
    /// transfer failures - the engine does not retry it.
    fn get(&self, key: &str, dest: &Path) -> Result<()>;

    /// Keys under `prefix`
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Whether `key` is present
    fn exists(&self, key: &str) -> Result<bool>;
}

/// Directory-rooted store for prototyping and restartable local runs
#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", root.display())))?;
        Ok(Self { root })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        // Keys use '/' separators; join componentwise for portability
        let mut path = self.root.clone();
        for part in key.split('/') {
            path.push(part);
        }
        path
    }
}

impl ArtifactStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    fn put(&self, key: &str, source: &Path) -> Result<()> {
        let dest = self.key_path(key);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", parent.display())))?;
        }
        std::fs::copy(source, &dest)
            .map_err(|e| Error::TransferError(format!("Failed to store {key}: {e}")))?;
        debug!("Stored {} at {}", key, dest.display());
        Ok(())
    }

    fn get(&self, key: &str, dest: &Path) -> Result<()> {
        let source = self.key_path(key);
        if !source.is_file() {
            return Err(Error::NotFoundError(key.to_string()));
        }
        std::fs::copy(&source, dest)
            .map_err(|e| Error::TransferError(format!("Failed to retrieve {key}: {e}")))?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1) {
            let entry = entry
                .map_err(|e| Error::IoError(format!("Failed to walk {}: {e}", self.root.display())))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| Error::IoError(format!("Path outside store root: {e}")))?;
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.key_path(key).is_file())
    }
}

/// S3-compatible object store for CI runs
pub struct S3Store {
    bucket: Box<Bucket>,
    label: String,
}

impl S3Store {
    /// Connect to a bucket
    ///
    /// Credentials come from the standard AWS environment/profile chain.
    /// A custom endpoint selects S3-compatible services.
    pub fn new(bucket_name: &str, region: Option<&str>, endpoint: Option<&str>) -> Result<Self> {
        let region = match (region, endpoint) {
            (r, Some(endpoint)) => Region::Custom {
                region: r.unwrap_or("us-east-1").to_string(),
                endpoint: endpoint.to_string(),
            },
            (Some(r), None) => r
                .parse()
                .map_err(|e| Error::ConfigError(format!("Invalid region '{r}': {e}")))?,
            (None, None) => Region::UsEast1,
        };
        let credentials = Credentials::default()
            .map_err(|e| Error::ConfigError(format!("No object storage credentials: {e}")))?;
        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| Error::ConfigError(format!("Cannot open bucket {bucket_name}: {e}")))?;

        Ok(Self {
            bucket,
            label: format!("s3://{bucket_name}"),
        })
    }
}

impl ArtifactStore for S3Store {
    fn name(&self) -> &str {
        &self.label
    }

    fn put(&self, key: &str, source: &Path) -> Result<()> {
        let data = std::fs::read(source)
            .map_err(|e| Error::IoError(format!("Failed to read {}: {e}", source.display())))?;
        let response = self
            .bucket
            .put_object(key, &data)
            .map_err(|e| Error::TransferError(format!("Upload of {key} failed: {e}")))?;
        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(Error::TransferError(format!(
                "Upload of {key} failed: HTTP {status}"
            )));
        }
        Ok(())
    }

    fn get(&self, key: &str, dest: &Path) -> Result<()> {
        let response = match self.bucket.get_object(key) {
            Ok(response) => response,
            Err(S3Error::HttpFailWithBody(404, _)) => {
                return Err(Error::NotFoundError(key.to_string()))
            }
            Err(e) => return Err(Error::TransferError(format!("Download of {key} failed: {e}"))),
        };
        std::fs::write(dest, response.bytes())
            .map_err(|e| Error::IoError(format!("Failed to write {}: {e}", dest.display())))?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let pages = self
            .bucket
            .list(prefix.to_string(), None)
            .map_err(|e| Error::TransferError(format!("List of {prefix} failed: {e}")))?;
        let mut keys: Vec<String> = pages
            .into_iter()
            .flat_map(|page| page.contents.into_iter().map(|object| object.key))
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.list(key)?.iter().any(|k| k == key))
    }
}

/// Select a backend from the environment
///
/// The local staging directory toggle wins; otherwise the configured
/// bucket. Neither set is a configuration error naming both variables.
pub fn store_from_env(config: &Config) -> Result<Box<dyn ArtifactStore>> {
    if let Some(dir) = &config.staging_dir {
        debug!("Using local artifact store at {}", dir.display());
        return Ok(Box::new(LocalStore::new(dir.clone())?));
    }
    match &config.bucket {
        Some(bucket) => Ok(Box::new(S3Store::new(
            bucket,
            config.region.as_deref(),
            config.endpoint.as_deref(),
        )?)),
        None => Err(Error::ConfigError(format!(
            "No artifact store configured: set {ENV_STAGING_DIR} for a local store or {ENV_BUCKET} for object storage"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_store_put_get_roundtrip() {
        let temp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp.path().join("store")).unwrap();

        let source = temp.path().join("blob.tar.xz");
        std::fs::write(&source, b"archive bytes").unwrap();
        store.put("123-linux/gfx942/blas-lib.tar.xz", &source).unwrap();

        let dest = temp.path().join("fetched.tar.xz");
        store.get("123-linux/gfx942/blas-lib.tar.xz", &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"archive bytes");
    }

    #[test]
    fn test_local_store_missing_key_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp.path()).unwrap();
        let err = store
            .get("123-linux/generic/ghost.tar.xz", &temp.path().join("x"))
            .unwrap_err();
        assert!(
            matches!(err, Error::NotFoundError(_)),
            "missing blob must map to NotFoundError, got {err}"
        );
    }

    #[test]
    fn test_local_store_list_by_prefix() {
        let temp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp.path().join("store")).unwrap();
        let source = temp.path().join("blob");
        std::fs::write(&source, b"x").unwrap();

        store.put("run-a/generic/core-lib.tar.xz", &source).unwrap();
        store.put("run-a/gfx942/blas-lib.tar.xz", &source).unwrap();
        store.put("run-b/generic/core-lib.tar.xz", &source).unwrap();

        let keys = store.list("run-a/").unwrap();
        assert_eq!(
            keys,
            vec![
                "run-a/generic/core-lib.tar.xz",
                "run-a/gfx942/blas-lib.tar.xz"
            ]
        );
        assert!(store.exists("run-b/generic/core-lib.tar.xz").unwrap());
        assert!(!store.exists("run-b/generic/ghost.tar.xz").unwrap());
    }

    #[test]
    fn test_store_from_env_prefers_staging_dir() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            staging_dir: Some(temp.path().to_path_buf()),
            bucket: Some("ignored".to_string()),
            ..Config::default()
        };
        let store = store_from_env(&config).unwrap();
        assert_eq!(store.name(), "local");
    }

    #[test]
    fn test_store_from_env_requires_some_backend() {
        let err = store_from_env(&Config::default()).err().unwrap();
        let message = err.to_string();
        assert!(
            message.contains(ENV_STAGING_DIR) && message.contains(ENV_BUCKET),
            "error should name both toggles, got: {message}"
        );
    }
}
