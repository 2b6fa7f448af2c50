//! Blob storage for uploaded lead documents and appraisal reports
use crate::error::LeadError;
use std::sync::Arc;
use tracing::warn;

pub trait BlobStore: Send + Sync {
    /// Stores `bytes` and returns a URL the dashboards can link to.
    fn put(&self, path: &str, bytes: &[u8]) -> Result<String, LeadError>;
}

/// Content-addressed blobs: the key is the sha256 digest of the bytes.
pub struct SledBlobStore {
    tree: sled::Tree,
    url_prefix: String,
}

impl SledBlobStore {
    pub fn new(instance: Arc<sled::Db>, url_prefix: &str) -> Result<Self, LeadError> {
        let tree = instance.open_tree("blobs")?;
        Ok(Self {
            tree,
            url_prefix: url_prefix.to_string(),
        })
    }

    pub fn fetch(&self, digest: &str) -> Result<Vec<u8>, LeadError> {
        self.tree
            .get(digest.as_bytes())?
            .map(|v| v.to_vec())
            .ok_or_else(|| LeadError::NotFound(digest.to_string()))
    }
}

impl BlobStore for SledBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<String, LeadError> {
        let digest = sha256::digest(bytes);
        self.tree.insert(digest.as_bytes(), bytes)?;
        Ok(format!("{}{}/{}", self.url_prefix, digest, path))
    }
}

pub fn placeholder_url(path: &str) -> String {
    format!("placeholder://{path}")
}

/// Uploads never block the workflow: a failed put yields a placeholder URL.
pub fn put_or_placeholder(store: &dyn BlobStore, path: &str, bytes: &[u8]) -> String {
    match store.put(path, bytes) {
        Ok(url) => url,
        Err(err) => {
            warn!(path, error = %err, "blob upload failed, using placeholder url");
            placeholder_url(path)
        }
    }
}
