use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{BackendError, Bucket, ObjectStore, encode_object_path};

/// Route prefix under which the server exposes `root`.
pub const FILES_ROUTE: &str = "/files";

/// Buckets as subdirectories of a local root, served by the HTTP layer.
pub struct LocalFiles {
    root: PathBuf,
    url_prefix: String,
}

impl LocalFiles {
    pub fn new(root: PathBuf, public_base_url: Option<&str>) -> Self {
        let base = public_base_url.unwrap_or("").trim_end_matches('/');
        LocalFiles {
            root,
            url_prefix: format!("{base}{FILES_ROUTE}"),
        }
    }

    pub async fn ensure_buckets(&self) -> Result<(), BackendError> {
        for bucket in Bucket::ALL {
            tokio::fs::create_dir_all(self.root.join(bucket.as_str())).await?;
        }
        Ok(())
    }

    fn object_path(&self, bucket: Bucket, name: &str) -> Result<PathBuf, BackendError> {
        let rel = Path::new(name);
        let plain = !name.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(BackendError::InvalidInput(format!(
                "object name not allowed: {name}"
            )));
        }
        Ok(self.root.join(bucket.as_str()).join(rel))
    }
}

#[async_trait]
impl ObjectStore for LocalFiles {
    async fn upload(
        &self,
        bucket: Bucket,
        name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
        _bearer: Option<&str>,
    ) -> Result<(), BackendError> {
        let path = self.object_path(bucket, name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "stored object");
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.url_prefix,
            bucket.as_str(),
            encode_object_path(name)
        )
    }
}
