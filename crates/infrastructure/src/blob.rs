use std::path::{Path, PathBuf};

use application::{BlobStore, BlobStoreError, ImageUpload};
use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

/// 写入本地目录的上传文件，通过静态文件路由对外提供。
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
    max_bytes: usize,
}

impl LocalBlobStore {
    pub async fn new(
        root: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
        max_bytes: usize,
    ) -> Result<Self, BlobStoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|err| {
            BlobStoreError::Io(format!(
                "failed to create upload directory '{}': {err}",
                root.display()
            ))
        })?;
        tracing::info!(path = %root.display(), "上传目录已就绪");

        Ok(Self {
            root,
            public_base_url: public_base_url.into().trim_end_matches('/').to_owned(),
            max_bytes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, image: &ImageUpload) -> Result<String, BlobStoreError> {
        if image.bytes.len() > self.max_bytes {
            return Err(BlobStoreError::TooLarge {
                limit: self.max_bytes,
            });
        }

        // 文件名由服务端生成，不使用客户端提供的名字
        let file_name = format!("{}.{}", Uuid::new_v4(), image.format.extension());
        let path = self.root.join(&file_name);
        fs::write(&path, &image.bytes)
            .await
            .map_err(|err| BlobStoreError::Io(format!("failed to write {file_name}: {err}")))?;

        tracing::debug!(file = %file_name, size = image.bytes.len(), "保存上传文件");
        Ok(format!("{}/{}", self.public_base_url, file_name))
    }
}
