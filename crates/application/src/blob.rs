//! 上传文件的校验与存储抽象。

use async_trait::async_trait;
use domain::DomainError;
use thiserror::Error;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("blob io error: {0}")]
    Io(String),
    #[error("blob exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// 存放上传的二进制内容并返回可访问的 URL。
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, image: &ImageUpload) -> Result<String, BlobStoreError>;
}

/// multipart 表单里的一个文件字段。
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }
}

/// 校验通过的图片。
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

/// 扩展名和声明的 content type 都必须是 JPEG/PNG，且不超过 `max_bytes`。
pub fn validate_image(file: UploadedFile, max_bytes: usize) -> Result<ImageUpload, DomainError> {
    let extension = file
        .file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let content_type = file.content_type.to_ascii_lowercase();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str())
        || !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str())
    {
        return Err(DomainError::invalid_argument(
            file.field,
            "Only JPEG or PNG images are allowed",
        ));
    }
    if file.bytes.is_empty() {
        return Err(DomainError::invalid_argument(file.field, "file is empty"));
    }
    if file.bytes.len() > max_bytes {
        return Err(DomainError::invalid_argument(
            file.field,
            "File size must be less than 5MB",
        ));
    }

    let format = if content_type == "image/png" {
        ImageFormat::Png
    } else {
        ImageFormat::Jpeg
    };
    Ok(ImageUpload {
        format,
        bytes: file.bytes,
    })
}
