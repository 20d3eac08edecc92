use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::ServiceError;
use crate::backend::{Backend, Bucket};

/// An uploaded image as received from a multipart form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Declared type as a lower-case essence, falling back to a guess from the file name.
    pub fn mime(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .and_then(|c| c.split(';').next())
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty() && c != "application/octet-stream")
            .or_else(|| {
                self.file_name
                    .as_deref()
                    .and_then(|n| mime_guess::from_path(n).first())
                    .map(|m| m.essence_str().to_string())
            })
    }

    pub fn validate(&self, max_bytes: usize) -> Result<String, ServiceError> {
        if self.bytes.is_empty() {
            return Err(ServiceError::invalid("uploaded file is empty"));
        }
        let mime = self
            .mime()
            .filter(|m| m.starts_with("image/"))
            .ok_or_else(|| ServiceError::invalid("uploaded file must be an image"))?;
        if self.bytes.len() > max_bytes {
            return Err(ServiceError::TooLarge(format!(
                "image is {} bytes, limit is {max_bytes}",
                self.bytes.len()
            )));
        }
        Ok(mime)
    }
}

/// `<millis>-<uuid>.<ext>`, with the extension from the original name or the mime type.
pub fn object_name(file_name: Option<&str>, mime: &str, at: DateTime<Utc>) -> String {
    let ext = file_name
        .and_then(|n| std::path::Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .or_else(|| {
            mime_guess::get_mime_extensions_str(mime)
                .and_then(|exts| exts.first())
                .map(|e| e.to_string())
        })
        .unwrap_or_else(|| "bin".to_string());
    format!(
        "{}-{}.{ext}",
        at.timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

/// Validates and stores `image`, returning the stored object name.
pub async fn store_image(
    backend: &Backend,
    bucket: Bucket,
    image: ImageUpload,
    max_bytes: usize,
    bearer: Option<&str>,
) -> Result<String, ServiceError> {
    let mime = image.validate(max_bytes)?;
    let name = object_name(image.file_name.as_deref(), &mime, Utc::now());
    backend
        .files
        .upload(bucket, &name, image.bytes, &mime, bearer)
        .await?;
    tracing::debug!(bucket = bucket.as_str(), object = %name, "image stored");
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: Option<&str>, ct: Option<&str>, len: usize) -> ImageUpload {
        ImageUpload {
            file_name: name.map(str::to_string),
            content_type: ct.map(str::to_string),
            bytes: vec![0u8; len],
        }
    }

    #[test]
    fn accepts_images_by_declared_or_guessed_type() {
        assert_eq!(
            upload(Some("bukti.png"), Some("image/png"), 10).validate(100).unwrap(),
            "image/png"
        );
        assert_eq!(
            upload(Some("bukti.JPG"), None, 10).validate(100).unwrap(),
            "image/jpeg"
        );
    }

    #[test]
    fn declared_type_is_case_insensitive() {
        assert_eq!(
            upload(Some("bukti"), Some("IMAGE/PNG"), 10).validate(100).unwrap(),
            "image/png"
        );
        assert_eq!(
            upload(Some("bukti"), Some(" Image/Jpeg; name=x "), 10).validate(100).unwrap(),
            "image/jpeg"
        );
        assert_eq!(
            upload(Some("bukti.webp"), Some("Application/Octet-Stream"), 10)
                .validate(100)
                .unwrap(),
            "image/webp"
        );
    }

    #[test]
    fn rejects_non_images_empty_and_oversized() {
        assert!(matches!(
            upload(Some("bukti.pdf"), Some("application/pdf"), 10).validate(100),
            Err(ServiceError::Invalid(_))
        ));
        assert!(matches!(
            upload(Some("bukti.png"), Some("image/png"), 0).validate(100),
            Err(ServiceError::Invalid(_))
        ));
        assert!(matches!(
            upload(Some("bukti.png"), Some("image/png"), 101).validate(100),
            Err(ServiceError::TooLarge(_))
        ));
    }

    #[test]
    fn object_names_are_unique_and_keep_extension() {
        let at = DateTime::from_timestamp_millis(1_760_000_000_123).unwrap();
        let a = object_name(Some("Bukti Transfer.PNG"), "image/png", at);
        let b = object_name(Some("Bukti Transfer.PNG"), "image/png", at);
        assert!(a.starts_with("1760000000123-"));
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
        assert!(!a.contains(' '));
    }

    #[test]
    fn object_name_falls_back_to_mime_extension() {
        let at = Utc::now();
        let name = object_name(None, "image/png", at);
        assert!(name.ends_with(".png"), "{name}");
        let name = object_name(Some("noext"), "application/x-unknown-thing", at);
        assert!(name.ends_with(".bin"), "{name}");
    }
}
