use std::path::PathBuf;

use anyhow::Context;
use axum::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::debug;

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpeg", "jpg", "png", "gif"];

/// A file field lifted out of a multipart body.
#[derive(Debug)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Returns the lowercased extension when both the filename extension and the
/// declared content type are on the image allowlist.
pub fn image_extension(filename: Option<&str>, content_type: Option<&str>) -> Option<String> {
    let ext = filename.and_then(|f| f.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()))?;
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    match content_type {
        Some("image/jpeg" | "image/jpg" | "image/png" | "image/gif") => Some(ext),
        _ => None,
    }
}

/// Collision-resistant stored name: upload instant in millis plus a random
/// suffix, keeping only the vetted extension from the original name.
pub fn random_image_name(ext: &str) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("{}-{}.{}", millis, rand::random::<u32>(), ext)
}

#[async_trait]
pub trait UploadStore: Send + Sync {
    async fn save(&self, filename: &str, body: Bytes) -> anyhow::Result<()>;
    async fn remove(&self, filename: &str) -> anyhow::Result<()>;

    fn public_url(&self, filename: &str) -> String {
        format!("/uploads/{filename}")
    }
}

#[derive(Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub async fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        Ok(Self { root })
    }
}

#[async_trait]
impl UploadStore for DiskStore {
    async fn save(&self, filename: &str, body: Bytes) -> anyhow::Result<()> {
        let path = self.root.join(filename);
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write upload {}", path.display()))?;
        debug!(file = %path.display(), bytes = body.len(), "upload stored");
        Ok(())
    }

    async fn remove(&self, filename: &str) -> anyhow::Result<()> {
        let path = self.root.join(filename);
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("remove upload {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extension_requires_both_checks() {
        assert_eq!(
            image_extension(Some("beach.JPG"), Some("image/jpeg")),
            Some("jpg".into())
        );
        assert_eq!(
            image_extension(Some("pic.png"), Some("image/png")),
            Some("png".into())
        );
        // extension ok, mime not
        assert_eq!(image_extension(Some("pic.png"), Some("text/html")), None);
        // mime ok, extension not
        assert_eq!(image_extension(Some("script.svg"), Some("image/png")), None);
        assert_eq!(image_extension(Some("noext"), Some("image/png")), None);
        assert_eq!(image_extension(None, Some("image/png")), None);
    }

    #[test]
    fn random_names_keep_extension_and_differ() {
        let a = random_image_name("png");
        let b = random_image_name("png");
        assert!(a.ends_with(".png"));
        assert!(b.ends_with(".png"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn disk_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("triplog-test-{}", rand::random::<u32>()));
        let store = DiskStore::new(&dir).await.expect("create store");

        let name = random_image_name("jpg");
        store
            .save(&name, Bytes::from_static(b"not really a jpeg"))
            .await
            .expect("save");
        assert!(dir.join(&name).exists());
        assert_eq!(store.public_url(&name), format!("/uploads/{name}"));

        store.remove(&name).await.expect("remove");
        assert!(!dir.join(&name).exists());
        assert!(store.remove(&name).await.is_err());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
