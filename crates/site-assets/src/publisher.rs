//! Save path that prefers the upload server and falls back to inline storage.

use crate::store::AssetStore;
use crate::upload::UploadClient;
use crate::validate::validate_file;
use site_types::{AssetCategory, AssetError, AssetRecord, UploadError};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(12);

/// Where an image ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredAsset {
    /// Stored on the upload server under this path.
    Remote { file_path: String },
    /// Stored inline in the asset registry.
    Inline(AssetRecord),
}

impl StoredAsset {
    /// Value to put in a content record's image field.
    pub fn reference(&self) -> &str {
        match self {
            StoredAsset::Remote { file_path } => file_path,
            StoredAsset::Inline(record) => &record.filename,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, StoredAsset::Remote { .. })
    }
}

pub struct AssetPublisher {
    assets: Arc<AssetStore>,
    client: Option<Arc<dyn UploadClient>>,
    timeout: Duration,
}

impl AssetPublisher {
    pub fn new(assets: Arc<AssetStore>, client: Option<Arc<dyn UploadClient>>) -> Self {
        Self {
            assets,
            client,
            timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn assets(&self) -> &Arc<AssetStore> {
        &self.assets
    }

    async fn try_upload(
        &self,
        client: &dyn UploadClient,
        bytes: &[u8],
        mime_type: &str,
        original_name: &str,
        category: AssetCategory,
    ) -> Result<String, UploadError> {
        let call = client.upload(bytes.to_vec(), mime_type, original_name, category);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(UploadError::Timeout(self.timeout)),
        }
    }

    /// Validate, try the upload server, and on any network failure or timeout
    /// store the image inline instead. Only validation and inline-storage errors
    /// reach the caller.
    pub async fn publish(
        &self,
        bytes: &[u8],
        mime_type: &str,
        original_name: &str,
        category: AssetCategory,
    ) -> Result<StoredAsset, AssetError> {
        validate_file(bytes.len(), mime_type, self.assets.max_file_size())?;
        if let Some(client) = &self.client {
            match self
                .try_upload(client.as_ref(), bytes, mime_type, original_name, category)
                .await
            {
                Ok(file_path) => {
                    tracing::info!(file_path = %file_path, "asset uploaded to server");
                    return Ok(StoredAsset::Remote { file_path });
                }
                Err(e) => {
                    tracing::debug!(error = %e, "upload server unavailable, storing inline");
                }
            }
        }
        let record = self
            .assets
            .save_asset(bytes, mime_type, original_name, category)?;
        Ok(StoredAsset::Inline(record))
    }

    /// Delete by reference: `/uploads/...` paths go to the server, anything
    /// else is an inline registry filename.
    pub async fn remove(&self, reference: &str) -> Result<(), AssetError> {
        if reference.starts_with("/uploads/") {
            if let Some(client) = &self.client {
                match tokio::time::timeout(self.timeout, client.delete(reference)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::debug!(error = %e, path = %reference, "remote delete failed"),
                    Err(_) => tracing::debug!(path = %reference, "remote delete timed out"),
                }
            }
            return Ok(());
        }
        self.assets.delete_asset(reference)
    }

    pub async fn remote_available(&self) -> bool {
        let Some(client) = &self.client else {
            return false;
        };
        matches!(
            tokio::time::timeout(self.timeout, client.health()).await,
            Ok(Ok(()))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use site_storage::InMemoryKvStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Fail,
        Hang,
        Succeed,
    }

    struct MockUploadClient {
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl MockUploadClient {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }

        async fn respond<T>(&self, ok: T) -> Result<T, UploadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Fail => Err(UploadError::Network("connection refused".to_string())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(ok)
                }
                Behaviour::Succeed => Ok(ok),
            }
        }
    }

    #[async_trait::async_trait]
    impl UploadClient for MockUploadClient {
        async fn upload(
            &self,
            _bytes: Vec<u8>,
            _mime_type: &str,
            original_name: &str,
            folder: AssetCategory,
        ) -> Result<String, UploadError> {
            self.respond(format!("/uploads/{}/{}", folder, original_name))
                .await
        }

        async fn delete(&self, _file_path: &str) -> Result<(), UploadError> {
            self.respond(()).await
        }

        async fn health(&self) -> Result<(), UploadError> {
            self.respond(()).await
        }
    }

    fn publisher(client: Option<Arc<MockUploadClient>>) -> AssetPublisher {
        let assets = Arc::new(AssetStore::new(Arc::new(InMemoryKvStore::new())));
        let client = client.map(|c| c as Arc<dyn UploadClient>);
        AssetPublisher::new(assets, client).with_timeout(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn network_failure_falls_back_to_inline() {
        let mock = MockUploadClient::new(Behaviour::Fail);
        let publisher = publisher(Some(mock.clone()));
        let stored = publisher
            .publish(&[1, 2, 3], "image/png", "a.png", AssetCategory::Team)
            .await
            .unwrap();
        assert!(!stored.is_remote());
        assert!(stored.reference().starts_with("team/"));
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
        assert_eq!(publisher.assets().get_all_assets().len(), 1);
    }

    #[tokio::test]
    async fn slow_server_times_out_into_inline() {
        let publisher = publisher(Some(MockUploadClient::new(Behaviour::Hang)));
        let stored = publisher
            .publish(&[1, 2, 3], "image/jpeg", "a.jpg", AssetCategory::Gallery)
            .await
            .unwrap();
        assert!(matches!(stored, StoredAsset::Inline(ref r) if r.filename.ends_with(".jpg")));
        assert!(!publisher.remote_available().await);
    }

    #[tokio::test]
    async fn successful_upload_skips_the_registry() {
        let publisher = publisher(Some(MockUploadClient::new(Behaviour::Succeed)));
        let stored = publisher
            .publish(&[1, 2, 3], "image/png", "logo.png", AssetCategory::Clients)
            .await
            .unwrap();
        assert_eq!(stored.reference(), "/uploads/clients/logo.png");
        assert!(publisher.assets().get_all_assets().is_empty());
        assert!(publisher.remote_available().await);
        publisher.remove(stored.reference()).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_files_never_reach_the_network() {
        let mock = MockUploadClient::new(Behaviour::Succeed);
        let publisher = publisher(Some(mock.clone()));
        let err = publisher
            .publish(b"<html>", "text/html", "x.html", AssetCategory::General)
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::InvalidFile(_)));
        assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn without_a_client_everything_is_inline() {
        let publisher = publisher(None);
        let stored = publisher
            .publish(&[9; 10], "image/webp", "w.webp", AssetCategory::General)
            .await
            .unwrap();
        assert!(!publisher.remote_available().await);
        publisher.remove(stored.reference()).await.unwrap();
        assert!(publisher.assets().get_all_assets().is_empty());
    }
}
