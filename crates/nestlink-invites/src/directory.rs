//! Resource preview lookup.
//!
//! The host application owns the resource catalog; this seam lets it
//! supply the display data shown to a redeemer previewing a valid
//! invite. A static in-memory directory ships for tests and development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use nestlink_core::ResourcePreview;

/// Lookup of redeemer-safe resource previews.
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    /// Preview for a resource id, or `None` if the catalog has no entry.
    async fn preview(&self, resource_id: Uuid) -> Option<ResourcePreview>;
}

/// In-memory directory backed by a map.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    entries: RwLock<HashMap<Uuid, String>>,
}

impl StaticDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a display name for a resource.
    pub async fn insert(&self, resource_id: Uuid, display_name: impl Into<String>) {
        self.entries
            .write()
            .await
            .insert(resource_id, display_name.into());
    }
}

#[async_trait]
impl ResourceDirectory for StaticDirectory {
    async fn preview(&self, resource_id: Uuid) -> Option<ResourcePreview> {
        self.entries
            .read()
            .await
            .get(&resource_id)
            .map(|name| ResourcePreview {
                resource_id,
                display_name: name.clone(),
            })
    }
}

/// Shared directory handle.
pub type SharedDirectory = Arc<dyn ResourceDirectory>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_directory_lookup() {
        let directory = StaticDirectory::new();
        let id = Uuid::new_v4();
        directory.insert(id, "Lakeside Cottage").await;

        let preview = directory.preview(id).await.unwrap();
        assert_eq!(preview.display_name, "Lakeside Cottage");
        assert_eq!(preview.resource_id, id);

        assert!(directory.preview(Uuid::new_v4()).await.is_none());
    }
}
