//! Native catalog: the node store and blob store wired to local storage.
//!
//! Runs the attachment data flow the UI would otherwise drive: derive a
//! preview, persist the original body, then record the item metadata.

use crate::config::Config;
use crate::json_kv::JsonFileKv;
use crate::native_fs::NativeFs;

use inventory_core::{
    BlobError, BlobStore, BlobWrite, ImageRef, Item, ItemUpdate, Node, NodeId, NodeStore,
    StoreError, ThumbnailError, ThumbnailOptions, generate_thumbnail, source_dimensions,
};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),

    #[error("Item {0} was removed before its details were recorded")]
    ItemVanished(NodeId),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// An attachment body to store alongside a new item.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Everything needed to create an item in one call.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub parent_id: NodeId,
    pub name: String,
    pub tags: BTreeSet<String>,
    pub notes: Option<String>,
    pub attachment: Option<NewAttachment>,
}

pub struct Catalog {
    nodes: NodeStore<JsonFileKv>,
    blobs: BlobStore<NativeFs>,
}

impl Catalog {
    pub fn open(config: &Config) -> Self {
        let nodes = NodeStore::new(JsonFileKv::new(config.state_dir()));
        let blobs = BlobStore::detect(Some(NativeFs::new(config.data_dir.clone())));
        Self { nodes, blobs }
    }

    pub fn nodes(&self) -> &NodeStore<JsonFileKv> {
        &self.nodes
    }

    pub fn blobs(&self) -> &BlobStore<NativeFs> {
        &self.blobs
    }

    /// Render a preview on a blocking worker.
    pub async fn thumbnail(
        &self,
        bytes: Vec<u8>,
        options: ThumbnailOptions,
    ) -> Result<inventory_core::Thumb> {
        let thumb =
            tokio::task::spawn_blocking(move || generate_thumbnail(&bytes, options)).await??;
        Ok(thumb)
    }

    /// Create an item, storing its attachment and preview if one is given.
    pub async fn add_item(&self, new_item: NewItem) -> Result<Item> {
        // Creating first rejects a bad parent before any decoding work
        let node = self
            .nodes
            .create_item(&new_item.parent_id, &new_item.name)
            .await?;
        let item_id = node.id().clone();

        let mut update = ItemUpdate {
            tags: Some(new_item.tags),
            notes: new_item.notes,
            ..Default::default()
        };

        if let Some(attachment) = new_item.attachment {
            // Previews are best effort; non-image attachments are still stored
            let (thumb, dimensions) = if attachment.mime.starts_with("image/") {
                let dimensions = source_dimensions(&attachment.bytes).ok();
                match self
                    .thumbnail(attachment.bytes.clone(), ThumbnailOptions::default())
                    .await
                {
                    Ok(thumb) => (Some(thumb), dimensions),
                    Err(e) => {
                        warn!("No preview for {}: {}", attachment.name, e);
                        (None, dimensions)
                    }
                }
            } else {
                (None, None)
            };

            let file_id = format!("img_{}", uuid::Uuid::new_v4().simple());
            let stored = self
                .blobs
                .write(BlobWrite {
                    item_id: item_id.clone(),
                    file_id: file_id.clone(),
                    name: attachment.name.clone(),
                    mime: attachment.mime.clone(),
                    bytes: attachment.bytes.clone(),
                })
                .await?;

            let image = ImageRef::describe(
                file_id,
                stored.mime(),
                &attachment.bytes,
                dimensions.map(|(w, _)| w),
                dimensions.map(|(_, h)| h),
            )
            .with_uri(stored.uri().map(str::to_string));
            update.images = Some(vec![image]);
            update.thumbs = thumb.map(|t| vec![t]);
        }

        let item = self.record(item_id, update).await?;
        info!("Added item {} ({:?})", item.id, item.name);
        Ok(item)
    }

    /// Write the collected details onto an item that must still exist.
    async fn record(&self, item_id: NodeId, update: ItemUpdate) -> Result<Item> {
        self.nodes
            .update_item(&item_id, update)
            .await?
            .ok_or(CatalogError::ItemVanished(item_id))
    }

    /// Delete a node and remove the stored bodies of every item it took with it.
    pub async fn delete(&self, id: &NodeId) -> Result<Vec<Node>> {
        let removed = self.nodes.delete_node(id).await?;

        let uris = removed
            .iter()
            .filter_map(Node::as_item)
            .flat_map(|item| item.images.iter().flatten())
            .filter_map(|image| image.uri.as_deref());
        for uri in uris {
            if let Err(e) = self.blobs.remove(uri).await {
                warn!("Failed to remove attachment {}: {}", uri, e);
            }
        }
        Ok(removed)
    }
}
