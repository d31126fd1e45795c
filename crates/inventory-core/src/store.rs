//! NodeStore: the folder/item tree and its persistence.
//!
//! Every operation runs a full load → validate → mutate → persist cycle
//! against the injected key-value collaborator. Mutations are pure in-memory
//! transforms of `InventoryState`; the whole document is written back once
//! they are applied.
//!
//! Calls on one `NodeStore` are serialized by an async single-writer lock, so
//! overlapping callers sharing a store cannot lose each other's writes.
//! Separate processes writing the same key still race.

use crate::kv::{KeyValueStore, KvError};
use crate::node::{
    Folder, ImageRef, InventoryState, Item, Node, NodeId, NodeKind, SCHEMA_VERSION, Thumb,
};

use futures::lock::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Key under which the inventory document is persisted.
pub const STATE_KEY: &str = "inventory_v2";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Invalid parent: {0} is not an existing folder")]
    InvalidParent(NodeId),

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Corrupt inventory state: {0}")]
    Corrupt(String),
}

impl From<KvError> for StoreError {
    fn from(err: KvError) -> Self {
        match err {
            KvError::Unavailable(msg) => StoreError::StorageUnavailable(msg),
            KvError::Codec(msg) => StoreError::Corrupt(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Changes to an item's descriptive fields and attachment metadata.
///
/// `None` leaves a field untouched. An empty value clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemUpdate {
    pub tags: Option<BTreeSet<String>>,
    pub notes: Option<String>,
    pub thumbs: Option<Vec<Thumb>>,
    pub images: Option<Vec<ImageRef>>,
}

impl ItemUpdate {
    fn apply(self, item: &mut Item) {
        if let Some(tags) = self.tags {
            item.tags = (!tags.is_empty()).then_some(tags);
        }
        if let Some(notes) = self.notes {
            item.notes = (!notes.is_empty()).then_some(notes);
        }
        if let Some(thumbs) = self.thumbs {
            item.thumbs = (!thumbs.is_empty()).then_some(thumbs);
        }
        if let Some(images) = self.images {
            item.images = (!images.is_empty()).then_some(images);
        }
    }
}

/// Whether a transform changed the tree and needs persisting.
enum Outcome<T> {
    Changed(T),
    Unchanged(T),
}

/// Owner of the inventory tree.
pub struct NodeStore<K: KeyValueStore> {
    kv: K,
    writer: Mutex<()>,
    last_stamp: AtomicU64,
}

impl<K: KeyValueStore> NodeStore<K> {
    pub fn new(kv: K) -> Self {
        Self {
            kv,
            writer: Mutex::new(()),
            last_stamp: AtomicU64::new(0),
        }
    }

    /// The injected key-value collaborator
    pub fn kv(&self) -> &K {
        &self.kv
    }

    /// Return the current state, creating and persisting a fresh one if none
    /// exists or the stored schema version does not match.
    pub async fn ensure_ready(&self) -> Result<InventoryState> {
        let _guard = self.writer.lock().await;
        self.ready().await
    }

    /// Read the persisted document.
    ///
    /// Returns `None` when nothing is stored or the stored version is not current.
    /// A current-version document that fails to decode or violates the tree
    /// invariants is reported as `Corrupt` rather than discarded.
    pub async fn load(&self) -> Result<Option<InventoryState>> {
        let Some(value) = self.kv.get(STATE_KEY).await? else {
            return Ok(None);
        };

        let version = value.get("version").and_then(Value::as_u64);
        if version != Some(u64::from(SCHEMA_VERSION)) {
            warn!(
                "Ignoring inventory document with schema version {:?} (current is {})",
                version, SCHEMA_VERSION
            );
            return Ok(None);
        }

        let state: InventoryState =
            serde_json::from_value(value).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        state
            .check()
            .map_err(|v| StoreError::Corrupt(v.to_string()))?;
        Ok(Some(state))
    }

    /// Persist the whole document.
    pub async fn save(&self, state: &InventoryState) -> Result<()> {
        let value = serde_json::to_value(state).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        self.kv.set(STATE_KEY, value).await?;
        Ok(())
    }

    /// Look up a single node.
    pub async fn get_node(&self, id: &NodeId) -> Result<Option<Node>> {
        let state = self.ensure_ready().await?;
        Ok(state.get(id).cloned())
    }

    /// Children of a folder in display order.
    ///
    /// Empty if `parent_id` is unknown or not a folder.
    pub async fn get_children(&self, parent_id: &NodeId) -> Result<Vec<Node>> {
        let state = self.ensure_ready().await?;
        Ok(state.children(parent_id).into_iter().cloned().collect())
    }

    pub async fn create_folder(&self, parent_id: &NodeId, name: &str) -> Result<Node> {
        self.apply(|state, now| {
            insert_child(state, parent_id, NodeKind::Folder, name, now).map(Outcome::Changed)
        })
        .await
    }

    pub async fn create_item(&self, parent_id: &NodeId, name: &str) -> Result<Node> {
        self.apply(|state, now| {
            insert_child(state, parent_id, NodeKind::Item, name, now).map(Outcome::Changed)
        })
        .await
    }

    /// Rename a node. Unknown ids are ignored.
    pub async fn rename_node(&self, id: &NodeId, name: &str) -> Result<()> {
        self.apply(|state, now| {
            let Some(node) = state.nodes.get_mut(id) else {
                debug!("rename_node: unknown node {}", id);
                return Ok(Outcome::Unchanged(()));
            };
            node.set_name(name.to_string());
            node.touch(now);
            info!("Renamed {} to {:?}", id, name);
            Ok(Outcome::Changed(()))
        })
        .await
    }

    /// Update an item's tags, notes, and attachment metadata.
    ///
    /// Returns the updated item, or `None` if `id` is unknown or a folder.
    pub async fn update_item(&self, id: &NodeId, update: ItemUpdate) -> Result<Option<Item>> {
        self.apply(|state, now| {
            let Some(Node::Item(item)) = state.nodes.get_mut(id) else {
                debug!("update_item: {} is not an item", id);
                return Ok(Outcome::Unchanged(None));
            };
            update.apply(item);
            item.touch(now);
            Ok(Outcome::Changed(Some(item.clone())))
        })
        .await
    }

    /// Delete a node and, for folders, everything beneath it.
    ///
    /// Returns the removed nodes, descendants before their ancestors. Unknown
    /// ids (and the root) are ignored and return an empty list.
    pub async fn delete_node(&self, id: &NodeId) -> Result<Vec<Node>> {
        self.apply(|state, now| {
            let removed = remove_subtree(state, id, now);
            if removed.is_empty() {
                Ok(Outcome::Unchanged(removed))
            } else {
                info!("Deleted {} ({} node(s))", id, removed.len());
                Ok(Outcome::Changed(removed))
            }
        })
        .await
    }

    /// Move a node under `new_parent_id`, at `index` if given (clamped) or last.
    pub async fn move_node(
        &self,
        id: &NodeId,
        new_parent_id: &NodeId,
        index: Option<usize>,
    ) -> Result<()> {
        self.apply(|state, now| {
            relocate(state, id, new_parent_id, index, now)?;
            info!("Moved {} under {}", id, new_parent_id);
            Ok(Outcome::Changed(()))
        })
        .await
    }

    /// Load or create the state. Caller must hold the writer lock.
    async fn ready(&self) -> Result<InventoryState> {
        if let Some(state) = self.load().await? {
            return Ok(state);
        }
        let state = InventoryState::new(self.stamp());
        self.save(&state).await?;
        info!("Created fresh inventory (schema v{})", SCHEMA_VERSION);
        Ok(state)
    }

    /// Run one load → mutate → persist cycle under the writer lock.
    async fn apply<T>(
        &self,
        transform: impl FnOnce(&mut InventoryState, u64) -> Result<Outcome<T>>,
    ) -> Result<T> {
        let _guard = self.writer.lock().await;
        let mut state = self.ready().await?;
        match transform(&mut state, self.stamp())? {
            Outcome::Unchanged(value) => Ok(value),
            Outcome::Changed(value) => {
                if let Err(violation) = state.check() {
                    return Err(StoreError::Corrupt(violation.to_string()));
                }
                self.save(&state).await?;
                Ok(value)
            }
        }
    }

    /// Wall-clock millis, never lower than the previous stamp plus one.
    fn stamp(&self) -> u64 {
        let now = now_millis();
        let previous = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or_else(|prev| prev);
        now.max(previous + 1)
    }
}

fn now_millis() -> u64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn insert_child(
    state: &mut InventoryState,
    parent_id: &NodeId,
    kind: NodeKind,
    name: &str,
    now: u64,
) -> Result<Node> {
    let Some(parent) = state.folder_mut(parent_id) else {
        return Err(StoreError::InvalidParent(parent_id.clone()));
    };

    let id = NodeId::generate(kind);
    parent.children_order.push(id.clone());
    parent.touch(now);

    let node = match kind {
        NodeKind::Folder => Node::Folder(Folder {
            id: id.clone(),
            name: name.to_string(),
            parent_id: Some(parent_id.clone()),
            children_order: Vec::new(),
            created_at: now,
            updated_at: now,
        }),
        NodeKind::Item => Node::Item(Item {
            id: id.clone(),
            name: name.to_string(),
            parent_id: parent_id.clone(),
            tags: None,
            notes: None,
            thumbs: None,
            images: None,
            created_at: now,
            updated_at: now,
        }),
    };
    state.nodes.insert(id, node.clone());
    info!("Created {:?} {} under {}", kind, node.id(), parent_id);
    Ok(node)
}

/// Remove `id` and its whole subtree, walking with an explicit stack.
fn remove_subtree(state: &mut InventoryState, id: &NodeId, now: u64) -> Vec<Node> {
    if id == &state.root_id {
        warn!("Refusing to delete the root folder");
        return Vec::new();
    }
    let Some(parent_id) = state.get(id).and_then(Node::parent_id).cloned() else {
        return Vec::new();
    };

    // Pre-order walk; reversed it lists every child before its parent
    let mut visited = HashSet::new();
    let mut visit_order = Vec::new();
    let mut stack = vec![id.clone()];
    while let Some(current) = stack.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        if let Some(Node::Folder(folder)) = state.get(&current) {
            stack.extend(folder.children_order.iter().cloned());
        }
        visit_order.push(current);
    }

    let removed: Vec<Node> = visit_order
        .iter()
        .rev()
        .filter_map(|node_id| state.nodes.remove(node_id))
        .collect();

    if let Some(parent) = state.folder_mut(&parent_id) {
        parent.children_order.retain(|child| child != id);
        parent.touch(now);
    }
    removed
}

fn relocate(
    state: &mut InventoryState,
    id: &NodeId,
    new_parent_id: &NodeId,
    index: Option<usize>,
    now: u64,
) -> Result<()> {
    if id == &state.root_id {
        return Err(StoreError::InvalidMove("the root folder cannot be moved".into()));
    }
    let Some(old_parent_id) = state.get(id).and_then(Node::parent_id).cloned() else {
        return Err(StoreError::InvalidMove(format!("unknown node {}", id)));
    };
    if state.folder(new_parent_id).is_none() {
        return Err(StoreError::InvalidMove(format!(
            "{} is not an existing folder",
            new_parent_id
        )));
    }
    if state.is_within(new_parent_id, id) {
        return Err(StoreError::InvalidMove(format!(
            "cannot move {} into itself or its descendant {}",
            id, new_parent_id
        )));
    }

    if let Some(old_parent) = state.folder_mut(&old_parent_id) {
        old_parent.children_order.retain(|child| child != id);
        old_parent.touch(now);
    }

    let Some(new_parent) = state.folder_mut(new_parent_id) else {
        return Err(StoreError::InvalidMove(format!(
            "{} is not an existing folder",
            new_parent_id
        )));
    };
    let len = new_parent.children_order.len();
    let position = index.map_or(len, |i| i.min(len));
    new_parent.children_order.insert(position, id.clone());
    if new_parent_id != &old_parent_id {
        new_parent.touch(now);
    }

    if let Some(node) = state.nodes.get_mut(id) {
        node.set_parent(new_parent_id.clone());
        node.touch(now);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKv;
    use serde_json::json;
    use std::sync::Arc;

    fn root() -> NodeId {
        NodeId::root()
    }

    fn new_store() -> NodeStore<InMemoryKv> {
        NodeStore::new(InMemoryKv::new())
    }

    async fn assert_valid(store: &NodeStore<InMemoryKv>) {
        let state = store.load().await.unwrap().expect("state persisted");
        assert_eq!(state.check(), Ok(()));
    }

    #[tokio::test]
    async fn test_ensure_ready_on_empty_storage() {
        let store = new_store();
        let state = store.ensure_ready().await.unwrap();

        assert_eq!(state.version, 2);
        assert_eq!(state.root_id, root());
        let root_folder = state.root().unwrap();
        assert_eq!(root_folder.name, "All Items");
        assert!(root_folder.children_order.is_empty());
        assert!(root_folder.parent_id.is_none());

        // Persisted under the fixed key
        let stored = store.kv().peek(STATE_KEY).unwrap();
        assert_eq!(stored["version"], json!(2));
    }

    #[tokio::test]
    async fn test_ensure_ready_reuses_existing_state() {
        let store = new_store();
        let first = store.ensure_ready().await.unwrap();
        let second = store.ensure_ready().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_ensure_ready_replaces_old_schema() {
        let store = new_store();
        store
            .kv()
            .insert(STATE_KEY, json!({ "version": 1, "items": [] }));

        let state = store.ensure_ready().await.unwrap();
        assert_eq!(state.version, 2);
        assert_eq!(state.nodes.len(), 1);
        assert_eq!(store.kv().peek(STATE_KEY).unwrap()["version"], json!(2));
    }

    #[tokio::test]
    async fn test_corrupt_current_document_is_not_discarded() {
        let store = new_store();
        store
            .kv()
            .insert(STATE_KEY, json!({ "version": 2, "nodes": "nope", "rootId": "root" }));

        let err = store.ensure_ready().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
        // Nothing overwritten
        assert_eq!(store.kv().peek(STATE_KEY).unwrap()["nodes"], json!("nope"));
    }

    #[tokio::test]
    async fn test_detached_folder_loop_is_corrupt() {
        let store = new_store();
        let folder = |id: &str, other: &str| {
            json!({
                "type": "folder", "id": id, "name": id, "parentId": other,
                "childrenOrder": [other], "createdAt": 1, "updatedAt": 1
            })
        };
        let document = json!({
            "version": 2,
            "rootId": "root",
            "nodes": {
                "root": {
                    "type": "folder", "id": "root", "name": "All Items", "parentId": null,
                    "childrenOrder": [], "createdAt": 1, "updatedAt": 1
                },
                "fld_a": folder("fld_a", "fld_b"),
                "fld_b": folder("fld_b", "fld_a")
            }
        });
        store.kv().insert(STATE_KEY, document.clone());

        assert!(matches!(store.load().await, Err(StoreError::Corrupt(_))));
        let err = store.delete_node(&"fld_a".into()).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
        assert_eq!(store.kv().peek(STATE_KEY).unwrap(), document);
    }

    #[test]
    fn test_remove_subtree_stops_at_repeated_children() {
        let mut state = InventoryState::new(1);
        let mut looped = |id: &str, parent: &str, child: &str| {
            let node = Node::Folder(Folder {
                id: id.into(),
                name: id.to_string(),
                parent_id: Some(parent.into()),
                children_order: vec![child.into()],
                created_at: 1,
                updated_at: 1,
            });
            state.nodes.insert(id.into(), node);
        };
        looped("fld_a", "root", "fld_b");
        looped("fld_b", "fld_a", "fld_a");
        state
            .folder_mut(&root())
            .unwrap()
            .children_order
            .push("fld_a".into());

        let removed = remove_subtree(&mut state, &"fld_a".into(), 2);

        assert_eq!(removed.len(), 2);
        assert_eq!(state.nodes.len(), 1);
        assert!(state.root().unwrap().children_order.is_empty());
    }

    #[tokio::test]
    async fn test_storage_unavailable() {
        let store = new_store();
        store.kv().set_offline(true);

        let err = store.ensure_ready().await.unwrap_err();
        assert!(matches!(err, StoreError::StorageUnavailable(_)));

        let err = store.create_folder(&root(), "Receipts").await.unwrap_err();
        assert!(matches!(err, StoreError::StorageUnavailable(_)));
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let store = new_store();
        let folder = store.create_folder(&root(), "Receipts").await.unwrap();
        store.create_item(folder.id(), "Invoice #1").await.unwrap();

        let state = store.load().await.unwrap().unwrap();
        store.save(&state).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap(), state);
    }

    #[tokio::test]
    async fn test_create_folder_and_item() {
        let store = new_store();
        let folder = store.create_folder(&root(), "Receipts").await.unwrap();
        let item = store.create_item(folder.id(), "Invoice #1").await.unwrap();

        assert!(folder.id().as_str().starts_with("fld_"));
        assert!(item.id().as_str().starts_with("itm_"));

        let top = store.get_children(&root()).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name(), "Receipts");
        assert!(top[0].as_folder().is_some());

        let inner = store.get_children(folder.id()).await.unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].name(), "Invoice #1");
        assert!(inner[0].as_item().is_some());
        assert_eq!(inner[0].parent_id(), Some(folder.id()));

        assert_valid(&store).await;
    }

    #[tokio::test]
    async fn test_create_stamps_parent() {
        let store = new_store();
        let before = store.ensure_ready().await.unwrap().root().unwrap().updated_at;

        let folder = store.create_folder(&root(), "Receipts").await.unwrap();

        let state = store.load().await.unwrap().unwrap();
        let root_folder = state.root().unwrap();
        assert!(root_folder.updated_at > before);
        assert_eq!(folder.created_at(), folder.updated_at());
    }

    #[tokio::test]
    async fn test_create_under_invalid_parent() {
        let store = new_store();
        let item = store.create_item(&root(), "Lamp").await.unwrap();
        let snapshot = store.kv().peek(STATE_KEY).unwrap();

        let err = store.create_folder(&"missing".into(), "X").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidParent(_)));

        // Items cannot hold children
        let err = store.create_item(item.id(), "Bulb").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidParent(_)));

        // Nothing written
        assert_eq!(store.kv().peek(STATE_KEY).unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_get_children_of_unknown_or_item() {
        let store = new_store();
        let item = store.create_item(&root(), "Lamp").await.unwrap();

        assert!(store.get_children(&"missing".into()).await.unwrap().is_empty());
        assert!(store.get_children(item.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_children_keep_insertion_order() {
        let store = new_store();
        for name in ["a", "b", "c"] {
            store.create_item(&root(), name).await.unwrap();
        }
        let names: Vec<_> = store
            .get_children(&root())
            .await
            .unwrap()
            .iter()
            .map(|n| n.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_rename_node() {
        let store = new_store();
        let item = store.create_item(&root(), "Lamp").await.unwrap();

        store.rename_node(item.id(), "Desk lamp").await.unwrap();

        let renamed = store.get_node(item.id()).await.unwrap().unwrap();
        assert_eq!(renamed.name(), "Desk lamp");
        assert!(renamed.updated_at() > item.updated_at());
        assert_eq!(renamed.created_at(), item.created_at());
    }

    #[tokio::test]
    async fn test_rename_unknown_is_noop() {
        let store = new_store();
        store.ensure_ready().await.unwrap();
        let snapshot = store.kv().peek(STATE_KEY).unwrap();

        store.rename_node(&"ghost".into(), "x").await.unwrap();
        assert_eq!(store.kv().peek(STATE_KEY).unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_update_item_records_attachments() {
        let store = new_store();
        let item = store.create_item(&root(), "Camera").await.unwrap();

        let image = ImageRef::describe("img_1", "image/jpeg", b"jpeg-bytes", Some(640), Some(480));
        let thumb = Thumb {
            width: 320,
            height: 240,
            data_url: "data:image/jpeg;base64,AAAA".into(),
        };
        let update = ItemUpdate {
            tags: Some(BTreeSet::from(["electronics".to_string()])),
            notes: Some("Bought 2024".into()),
            thumbs: Some(vec![thumb.clone()]),
            images: Some(vec![image.clone()]),
        };

        let updated = store.update_item(item.id(), update).await.unwrap().unwrap();
        assert_eq!(updated.images, Some(vec![image]));
        assert_eq!(updated.thumbs, Some(vec![thumb]));
        assert_eq!(updated.notes.as_deref(), Some("Bought 2024"));
        assert!(updated.updated_at > item.updated_at());

        // Empty values clear, None leaves alone
        let cleared = store
            .update_item(
                item.id(),
                ItemUpdate {
                    notes: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(cleared.notes.is_none());
        assert!(cleared.images.is_some());
    }

    #[tokio::test]
    async fn test_update_item_ignores_folders_and_unknown() {
        let store = new_store();
        let folder = store.create_folder(&root(), "Box").await.unwrap();

        assert!(store
            .update_item(folder.id(), ItemUpdate::default())
            .await
            .unwrap()
            .is_none());
        assert!(store
            .update_item(&"ghost".into(), ItemUpdate::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_move_node_to_index() {
        let store = new_store();
        let source = store.create_folder(&root(), "Source").await.unwrap();
        let target = store.create_folder(&root(), "Target").await.unwrap();
        let item = store.create_item(source.id(), "Widget").await.unwrap();
        let existing = store.create_item(target.id(), "Existing").await.unwrap();

        let before = store.load().await.unwrap().unwrap();
        let source_before = before.folder(source.id()).unwrap().updated_at;
        let target_before = before.folder(target.id()).unwrap().updated_at;

        store
            .move_node(item.id(), target.id(), Some(0))
            .await
            .unwrap();

        let after = store.load().await.unwrap().unwrap();
        let source_after = after.folder(source.id()).unwrap();
        let target_after = after.folder(target.id()).unwrap();

        assert!(source_after.children_order.is_empty());
        assert_eq!(
            target_after.children_order,
            vec![item.id().clone(), existing.id().clone()]
        );
        assert!(source_after.updated_at > source_before);
        assert!(target_after.updated_at > target_before);
        assert_eq!(after.get(item.id()).unwrap().parent_id(), Some(target.id()));
        assert_eq!(after.check(), Ok(()));
    }

    #[tokio::test]
    async fn test_move_node_clamps_index_and_appends() {
        let store = new_store();
        let a = store.create_item(&root(), "a").await.unwrap();
        let b = store.create_item(&root(), "b").await.unwrap();
        let folder = store.create_folder(&root(), "f").await.unwrap();

        store.move_node(a.id(), folder.id(), Some(99)).await.unwrap();
        store.move_node(b.id(), folder.id(), None).await.unwrap();

        let children: Vec<_> = store
            .get_children(folder.id())
            .await
            .unwrap()
            .iter()
            .map(|n| n.id().clone())
            .collect();
        assert_eq!(children, vec![a.id().clone(), b.id().clone()]);
        assert_valid(&store).await;
    }

    #[tokio::test]
    async fn test_move_within_same_folder_reorders() {
        let store = new_store();
        let a = store.create_item(&root(), "a").await.unwrap();
        let b = store.create_item(&root(), "b").await.unwrap();
        let c = store.create_item(&root(), "c").await.unwrap();

        store.move_node(c.id(), &root(), Some(0)).await.unwrap();

        let order = store.load().await.unwrap().unwrap().root().unwrap().children_order.clone();
        assert_eq!(order, vec![c.id().clone(), a.id().clone(), b.id().clone()]);
    }

    #[tokio::test]
    async fn test_invalid_moves_are_rejected() {
        let store = new_store();
        let outer = store.create_folder(&root(), "outer").await.unwrap();
        let inner = store.create_folder(outer.id(), "inner").await.unwrap();
        let item = store.create_item(&root(), "item").await.unwrap();
        let snapshot = store.kv().peek(STATE_KEY).unwrap();

        let cases = [
            (NodeId::from("ghost"), root()),
            (item.id().clone(), NodeId::from("ghost")),
            (inner.id().clone(), item.id().clone()),
            (outer.id().clone(), outer.id().clone()),
            (outer.id().clone(), inner.id().clone()),
            (root(), outer.id().clone()),
        ];
        for (id, parent) in cases {
            let err = store.move_node(&id, &parent, None).await.unwrap_err();
            assert!(
                matches!(err, StoreError::InvalidMove(_)),
                "moving {} under {} should fail",
                id,
                parent
            );
        }

        assert_eq!(store.kv().peek(STATE_KEY).unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_delete_folder_cascades() {
        let store = new_store();
        let folder = store.create_folder(&root(), "Garage").await.unwrap();
        let sibling = store.create_item(&root(), "Keep me").await.unwrap();
        store.create_item(folder.id(), "Drill").await.unwrap();
        store.create_item(folder.id(), "Saw").await.unwrap();
        let sub = store.create_folder(folder.id(), "Shelf").await.unwrap();

        let before = store.load().await.unwrap().unwrap();
        let root_before = before.root().unwrap().updated_at;

        let removed = store.delete_node(folder.id()).await.unwrap();
        assert_eq!(removed.len(), 4);
        // Descendants come before the folder itself
        assert_eq!(removed.last().unwrap().id(), folder.id());
        assert!(removed.iter().any(|n| n.id() == sub.id()));

        let after = store.load().await.unwrap().unwrap();
        assert_eq!(after.nodes.len(), 2);
        let root_folder = after.root().unwrap();
        assert_eq!(root_folder.children_order, vec![sibling.id().clone()]);
        assert!(root_folder.updated_at > root_before);
        assert_eq!(after.check(), Ok(()));
    }

    #[tokio::test]
    async fn test_delete_nested_folders_deeply() {
        let store = new_store();
        let mut parent = root();
        let mut first = None;
        for depth in 0..200 {
            let folder = store
                .create_folder(&parent, &format!("level {}", depth))
                .await
                .unwrap();
            parent = folder.id().clone();
            first.get_or_insert(parent.clone());
        }

        let removed = store.delete_node(&first.unwrap()).await.unwrap();
        assert_eq!(removed.len(), 200);
        assert_eq!(store.load().await.unwrap().unwrap().nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = new_store();
        let item = store.create_item(&root(), "Lamp").await.unwrap();

        assert_eq!(store.delete_node(item.id()).await.unwrap().len(), 1);
        let snapshot = store.kv().peek(STATE_KEY).unwrap();

        assert!(store.delete_node(item.id()).await.unwrap().is_empty());
        assert_eq!(store.kv().peek(STATE_KEY).unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_delete_root_is_ignored() {
        let store = new_store();
        store.create_item(&root(), "Lamp").await.unwrap();

        assert!(store.delete_node(&root()).await.unwrap().is_empty());
        assert_eq!(store.get_children(&root()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_creates_are_not_lost() {
        let store = Arc::new(new_store());
        store.ensure_ready().await.unwrap();

        let creates = (0..20).map(|i| {
            let store = Arc::clone(&store);
            async move { store.create_item(&NodeId::root(), &format!("item {}", i)).await }
        });
        let results = futures::future::join_all(creates).await;
        assert!(results.iter().all(|r| r.is_ok()));

        assert_eq!(store.get_children(&root()).await.unwrap().len(), 20);
        assert_valid(&store).await;
    }
}
