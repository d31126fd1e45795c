//! Inventory data model: folders, items, and the persisted tree document.

use crate::content_hash::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::{self, Display, Formatter};

/// Current schema version of the persisted document.
pub const SCHEMA_VERSION: u32 = 2;

/// Id of the single root folder.
pub const ROOT_ID: &str = "root";

/// Display name given to a freshly created root folder.
pub const ROOT_NAME: &str = "All Items";

/// Opaque node identifier.
///
/// Generated ids carry a type prefix (`fld_`, `itm_`) for readability only;
/// nothing parses it back out.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The root folder id.
    pub fn root() -> Self {
        Self(ROOT_ID.to_string())
    }

    pub(crate) fn generate(kind: NodeKind) -> Self {
        let prefix = match kind {
            NodeKind::Folder => "fld",
            NodeKind::Item => "itm",
        };
        Self(format!("{}_{}", prefix, uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    Item,
}

/// Container node holding an ordered list of child ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: NodeId,
    pub name: String,
    /// `None` only for the root folder
    pub parent_id: Option<NodeId>,
    /// Child ids in display order
    pub children_order: Vec<NodeId>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Folder {
    pub(crate) fn touch(&mut self, now: u64) {
        advance(&mut self.updated_at, now);
    }
}

fn advance(updated_at: &mut u64, now: u64) {
    *updated_at = now.max(*updated_at + 1);
}

/// Inline preview of an item image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thumb {
    pub width: u32,
    pub height: u32,
    /// Self-contained `data:` URL
    pub data_url: String,
}

/// Metadata for an attachment whose body lives in the blob store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub id: String,
    pub content_hash: String,
    pub mime: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Device locator of the body, when the device backend stored it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl ImageRef {
    /// Describe an attachment body: hashes the bytes and records their size.
    pub fn describe(
        id: impl Into<String>,
        mime: impl Into<String>,
        bytes: &[u8],
        width: Option<u32>,
        height: Option<u32>,
    ) -> Self {
        Self {
            id: id.into(),
            content_hash: ContentHash::of(bytes).as_str().to_string(),
            mime: mime.into(),
            size: bytes.len() as u64,
            width,
            height,
            uri: None,
        }
    }

    pub fn with_uri(mut self, uri: Option<String>) -> Self {
        self.uri = uri;
        self
    }
}

/// Leaf node representing a cataloged object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: NodeId,
    pub name: String,
    pub parent_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbs: Option<Vec<Thumb>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageRef>>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Item {
    pub(crate) fn touch(&mut self, now: u64) {
        advance(&mut self.updated_at, now);
    }
}

/// A folder or an item in the inventory tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Folder(Folder),
    Item(Item),
}

impl Node {
    pub fn id(&self) -> &NodeId {
        match self {
            Node::Folder(f) => &f.id,
            Node::Item(i) => &i.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Folder(f) => &f.name,
            Node::Item(i) => &i.name,
        }
    }

    pub fn parent_id(&self) -> Option<&NodeId> {
        match self {
            Node::Folder(f) => f.parent_id.as_ref(),
            Node::Item(i) => Some(&i.parent_id),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Folder(_) => NodeKind::Folder,
            Node::Item(_) => NodeKind::Item,
        }
    }

    pub fn created_at(&self) -> u64 {
        match self {
            Node::Folder(f) => f.created_at,
            Node::Item(i) => i.created_at,
        }
    }

    pub fn updated_at(&self) -> u64 {
        match self {
            Node::Folder(f) => f.updated_at,
            Node::Item(i) => i.updated_at,
        }
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            Node::Folder(f) => Some(f),
            Node::Item(_) => None,
        }
    }

    pub fn as_item(&self) -> Option<&Item> {
        match self {
            Node::Item(i) => Some(i),
            Node::Folder(_) => None,
        }
    }

    pub(crate) fn set_name(&mut self, name: String) {
        match self {
            Node::Folder(f) => f.name = name,
            Node::Item(i) => i.name = name,
        }
    }

    pub(crate) fn set_parent(&mut self, parent: NodeId) {
        match self {
            Node::Folder(f) => f.parent_id = Some(parent),
            Node::Item(i) => i.parent_id = parent,
        }
    }

    /// Advance `updated_at` to `now`, always moving it strictly forward.
    pub(crate) fn touch(&mut self, now: u64) {
        match self {
            Node::Folder(f) => f.touch(now),
            Node::Item(i) => i.touch(now),
        }
    }
}

/// A structural invariant that a loaded or mutated tree failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    MissingRoot,
    RootNotFolder,
    RootHasParent,
    ExtraRoot(NodeId),
    KeyMismatch { key: NodeId, id: NodeId },
    DanglingChild { folder: NodeId, child: NodeId },
    WrongParent { folder: NodeId, child: NodeId },
    ItemAsParent { child: NodeId, parent: NodeId },
    MissingParent { child: NodeId, parent: NodeId },
    NotListed(NodeId),
    ListedTwice(NodeId),
    Unreachable(NodeId),
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingRoot => write!(f, "root folder is missing"),
            Violation::RootNotFolder => write!(f, "root node is not a folder"),
            Violation::RootHasParent => write!(f, "root folder has a parent"),
            Violation::ExtraRoot(id) => write!(f, "node {} has no parent but is not the root", id),
            Violation::KeyMismatch { key, id } => {
                write!(f, "node stored under {} carries id {}", key, id)
            }
            Violation::DanglingChild { folder, child } => {
                write!(f, "folder {} lists unknown child {}", folder, child)
            }
            Violation::WrongParent { folder, child } => {
                write!(f, "folder {} lists {} whose parent is elsewhere", folder, child)
            }
            Violation::ItemAsParent { child, parent } => {
                write!(f, "node {} has item {} as parent", child, parent)
            }
            Violation::MissingParent { child, parent } => {
                write!(f, "node {} has unknown parent {}", child, parent)
            }
            Violation::NotListed(id) => write!(f, "node {} is not listed by its parent", id),
            Violation::ListedTwice(id) => write!(f, "node {} is listed more than once", id),
            Violation::Unreachable(id) => write!(f, "node {} cannot be reached from the root", id),
        }
    }
}

/// The whole persisted inventory document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryState {
    pub version: u32,
    pub nodes: BTreeMap<NodeId, Node>,
    pub root_id: NodeId,
}

impl InventoryState {
    /// A fresh document holding only the root folder.
    pub fn new(now: u64) -> Self {
        let root = Folder {
            id: NodeId::root(),
            name: ROOT_NAME.to_string(),
            parent_id: None,
            children_order: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let mut nodes = BTreeMap::new();
        nodes.insert(root.id.clone(), Node::Folder(root));
        Self {
            version: SCHEMA_VERSION,
            nodes,
            root_id: NodeId::root(),
        }
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn folder(&self, id: &NodeId) -> Option<&Folder> {
        self.nodes.get(id).and_then(Node::as_folder)
    }

    pub(crate) fn folder_mut(&mut self, id: &NodeId) -> Option<&mut Folder> {
        match self.nodes.get_mut(id) {
            Some(Node::Folder(f)) => Some(f),
            _ => None,
        }
    }

    pub fn root(&self) -> Option<&Folder> {
        self.folder(&self.root_id)
    }

    /// Children of a folder in display order. Empty for unknown ids and items.
    pub fn children(&self, parent_id: &NodeId) -> Vec<&Node> {
        match self.folder(parent_id) {
            Some(folder) => folder
                .children_order
                .iter()
                .filter_map(|id| self.nodes.get(id))
                .collect(),
            None => Vec::new(),
        }
    }

    /// True if `id` is `ancestor` or lies anywhere beneath it.
    pub fn is_within(&self, id: &NodeId, ancestor: &NodeId) -> bool {
        let mut current = Some(id);
        let mut hops = 0;
        while let Some(node_id) = current {
            if node_id == ancestor {
                return true;
            }
            // Malformed parent chains cannot loop forever
            hops += 1;
            if hops > self.nodes.len() {
                return false;
            }
            current = self.nodes.get(node_id).and_then(Node::parent_id);
        }
        false
    }

    /// Verify the structural invariants, returning the first violation found.
    pub fn check(&self) -> Result<(), Violation> {
        match self.nodes.get(&self.root_id) {
            None => return Err(Violation::MissingRoot),
            Some(Node::Item(_)) => return Err(Violation::RootNotFolder),
            Some(Node::Folder(root)) if root.parent_id.is_some() => {
                return Err(Violation::RootHasParent);
            }
            Some(Node::Folder(_)) => {}
        }

        for (key, node) in &self.nodes {
            if key != node.id() {
                return Err(Violation::KeyMismatch {
                    key: key.clone(),
                    id: node.id().clone(),
                });
            }
            match node.parent_id() {
                None if key != &self.root_id => return Err(Violation::ExtraRoot(key.clone())),
                None => {}
                Some(parent) => match self.nodes.get(parent) {
                    None => {
                        return Err(Violation::MissingParent {
                            child: key.clone(),
                            parent: parent.clone(),
                        });
                    }
                    Some(Node::Item(_)) => {
                        return Err(Violation::ItemAsParent {
                            child: key.clone(),
                            parent: parent.clone(),
                        });
                    }
                    Some(Node::Folder(_)) => {}
                },
            }
        }

        let mut listed = HashSet::new();
        for node in self.nodes.values() {
            let Node::Folder(folder) = node else { continue };
            for child in &folder.children_order {
                match self.nodes.get(child) {
                    None => {
                        return Err(Violation::DanglingChild {
                            folder: folder.id.clone(),
                            child: child.clone(),
                        });
                    }
                    Some(c) if c.parent_id() != Some(&folder.id) => {
                        return Err(Violation::WrongParent {
                            folder: folder.id.clone(),
                            child: child.clone(),
                        });
                    }
                    Some(_) => {}
                }
                if !listed.insert(child.clone()) {
                    return Err(Violation::ListedTwice(child.clone()));
                }
            }
        }

        for key in self.nodes.keys() {
            if key != &self.root_id && !listed.contains(key) {
                return Err(Violation::NotListed(key.clone()));
            }
        }

        // Parent links can still close a loop that never touches the root
        let mut reached = HashSet::from([&self.root_id]);
        let mut stack = vec![&self.root_id];
        while let Some(id) = stack.pop() {
            if let Some(Node::Folder(folder)) = self.nodes.get(id) {
                for child in &folder.children_order {
                    if reached.insert(child) {
                        stack.push(child);
                    }
                }
            }
        }
        if let Some(key) = self.nodes.keys().find(|key| !reached.contains(key)) {
            return Err(Violation::Unreachable(key.clone()));
        }

        Ok(())
    }
}
