//! In-memory index of archive members.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. The tree is
//! kept with first-child / next-sibling links, so attaching a node is O(1)
//! and listing a directory walks only its own children.
//!
//! Freed slots are never reused: iterating the arena yields live nodes in
//! the order they were first inserted, which is the order commit writes
//! them in.

use std::collections::HashMap;

use crate::error::{Result, ZipFsError};
use crate::zip::Entry;
use crate::zip::parser::CenName;

pub(crate) type NodeId = usize;

/// The root node always occupies the first slot
pub(crate) const ROOT: NodeId = 0;

#[derive(Debug)]
pub(crate) struct IndexNode {
    pub name: Vec<u8>,
    pub is_dir: bool,
    /// Offset of the backing header in the central directory bytes.
    /// `None` for pseudo directories and members created this session.
    pub pos: Option<usize>,
    /// Updated entry, once the member was created or modified
    pub entry: Option<Entry>,
    pub child: Option<NodeId>,
    pub sibling: Option<NodeId>,
}

impl IndexNode {
    fn new(name: Vec<u8>, is_dir: bool, pos: Option<usize>) -> Self {
        Self {
            name,
            is_dir,
            pos,
            entry: None,
            child: None,
            sibling: None,
        }
    }
}

/// Offset of the last separator in `path`, ignoring a trailing one.
///
/// Returns 0 for top-level names, whose parent is the root.
pub(crate) fn parent_off(path: &[u8]) -> usize {
    let mut off = path.len().saturating_sub(1);
    if off > 0 && path[off] == b'/' {
        off -= 1;
    }
    while off > 0 && path[off] != b'/' {
        off -= 1;
    }
    off
}

/// Parent path of an absolute name, `None` for the root itself
pub(crate) fn parent_of(path: &[u8]) -> Option<&[u8]> {
    if path.len() <= 1 {
        return None;
    }
    match parent_off(path) {
        0 => Some(b"/"),
        off => Some(&path[..off]),
    }
}

/// Last path segment of an absolute name
pub(crate) fn file_name(path: &[u8]) -> &[u8] {
    match path.iter().rposition(|&b| b == b'/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

#[derive(Debug)]
pub(crate) struct Index {
    nodes: Vec<Option<IndexNode>>,
    lookup: HashMap<Vec<u8>, NodeId>,
}

impl Index {
    /// Build the index and directory tree from a scanned central directory.
    ///
    /// Later duplicates of a name replace earlier ones. A literal `/` member
    /// is folded into the synthetic root. Missing ancestors are created as
    /// pseudo directories.
    pub fn build(names: Vec<CenName>) -> Self {
        let mut index = Index {
            nodes: Vec::with_capacity(names.len() + 1),
            lookup: HashMap::with_capacity(names.len() + 1),
        };
        index.alloc(IndexNode::new(b"/".to_vec(), true, None));

        for n in names {
            if n.name == b"/" {
                continue;
            }
            let node = IndexNode::new(n.name, n.is_dir, Some(n.pos));
            match index.lookup.get(&node.name) {
                Some(&id) => index.nodes[id] = Some(node),
                None => {
                    index.alloc(node);
                }
            }
        }

        // Only the members present before synthesis need linking; every
        // pseudo parent is linked by the loop that creates it.
        let members: Vec<NodeId> = (1..index.nodes.len()).collect();
        for id in members {
            let mut id = id;
            loop {
                let name = index.name(id).to_vec();
                let off = parent_off(&name);
                if off == 0 {
                    index.link(ROOT, id);
                    break;
                }
                if let Some(&parent) = index.lookup.get(&name[..off]) {
                    index.link(parent, id);
                    break;
                }
                let parent = index.alloc(IndexNode::new(name[..off].to_vec(), true, None));
                index.link(parent, id);
                id = parent;
            }
        }
        index
    }

    fn alloc(&mut self, node: IndexNode) -> NodeId {
        let id = self.nodes.len();
        self.lookup.insert(node.name.clone(), id);
        self.nodes.push(Some(node));
        id
    }

    fn link(&mut self, parent: NodeId, id: NodeId) {
        let first = self.node(parent).child;
        if let Some(node) = self.nodes[id].as_mut() {
            node.sibling = first;
        }
        if let Some(p) = self.nodes[parent].as_mut() {
            p.child = Some(id);
        }
    }

    fn name(&self, id: NodeId) -> &[u8] {
        &self.node(id).name
    }

    pub fn get(&self, name: &[u8]) -> Option<NodeId> {
        self.lookup.get(name).copied()
    }

    pub fn contains(&self, name: &[u8]) -> bool {
        self.lookup.contains_key(name)
    }

    /// Node for a live id. Ids handed out by this index stay live until
    /// [`Index::remove`], so a stale id is a logic error.
    pub fn node(&self, id: NodeId) -> &IndexNode {
        match self.nodes.get(id) {
            Some(Some(node)) => node,
            _ => panic!("stale index node {id}"),
        }
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut IndexNode {
        match self.nodes.get_mut(id) {
            Some(Some(node)) => node,
            _ => panic!("stale index node {id}"),
        }
    }

    /// Insert or replace the member named by `entry`.
    ///
    /// A replaced node keeps its slot, position among its siblings, and
    /// children; only a directory may keep children. A new node is linked
    /// under its parent, which must exist.
    pub fn update(&mut self, entry: Entry) -> Result<NodeId> {
        if let Some(id) = self.get(&entry.name) {
            let node = self.node_mut(id);
            if !entry.is_dir && node.child.is_some() {
                return Err(ZipFsError::AlreadyExists(
                    String::from_utf8_lossy(&entry.name).into_owned(),
                ));
            }
            node.is_dir = entry.is_dir;
            node.entry = Some(entry);
            return Ok(id);
        }

        let parent = parent_of(&entry.name)
            .and_then(|p| self.get(p))
            .ok_or_else(|| {
                ZipFsError::NotFound(String::from_utf8_lossy(&entry.name).into_owned())
            })?;
        let id = self.alloc(IndexNode {
            name: entry.name.clone(),
            is_dir: entry.is_dir,
            pos: None,
            entry: Some(entry),
            child: None,
            sibling: None,
        });
        self.link(parent, id);
        Ok(id)
    }

    /// Detach `id` from its parent's child list.
    fn unlink(&mut self, id: NodeId) {
        let Some(parent) = parent_of(self.name(id)).and_then(|p| self.get(p)) else {
            return;
        };
        let next = self.node(id).sibling;
        let mut cur = self.node(parent).child;
        if cur == Some(id) {
            self.node_mut(parent).child = next;
            return;
        }
        while let Some(c) = cur {
            let sib = self.node(c).sibling;
            if sib == Some(id) {
                self.node_mut(c).sibling = next;
                return;
            }
            cur = sib;
        }
    }

    /// Remove a node from the tree and the index.
    ///
    /// Callers make sure directories are empty first.
    pub fn remove(&mut self, id: NodeId) -> Option<IndexNode> {
        if id == ROOT {
            return None;
        }
        self.unlink(id);
        let node = self.nodes.get_mut(id)?.take()?;
        self.lookup.remove(&node.name);
        Some(node)
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            index: self,
            next: self.node(id).child,
        }
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        self.node(id).child.is_some()
    }

    /// Live nodes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &IndexNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(id, n)| n.as_ref().map(|n| (id, n)))
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }
}

pub(crate) struct Children<'a> {
    index: &'a Index,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.index.node(id).sibling;
        Some(id)
    }
}
