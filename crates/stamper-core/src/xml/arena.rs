use super::node::XmlNodeData;
use super::xname::{XAttribute, XName};
use crate::error::{Result, StampError};
use indextree::{Arena, NodeId};

/// An XML tree stored in a flat arena. Parent links are back-indices, so
/// nodes can be moved, copied and removed without shared ownership.
#[derive(Clone, Debug)]
pub struct XmlDocument {
    arena: Arena<XmlNodeData>,
    root: Option<NodeId>,
}

impl XmlDocument {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&XmlNodeData> {
        if id.is_removed(&self.arena) {
            return None;
        }
        self.arena.get(id).map(|node| node.get())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut XmlNodeData> {
        if id.is_removed(&self.arena) {
            return None;
        }
        self.arena.get_mut(id).map(|node| node.get_mut())
    }

    pub fn name(&self, id: NodeId) -> Option<&XName> {
        self.get(id).and_then(|d| d.name())
    }

    /// True for an element named `local` in namespace `ns`.
    pub fn is(&self, id: NodeId, ns: &str, local: &str) -> bool {
        self.get(id).is_some_and(|d| d.is_named(ns, local))
    }

    pub fn add_root(&mut self, data: XmlNodeData) -> NodeId {
        let id = self.arena.new_node(data);
        self.root = Some(id);
        id
    }

    /// A node that belongs to this arena but has no parent yet.
    pub fn new_detached(&mut self, data: XmlNodeData) -> NodeId {
        self.arena.new_node(data)
    }

    pub fn add_child(&mut self, parent: NodeId, data: XmlNodeData) -> NodeId {
        let child = self.arena.new_node(data);
        parent.append(child, &mut self.arena);
        child
    }

    pub fn add_first_child(&mut self, parent: NodeId, data: XmlNodeData) -> NodeId {
        let child = self.arena.new_node(data);
        parent.prepend(child, &mut self.arena);
        child
    }

    /// Moves an existing (usually detached) node to the end of `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        child.detach(&mut self.arena);
        parent.append(child, &mut self.arena);
    }

    pub fn prepend(&mut self, parent: NodeId, child: NodeId) {
        child.detach(&mut self.arena);
        parent.prepend(child, &mut self.arena);
    }

    pub fn insert_before(&mut self, sibling: NodeId, node: NodeId) {
        node.detach(&mut self.arena);
        sibling.insert_before(node, &mut self.arena);
    }

    pub fn insert_after(&mut self, sibling: NodeId, node: NodeId) {
        node.detach(&mut self.arena);
        sibling.insert_after(node, &mut self.arena);
    }

    /// Unlinks a node (and its subtree) from its parent, keeping it alive.
    pub fn detach(&mut self, node: NodeId) {
        node.detach(&mut self.arena);
    }

    /// Removes a node together with its whole subtree.
    pub fn remove(&mut self, node: NodeId) {
        if !node.is_removed(&self.arena) {
            node.remove_subtree(&mut self.arena);
        }
    }

    /// True while the node is still reachable from the document root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        if node.is_removed(&self.arena) {
            return false;
        }
        match self.root {
            Some(root) => node.ancestors(&self.arena).last() == Some(root),
            None => false,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &XName) -> Option<&str> {
        self.get(node)?.attribute(name)
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &XName, value: &str) {
        if let Some(node_data) = self.get_mut(node) {
            if let Some(attrs) = node_data.attributes_mut() {
                if let Some(attr) = attrs.iter_mut().find(|a| &a.name == name) {
                    attr.value = value.to_string();
                } else {
                    attrs.push(XAttribute::new(name.clone(), value));
                }
            }
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &XName) {
        if let Some(node_data) = self.get_mut(node) {
            if let Some(attrs) = node_data.attributes_mut() {
                attrs.retain(|a| &a.name != name);
            }
        }
    }

    pub fn children(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        parent.children(&self.arena)
    }

    /// Child elements only, skipping text, comments and processing instructions.
    pub fn child_elements(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(parent)
            .filter(move |&c| self.get(c).is_some_and(|d| d.is_element()))
    }

    /// Pre-order traversal starting with `node` itself.
    pub fn descendants(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        node.descendants(&self.arena)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.get(node)?.parent()
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.arena.get(node)?.previous_sibling()
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.arena.get(node)?.next_sibling()
    }

    /// Ancestors starting with `node` itself.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        node.ancestors(&self.arena)
    }

    pub fn elements_by_name<'a>(
        &'a self,
        parent: NodeId,
        name: &'a XName,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children(parent)
            .filter(move |&child_id| self.name(child_id) == Some(name))
    }

    pub fn first_child_named(&self, parent: NodeId, name: &XName) -> Option<NodeId> {
        self.elements_by_name(parent, name).next()
    }

    /// Position of `child` among the children of `parent`.
    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).position(|c| c == child)
    }

    /// True when `node` lies in the subtree rooted at `ancestor` (inclusive).
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// Concatenated text of every text node below `node`.
    pub fn text(&self, node: NodeId) -> String {
        self.descendants(node)
            .filter_map(|d| self.get(d).and_then(|data| data.text_content()))
            .collect()
    }

    /// Copies the subtree rooted at `node` into a new detached subtree of
    /// this same arena.
    pub fn deep_copy(&mut self, node: NodeId) -> Result<NodeId> {
        let data = self.get(node).cloned().ok_or_else(|| {
            StampError::StructuralConsistency(format!("cannot copy removed node {node}"))
        })?;
        let copy = self.arena.new_node(data);
        let children: Vec<NodeId> = self.children(node).collect();
        for child in children {
            let child_copy = self.deep_copy(child)?;
            copy.append(child_copy, &mut self.arena);
        }
        Ok(copy)
    }

    /// Copies the subtree rooted at `node` of another document into a new
    /// detached subtree of this one.
    pub fn import_subtree(&mut self, source: &XmlDocument, node: NodeId) -> Result<NodeId> {
        let data = source.get(node).cloned().ok_or_else(|| {
            StampError::StructuralConsistency(format!("cannot import removed node {node}"))
        })?;
        let copy = self.arena.new_node(data);
        for child in source.children(node) {
            let child_copy = self.import_subtree(source, child)?;
            copy.append(child_copy, &mut self.arena);
        }
        Ok(copy)
    }
}

impl Default for XmlDocument {
    fn default() -> Self {
        Self::new()
    }
}
