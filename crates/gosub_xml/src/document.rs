use crate::errors::{Error, Result};
use crate::node::arena::NodeArena;
use crate::node::data::comment::CommentData;
use crate::node::data::doctype::DocTypeData;
use crate::node::data::element::ElementData;
use crate::node::data::processing_instruction::ProcessingInstructionData;
use crate::node::data::text::TextData;
use crate::node::{Node, NodeData, NodeType};
use crate::parser::tree_builder::TreeBuilder;
use gosub_shared::byte_stream::Location;
use gosub_shared::node::NodeId;
use log::warn;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Defines a document
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Holds and owns all nodes in the document
    pub(crate) arena: NodeArena,
    /// Version from the xml declaration
    xml_version: Option<String>,
    /// Canonical name of the encoding negotiated from the xml declaration
    input_encoding: Option<String>,
    /// Standalone flag from the xml declaration
    standalone: Option<bool>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates a new document with only the document node
    pub fn new() -> Self {
        let mut arena = NodeArena::new();
        arena.register_node(Node::new(NodeData::Document, Location::default()));

        Self {
            arena,
            xml_version: None,
            input_encoding: None,
            standalone: None,
        }
    }

    /// Fetches a node by id or returns None when no node with this ID is found
    pub fn node_by_id(&self, node_id: NodeId) -> Option<&Node> {
        self.arena.node_ref(node_id)
    }

    pub fn node_count(&self) -> usize {
        self.arena.node_count()
    }

    /// Returns the document node
    pub fn root(&self) -> Option<&Node> {
        self.node_by_id(NodeId::root())
    }

    /// Returns the first element child of the document node
    pub fn document_element(&self) -> Option<NodeId> {
        self.first_child_of_type(NodeType::ElementNode)
    }

    /// Returns the doctype node, if the document has one
    pub fn doctype(&self) -> Option<NodeId> {
        self.first_child_of_type(NodeType::DocTypeNode)
    }

    fn first_child_of_type(&self, node_type: NodeType) -> Option<NodeId> {
        self.root()?
            .children()
            .iter()
            .copied()
            .find(|id| self.node_by_id(*id).is_some_and(|n| n.type_of() == node_type))
    }

    /// Returns the standalone flag. Documents without a standalone declaration are not standalone.
    pub fn standalone(&self) -> bool {
        self.standalone.unwrap_or(false)
    }

    pub fn input_encoding(&self) -> Option<&str> {
        self.input_encoding.as_deref()
    }

    pub fn xml_version(&self) -> Option<&str> {
        self.xml_version.as_deref()
    }

    /// Registers a node and appends it as last child of the given parent
    pub fn register_node_at(&mut self, mut node: Node, parent_id: NodeId) -> NodeId {
        node.parent = Some(parent_id);
        let node_id = self.arena.register_node(node);

        match self.arena.node_mut(parent_id) {
            Some(parent) => parent.children.push(node_id),
            None => warn!("parent node {parent_id} not found, node {node_id} stays detached"),
        }

        node_id
    }

    /// Returns the element data of the given node, or None when it's not an element
    pub fn element_data(&self, node_id: NodeId) -> Option<&ElementData> {
        self.node_by_id(node_id)?.get_element_data()
    }

    /// Returns the concatenated text of all text nodes below the given node
    pub fn text_content(&self, node_id: NodeId) -> String {
        let mut content = String::new();
        self.collect_text(node_id, &mut content);
        content
    }

    fn collect_text(&self, node_id: NodeId, content: &mut String) {
        let Some(node) = self.node_by_id(node_id) else {
            return;
        };

        if let Some(data) = node.get_text_data() {
            content.push_str(data.value());
        }
        for child in node.children() {
            self.collect_text(*child, content);
        }
    }
}

/// Shared handle to a document. The handle can be sent to other threads, so a document built on a
/// worker can be handed back to the caller.
pub struct DocumentHandle(pub Arc<RwLock<Document>>);

impl DocumentHandle {
    /// Create a new DocumentHandle from a document
    pub fn create(document: Document) -> Self {
        DocumentHandle(Arc::new(RwLock::new(document)))
    }

    /// Returns the document as referenced by the handle
    pub fn get(&self) -> RwLockReadGuard<'_, Document> {
        self.0.read()
    }

    /// Returns the document as a mutable reference
    pub fn get_mut(&mut self) -> RwLockWriteGuard<'_, Document> {
        self.0.write()
    }

    /// Returns true when both handles point to the very same document
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for DocumentHandle {
    fn default() -> Self {
        Self::create(Document::new())
    }
}

impl Clone for DocumentHandle {
    fn clone(&self) -> DocumentHandle {
        DocumentHandle(Arc::clone(&self.0))
    }
}

impl Debug for DocumentHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0.read())
    }
}

impl PartialEq for DocumentHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0.read() == *other.0.read()
    }
}

impl TreeBuilder for DocumentHandle {
    fn create_element(&mut self, name: &str, parent_id: NodeId, location: Location) -> NodeId {
        let node = Node::new(NodeData::Element(ElementData::new(name)), location);
        self.get_mut().register_node_at(node, parent_id)
    }

    fn create_text(&mut self, content: &str, parent_id: NodeId, location: Location) -> NodeId {
        let node = Node::new(NodeData::Text(TextData::with_value(content)), location);
        self.get_mut().register_node_at(node, parent_id)
    }

    fn create_comment(&mut self, content: &str, parent_id: NodeId, location: Location) -> NodeId {
        let node = Node::new(NodeData::Comment(CommentData::with_value(content)), location);
        self.get_mut().register_node_at(node, parent_id)
    }

    fn create_processing_instruction(
        &mut self,
        target: &str,
        content: &str,
        parent_id: NodeId,
        location: Location,
    ) -> NodeId {
        let data = ProcessingInstructionData::new(target, content);
        let node = Node::new(NodeData::ProcessingInstruction(data), location);
        self.get_mut().register_node_at(node, parent_id)
    }

    fn create_doctype(
        &mut self,
        name: &str,
        pub_identifier: Option<&str>,
        sys_identifier: Option<&str>,
        type_definitions: &str,
        location: Location,
    ) -> NodeId {
        let data = DocTypeData::new(name, pub_identifier, sys_identifier, type_definitions);
        let node = Node::new(NodeData::DocType(data), location);
        self.get_mut().register_node_at(node, NodeId::root())
    }

    fn insert_attribute(&mut self, key: &str, value: &str, element_id: NodeId, location: Location) -> Result<()> {
        let mut doc = self.get_mut();
        match doc.arena.node_mut(element_id).and_then(|n| n.get_element_data_mut()) {
            Some(data) => {
                data.set_attribute(key, value);
                Ok(())
            }
            None => Err(Error::InvalidOperation(format!(
                "cannot set attribute {key} on node {element_id} at {location:?}: not an element"
            ))),
        }
    }

    fn element_name(&self, element_id: NodeId) -> Option<String> {
        self.get().element_data(element_id).map(|data| data.name().to_string())
    }

    fn document_element(&self) -> Option<NodeId> {
        self.get().document_element()
    }

    fn set_input_encoding(&mut self, encoding: &str) {
        let mut doc = self.get_mut();
        if doc.input_encoding.is_some() {
            warn!("input encoding already set, ignoring {encoding}");
            return;
        }
        doc.input_encoding = Some(encoding.to_string());
    }

    fn set_standalone(&mut self, standalone: bool) {
        let mut doc = self.get_mut();
        if doc.standalone.is_some() {
            warn!("standalone already set, ignoring {standalone}");
            return;
        }
        doc.standalone = Some(standalone);
    }

    fn set_xml_version(&mut self, version: &str) {
        let mut doc = self.get_mut();
        if doc.xml_version.is_some() {
            warn!("xml version already set, ignoring {version}");
            return;
        }
        doc.xml_version = Some(version.to_string());
    }
}
