use crate::node::data::comment::CommentData;
use crate::node::data::doctype::DocTypeData;
use crate::node::data::element::ElementData;
use crate::node::data::processing_instruction::ProcessingInstructionData;
use crate::node::data::text::TextData;
use gosub_shared::byte_stream::Location;
use gosub_shared::node::NodeId;

pub mod arena;
pub mod data;
pub mod visitor;

/// Different types of nodes
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeType {
    DocumentNode,
    DocTypeNode,
    ElementNode,
    TextNode,
    CommentNode,
    ProcessingInstructionNode,
}

/// Data attached to a node, depending on its type
#[derive(Clone, Debug, PartialEq)]
pub enum NodeData {
    Document,
    DocType(DocTypeData),
    Element(ElementData),
    Text(TextData),
    Comment(CommentData),
    ProcessingInstruction(ProcessingInstructionData),
}

/// Node structure that resembles a DOM node
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// ID of the node, 0 is always the document node
    pub id: NodeId,
    /// parent of the node, if any
    pub parent: Option<NodeId>,
    /// any children of the node
    pub children: Vec<NodeId>,
    /// actual data of the node
    pub data: NodeData,
    /// Location of the node in the source
    pub location: Location,
}

impl Node {
    /// Creates a new, unattached node. The id is assigned when the node is registered in an arena.
    pub fn new(data: NodeData, location: Location) -> Self {
        Self {
            id: NodeId::default(),
            parent: None,
            children: Vec::new(),
            data,
            location,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        self.children.as_slice()
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn type_of(&self) -> NodeType {
        match self.data {
            NodeData::Document => NodeType::DocumentNode,
            NodeData::DocType(_) => NodeType::DocTypeNode,
            NodeData::Element(_) => NodeType::ElementNode,
            NodeData::Text(_) => NodeType::TextNode,
            NodeData::Comment(_) => NodeType::CommentNode,
            NodeData::ProcessingInstruction(_) => NodeType::ProcessingInstructionNode,
        }
    }

    pub fn is_element_node(&self) -> bool {
        self.type_of() == NodeType::ElementNode
    }

    pub fn get_element_data(&self) -> Option<&ElementData> {
        if let NodeData::Element(data) = &self.data {
            return Some(data);
        }
        None
    }

    pub fn get_element_data_mut(&mut self) -> Option<&mut ElementData> {
        if let NodeData::Element(data) = &mut self.data {
            return Some(data);
        }
        None
    }

    pub fn get_text_data(&self) -> Option<&TextData> {
        if let NodeData::Text(data) = &self.data {
            return Some(data);
        }
        None
    }

    pub fn get_text_data_mut(&mut self) -> Option<&mut TextData> {
        if let NodeData::Text(data) = &mut self.data {
            return Some(data);
        }
        None
    }

    pub fn get_comment_data(&self) -> Option<&CommentData> {
        if let NodeData::Comment(data) = &self.data {
            return Some(data);
        }
        None
    }

    pub fn get_doctype_data(&self) -> Option<&DocTypeData> {
        if let NodeData::DocType(data) = &self.data {
            return Some(data);
        }
        None
    }

    pub fn get_processing_instruction_data(&self) -> Option<&ProcessingInstructionData> {
        if let NodeData::ProcessingInstruction(data) = &self.data {
            return Some(data);
        }
        None
    }
}
