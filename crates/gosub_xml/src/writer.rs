use crate::document::{Document, DocumentHandle};
use crate::node::visitor::Visitor;
use crate::node::{Node, NodeType};
use gosub_shared::node::NodeId;

/// Writer to convert a document to a string
pub struct DocumentWriter {
    /// The buffer to write to
    buffer: String,
    /// Whether to include comments in the output
    comments: bool,
}

impl Default for DocumentWriter {
    fn default() -> Self {
        Self {
            buffer: String::new(),
            comments: true,
        }
    }
}

impl DocumentWriter {
    /// Serializes the whole document, xml declaration included
    pub fn write_document(handle: &DocumentHandle) -> String {
        let mut w = Self::default();

        let doc = handle.get();
        w.write_declaration(&doc);
        w.visit_node(NodeId::root(), &doc);
        w.buffer
    }

    /// Serializes the given node and everything below it
    pub fn write_from_node(node: NodeId, handle: &DocumentHandle) -> String {
        let mut w = Self::default();

        w.visit_node(node, &handle.get());
        w.buffer
    }

    /// Do not write comment nodes
    pub fn without_comments(mut self) -> Self {
        self.comments = false;
        self
    }

    /// Writes into this writer and returns the result
    pub fn write(mut self, node: NodeId, handle: &DocumentHandle) -> String {
        self.visit_node(node, &handle.get());
        self.buffer
    }

    fn write_declaration(&mut self, doc: &Document) {
        let Some(version) = doc.xml_version() else {
            return;
        };

        self.buffer.push_str("<?xml version=\"");
        self.buffer.push_str(version);
        self.buffer.push('"');
        if let Some(encoding) = doc.input_encoding() {
            self.buffer.push_str(" encoding=\"");
            self.buffer.push_str(encoding);
            self.buffer.push('"');
        }
        if doc.standalone() {
            self.buffer.push_str(" standalone=\"yes\"");
        }
        self.buffer.push_str("?>");
    }

    pub fn visit_node(&mut self, id: NodeId, doc: &Document) {
        let Some(node) = doc.node_by_id(id) else {
            return;
        };

        match node.type_of() {
            NodeType::DocumentNode => {
                self.document_enter(node);
                self.visit_children(node.children(), doc);
                self.document_leave(node);
            }
            NodeType::DocTypeNode => {
                self.doctype_enter(node);
                self.doctype_leave(node);
            }
            NodeType::TextNode => {
                self.text_enter(node);
                self.text_leave(node);
            }
            NodeType::CommentNode => {
                self.comment_enter(node);
                self.comment_leave(node);
            }
            NodeType::ProcessingInstructionNode => {
                self.processing_instruction_enter(node);
                self.processing_instruction_leave(node);
            }
            NodeType::ElementNode => {
                self.element_enter(node);
                self.visit_children(node.children(), doc);
                self.element_leave(node);
            }
        }
    }

    pub fn visit_children(&mut self, children: &[NodeId], doc: &Document) {
        for child in children {
            self.visit_node(*child, doc);
        }
    }
}

impl Visitor for DocumentWriter {
    fn document_enter(&mut self, _node: &Node) {}

    fn document_leave(&mut self, _node: &Node) {}

    fn doctype_enter(&mut self, node: &Node) {
        if let Some(data) = node.get_doctype_data() {
            self.buffer.push_str("<!DOCTYPE ");
            self.buffer.push_str(data.name());

            match (data.pub_identifier(), data.sys_identifier()) {
                (Some(pub_id), Some(sys_id)) => {
                    self.buffer.push_str(&format!(" PUBLIC \"{pub_id}\" \"{sys_id}\""));
                }
                (None, Some(sys_id)) => self.buffer.push_str(&format!(" SYSTEM \"{sys_id}\"")),
                _ => {}
            }

            if !data.type_definitions().is_empty() {
                self.buffer.push_str(" [");
                self.buffer.push_str(data.type_definitions());
                self.buffer.push(']');
            }
            self.buffer.push('>');
        }
    }

    fn doctype_leave(&mut self, _node: &Node) {}

    fn text_enter(&mut self, node: &Node) {
        if let Some(data) = node.get_text_data() {
            self.buffer.push_str(&escape_text(data.value()));
        }
    }

    fn text_leave(&mut self, _node: &Node) {}

    fn comment_enter(&mut self, node: &Node) {
        if !self.comments {
            return;
        }

        if let Some(data) = node.get_comment_data() {
            self.buffer.push_str("<!--");
            self.buffer.push_str(data.value());
            self.buffer.push_str("-->");
        }
    }

    fn comment_leave(&mut self, _node: &Node) {}

    fn processing_instruction_enter(&mut self, node: &Node) {
        if let Some(data) = node.get_processing_instruction_data() {
            self.buffer.push_str("<?");
            self.buffer.push_str(data.target());
            if !data.content().is_empty() {
                self.buffer.push(' ');
                self.buffer.push_str(data.content());
            }
            self.buffer.push_str("?>");
        }
    }

    fn processing_instruction_leave(&mut self, _node: &Node) {}

    fn element_enter(&mut self, node: &Node) {
        if let Some(data) = node.get_element_data() {
            self.buffer.push('<');
            self.buffer.push_str(data.name());

            for (name, value) in data.attributes() {
                self.buffer.push(' ');
                self.buffer.push_str(name);
                self.buffer.push_str("=\"");
                self.buffer.push_str(&escape_attribute(value));
                self.buffer.push('"');
            }

            if node.children().is_empty() {
                self.buffer.push_str("/>");
            } else {
                self.buffer.push('>');
            }
        }
    }

    fn element_leave(&mut self, node: &Node) {
        if node.children().is_empty() {
            return;
        }

        if let Some(data) = node.get_element_data() {
            self.buffer.push_str("</");
            self.buffer.push_str(data.name());
            self.buffer.push('>');
        }
    }
}

fn escape_text(value: &str) -> String {
    value.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
