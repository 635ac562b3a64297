use crate::errors::Result;
use gosub_shared::byte_stream::Location;
use gosub_shared::node::NodeId;

/// TreeBuilder is an interface to abstract DOM tree modifications.
///
/// This is implemented by DocumentHandle so the parser can manipulate the document directly. All
/// factories create the node and append it as the last child of the given parent.
pub trait TreeBuilder {
    /// Create a new element node with the given tag name and append it to a parent
    fn create_element(&mut self, name: &str, parent_id: NodeId, location: Location) -> NodeId;

    /// Create a new text node with the given content and append it to a parent
    fn create_text(&mut self, content: &str, parent_id: NodeId, location: Location) -> NodeId;

    /// Create a new comment node with the given content and append it to a parent
    fn create_comment(&mut self, content: &str, parent_id: NodeId, location: Location) -> NodeId;

    /// Create a new processing instruction node and append it to a parent
    fn create_processing_instruction(
        &mut self,
        target: &str,
        content: &str,
        parent_id: NodeId,
        location: Location,
    ) -> NodeId;

    /// Create the doctype node and append it to the document
    fn create_doctype(
        &mut self,
        name: &str,
        pub_identifier: Option<&str>,
        sys_identifier: Option<&str>,
        type_definitions: &str,
        location: Location,
    ) -> NodeId;

    /// Insert/update an attribute for an element node
    fn insert_attribute(&mut self, key: &str, value: &str, element_id: NodeId, location: Location) -> Result<()>;

    /// Returns the tag name of the given element node
    fn element_name(&self, element_id: NodeId) -> Option<String>;

    /// Returns the top-level element of the document, if there is one
    fn document_element(&self) -> Option<NodeId>;

    /// Sets the encoding the document was decoded with. Only the first call has effect.
    fn set_input_encoding(&mut self, encoding: &str);

    /// Sets the standalone flag of the document. Only the first call has effect.
    fn set_standalone(&mut self, standalone: bool);

    /// Sets the declared xml version. Only the first call has effect.
    fn set_xml_version(&mut self, version: &str);
}
