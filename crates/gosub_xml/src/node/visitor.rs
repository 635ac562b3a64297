use crate::node::Node;

/// Callbacks for a depth-first walk over the document tree
pub trait Visitor {
    fn document_enter(&mut self, node: &Node);
    fn document_leave(&mut self, node: &Node);

    fn doctype_enter(&mut self, node: &Node);
    fn doctype_leave(&mut self, node: &Node);

    fn text_enter(&mut self, node: &Node);
    fn text_leave(&mut self, node: &Node);

    fn comment_enter(&mut self, node: &Node);
    fn comment_leave(&mut self, node: &Node);

    fn processing_instruction_enter(&mut self, node: &Node);
    fn processing_instruction_leave(&mut self, node: &Node);

    fn element_enter(&mut self, node: &Node);
    fn element_leave(&mut self, node: &Node);
}
