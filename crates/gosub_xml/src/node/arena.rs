use crate::node::Node;
use gosub_shared::node::NodeId;
use std::collections::HashMap;

/// The node arena is the single source for nodes in a document
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeArena {
    /// Current nodes stored as <id, node>
    nodes: HashMap<NodeId, Node>,
    /// Next node ID to use
    next_id: NodeId,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Gets the node with the given id
    pub fn node_ref(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get the node with the given id as a mutable reference
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Registers a node into the arena and returns its freshly assigned id
    pub fn register_node(&mut self, mut node: Node) -> NodeId {
        let id = self.next_id;
        self.next_id = id.next();

        node.id = id;
        self.nodes.insert(id, node);
        id
    }

    pub fn nodes(&self) -> &HashMap<NodeId, Node> {
        &self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::data::element::ElementData;
    use crate::node::NodeData;
    use gosub_shared::byte_stream::Location;

    #[test]
    fn register_node() {
        let mut arena = NodeArena::new();

        let root = arena.register_node(Node::new(NodeData::Document, Location::default()));
        let id = arena.register_node(Node::new(
            NodeData::Element(ElementData::new("test")),
            Location::new(1, 5, 4),
        ));

        assert_eq!(root, NodeId::root());
        assert_eq!(id, NodeId::from(1_usize));
        assert_eq!(arena.node_count(), 2);

        let node = arena.node_ref(id).unwrap();
        assert_eq!(node.id(), id);
        assert_eq!(node.get_element_data().unwrap().name(), "test");
        assert_eq!(node.location(), Location::new(1, 5, 4));
    }

    #[test]
    fn update_node_through_reference() {
        let mut arena = NodeArena::new();
        let id = arena.register_node(Node::new(
            NodeData::Element(ElementData::new("test")),
            Location::default(),
        ));

        if let Some(data) = arena.node_mut(id).and_then(|n| n.get_element_data_mut()) {
            data.set_attribute("id", "x");
        }

        let node = arena.node_ref(id).unwrap();
        assert_eq!(node.get_element_data().unwrap().attribute("id"), Some("x"));
        assert!(arena.node_ref(NodeId::from(5_usize)).is_none());
    }
}
