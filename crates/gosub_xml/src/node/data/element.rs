use indexmap::IndexMap;

/// Data structure for element nodes
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ElementData {
    /// Name of the element as written in the tag
    pub name: String,
    /// Attributes in document order
    pub attributes: IndexMap<String, String>,
}

impl ElementData {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            attributes: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets an attribute. Setting an existing attribute replaces its value but keeps its position.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_owned(), value.to_owned());
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_keep_their_first_position() {
        let mut data = ElementData::new("item");
        data.set_attribute("a", "1");
        data.set_attribute("b", "2");
        data.set_attribute("a", "3");

        let attributes: Vec<_> = data.attributes().iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(attributes, vec![("a", "3"), ("b", "2")]);
        assert_eq!(data.attribute("a"), Some("3"));
        assert_eq!(data.attribute("c"), None);
    }
}
