#[derive(Clone, Debug, Default, PartialEq)]
/// Data structure for text nodes
pub struct TextData {
    /// Character data, with all references already resolved
    pub value: String,
}

impl TextData {
    pub fn with_value(value: &str) -> Self {
        Self {
            value: value.to_owned(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}
