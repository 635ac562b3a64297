#[derive(Clone, Debug, Default, PartialEq)]
/// Data structure for comment nodes
pub struct CommentData {
    pub value: String,
}

impl CommentData {
    pub fn with_value(value: &str) -> Self {
        Self {
            value: value.to_owned(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}
