#[derive(Clone, Debug, Default, PartialEq)]
/// Data structure for processing instruction nodes (`<?target content?>`)
pub struct ProcessingInstructionData {
    pub target: String,
    pub content: String,
}

impl ProcessingInstructionData {
    pub fn new(target: &str, content: &str) -> Self {
        Self {
            target: target.to_owned(),
            content: content.to_owned(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}
