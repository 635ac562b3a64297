use core::fmt::{Debug, Formatter};
use std::fmt;

#[derive(Clone, Default, PartialEq)]
/// Data structure for doctype nodes
pub struct DocTypeData {
    pub name: String,
    pub pub_identifier: Option<String>,
    pub sys_identifier: Option<String>,
    /// Verbatim internal subset, without the surrounding brackets
    pub type_definitions: String,
}

impl Debug for DocTypeData {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocTypeData")
            .field("name", &self.name)
            .field("pub_identifier", &self.pub_identifier)
            .field("sys_identifier", &self.sys_identifier)
            .finish_non_exhaustive()
    }
}

impl DocTypeData {
    pub fn new(
        name: &str,
        pub_identifier: Option<&str>,
        sys_identifier: Option<&str>,
        type_definitions: &str,
    ) -> Self {
        Self {
            name: name.to_owned(),
            pub_identifier: pub_identifier.map(str::to_owned),
            sys_identifier: sys_identifier.map(str::to_owned),
            type_definitions: type_definitions.to_owned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pub_identifier(&self) -> Option<&str> {
        self.pub_identifier.as_deref()
    }

    pub fn sys_identifier(&self) -> Option<&str> {
        self.sys_identifier.as_deref()
    }

    pub fn type_definitions(&self) -> &str {
        &self.type_definitions
    }
}
