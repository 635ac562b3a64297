//! XML tokenizer and tree builder
//!
//! The parser takes a stream of bytes and turns it into a document tree. Tree construction is a
//! state machine with three insertion modes that runs either on the current thread or on a worker.
use crate::document::DocumentHandle;
use crate::errors::Result;
use crate::parser::task::ParseTask;

pub mod document;
pub mod errors;
pub mod node;
pub mod parser;
pub mod tokenizer;
pub mod writer;

/// Parses the given XML string and returns a handle to the resulting document tree
pub fn xml_compile(xml: &str) -> Result<DocumentHandle> {
    ParseTask::from_str(xml, None).run()
}
