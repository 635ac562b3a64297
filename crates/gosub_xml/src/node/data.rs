pub mod comment;
pub mod doctype;
pub mod element;
pub mod processing_instruction;
pub mod text;
