pub mod document;
pub mod graph;
pub mod layout;
pub mod pdf;
