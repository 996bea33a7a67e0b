//! Core engine module - the tool registry and its search logic.
//!
//! The catalog doesn't depend on the HTTP layer; the server and any other
//! frontend list and filter tools through it.

pub mod catalog;

pub use catalog::{find, QuickAnswer, ToolCatalog, ToolCategory, ToolDescriptor, ToolKind, TOOLS};
