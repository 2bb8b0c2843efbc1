//! A hierarchical, path-addressable tree store whose entire state
//! serializes to a single tag string like `<root><docs>hello</docs></root>`.
//!
//! The [`tree::TagTree`] type offers filesystem-flavored verbs (mkdir,
//! touch, mv, ln, grep, ...) over that tree, [`store::FileTree`] persists
//! it to a file, and [`shell`] exposes the whole thing as a small piped
//! command language. The `tagfs` binary wraps it all in an interactive
//! prompt.

pub mod application;
pub mod cli;
pub mod shell;
pub mod store;
pub mod text;
pub mod tree;

pub use store::{FileTree, FileTreeError};
pub use text::{emit, parse};
pub use tree::{Node, NodeKind, TagTree, TreeError};
