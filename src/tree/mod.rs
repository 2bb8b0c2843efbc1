mod node;
mod ops;
pub mod path;
mod store;
mod walk;

pub use node::{Node, NodeKind};
pub use store::{TagTree, TreeError};
pub use walk::{GrepOptions, NodeInfo, SedOptions};
