//! A small command interpreter over [`TagTree`](crate::tree::TagTree):
//! a lexer, a pipeline splitter and a registry of built-in commands.

mod commands;
mod pipeline;

pub use commands::{ShellError, run};
pub use pipeline::{PipelineError, Token, split, tokenize};
