mod emitter;
mod grammar;
mod parser;

pub use emitter::emit;
pub use grammar::{escape, slugify, unescape, validate_segment, InvalidSegmentError};
pub use parser::{parse, ParseError, EMPTY_TREE};
