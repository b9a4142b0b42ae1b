//! VGM (Video Game Music) stream support: header parsing and the
//! byte-code interpreter that drives chip register writes from it.

pub mod header;
pub mod interpreter;

pub use header::Header;
pub use interpreter::{Interpreter, Step};
