pub mod loader;
pub mod vm;

pub use loader::{parse_program, read_program, ParseError};
pub use vm::{Error, Vm};
