//! Shell command parsing

pub mod parser;

pub use parser::{parse_command_line, SimpleCommand};
