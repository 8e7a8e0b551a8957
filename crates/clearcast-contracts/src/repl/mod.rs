mod command_registry;
mod parser;

pub use command_registry::{help_lines, CommandKind, CommandSpec, COMMANDS};
pub use parser::{parse_command, SessionCommand};
