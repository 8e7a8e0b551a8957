#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    NoArg,
    RawText,
    SinglePath,
    OptionalPath,
    Mode,
    Aspect,
    Index,
}

#[derive(Clone, Copy, Debug)]
pub struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    pub kind: CommandKind,
    pub usage: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "mode",
        action: "select_mode",
        kind: CommandKind::Mode,
        usage: "/mode image|video",
    },
    CommandSpec {
        command: "load",
        action: "load_source",
        kind: CommandKind::SinglePath,
        usage: "/load <path>",
    },
    CommandSpec {
        command: "instruction",
        action: "set_instruction",
        kind: CommandKind::RawText,
        usage: "/instruction <text>",
    },
    CommandSpec {
        command: "aspect",
        action: "set_aspect_ratio",
        kind: CommandKind::Aspect,
        usage: "/aspect 16:9|9:16",
    },
    CommandSpec {
        command: "start",
        action: "start_processing",
        kind: CommandKind::NoArg,
        usage: "/start",
    },
    CommandSpec {
        command: "refine",
        action: "start_processing",
        kind: CommandKind::NoArg,
        usage: "/refine",
    },
    CommandSpec {
        command: "discard",
        action: "discard",
        kind: CommandKind::NoArg,
        usage: "/discard",
    },
    CommandSpec {
        command: "history",
        action: "list_history",
        kind: CommandKind::NoArg,
        usage: "/history",
    },
    CommandSpec {
        command: "select",
        action: "select_history_entry",
        kind: CommandKind::Index,
        usage: "/select <n>",
    },
    CommandSpec {
        command: "download",
        action: "download",
        kind: CommandKind::OptionalPath,
        usage: "/download [dir]",
    },
    CommandSpec {
        command: "status",
        action: "status",
        kind: CommandKind::NoArg,
        usage: "/status",
    },
    CommandSpec {
        command: "help",
        action: "help",
        kind: CommandKind::NoArg,
        usage: "/help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
        kind: CommandKind::NoArg,
        usage: "/quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
        kind: CommandKind::NoArg,
        usage: "/exit",
    },
];

pub(crate) fn find_command(command: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.command == command)
}

pub fn help_lines() -> Vec<&'static str> {
    COMMANDS.iter().map(|spec| spec.usage).collect()
}
