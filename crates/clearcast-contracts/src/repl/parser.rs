use crate::assets::{AspectRatio, Mode};

use super::command_registry::{find_command, CommandKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Noop,
    SelectMode(Mode),
    LoadSource(String),
    SetInstruction(String),
    ResetInstruction,
    SetAspectRatio(AspectRatio),
    StartProcessing,
    Discard,
    ListHistory,
    SelectHistoryEntry(usize),
    Download(Option<String>),
    Status,
    Help,
    Quit,
    Invalid { command: String, reason: String },
    Unknown { command: String, arg: String },
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    parse_path_args(arg).join(" ")
}

fn invalid(command: &str, reason: impl Into<String>) -> SessionCommand {
    SessionCommand::Invalid {
        command: command.to_string(),
        reason: reason.into(),
    }
}

/// Parses one REPL line. Slash commands map through the registry; any other
/// non-empty text becomes the new instruction.
pub fn parse_command(text: &str) -> SessionCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return SessionCommand::Noop;
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return SessionCommand::SetInstruction(raw_trimmed.to_string());
    };
    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return SessionCommand::SetInstruction(raw_trimmed.to_string());
    }
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    let Some(spec) = find_command(&command) else {
        return SessionCommand::Unknown {
            command,
            arg: arg.to_string(),
        };
    };

    match spec.kind {
        CommandKind::NoArg => match spec.action {
            "start_processing" => SessionCommand::StartProcessing,
            "discard" => SessionCommand::Discard,
            "list_history" => SessionCommand::ListHistory,
            "status" => SessionCommand::Status,
            "help" => SessionCommand::Help,
            _ => SessionCommand::Quit,
        },
        CommandKind::RawText => {
            if arg.is_empty() {
                SessionCommand::ResetInstruction
            } else {
                SessionCommand::SetInstruction(arg.to_string())
            }
        }
        CommandKind::SinglePath => {
            let path = parse_single_path_arg(arg);
            if path.is_empty() {
                invalid(&command, format!("usage: {}", spec.usage))
            } else {
                SessionCommand::LoadSource(path)
            }
        }
        CommandKind::OptionalPath => {
            let path = parse_single_path_arg(arg);
            SessionCommand::Download(if path.is_empty() { None } else { Some(path) })
        }
        CommandKind::Mode => match arg.parse::<Mode>() {
            Ok(mode) => SessionCommand::SelectMode(mode),
            Err(reason) => invalid(&command, reason),
        },
        CommandKind::Aspect => match arg.parse::<AspectRatio>() {
            Ok(ratio) => SessionCommand::SetAspectRatio(ratio),
            Err(reason) => invalid(&command, reason),
        },
        CommandKind::Index => match arg.parse::<usize>() {
            Ok(index) if index >= 1 => SessionCommand::SelectHistoryEntry(index - 1),
            _ => invalid(&command, format!("usage: {} (1-based)", spec.usage)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_command, SessionCommand};
    use crate::assets::{AspectRatio, Mode};

    #[test]
    fn parse_load_with_quoted_path() {
        assert_eq!(
            parse_command("/load \"/tmp/my logo.png\""),
            SessionCommand::LoadSource("/tmp/my logo.png".to_string())
        );
        assert_eq!(
            parse_command("  /load   a.png  "),
            SessionCommand::LoadSource("a.png".to_string())
        );
        assert!(matches!(
            parse_command("/load"),
            SessionCommand::Invalid { .. }
        ));
    }

    #[test]
    fn parse_mode_and_aspect() {
        assert_eq!(
            parse_command("/mode video"),
            SessionCommand::SelectMode(Mode::Video)
        );
        assert_eq!(
            parse_command("/aspect 9:16"),
            SessionCommand::SetAspectRatio(AspectRatio::Portrait)
        );
        match parse_command("/mode audio") {
            SessionCommand::Invalid { command, reason } => {
                assert_eq!(command, "mode");
                assert!(reason.contains("audio"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_select_is_one_based() {
        assert_eq!(
            parse_command("/select 1"),
            SessionCommand::SelectHistoryEntry(0)
        );
        assert!(matches!(
            parse_command("/select 0"),
            SessionCommand::Invalid { .. }
        ));
    }

    #[test]
    fn plain_text_sets_instruction() {
        assert_eq!(
            parse_command("remove the corner logo"),
            SessionCommand::SetInstruction("remove the corner logo".to_string())
        );
        assert_eq!(
            parse_command("/instruction keep the sky"),
            SessionCommand::SetInstruction("keep the sky".to_string())
        );
        assert_eq!(parse_command("/instruction"), SessionCommand::ResetInstruction);
        assert_eq!(parse_command("   "), SessionCommand::Noop);
    }

    #[test]
    fn refine_aliases_start_and_download_dir_is_optional() {
        assert_eq!(parse_command("/refine"), SessionCommand::StartProcessing);
        assert_eq!(parse_command("/START"), SessionCommand::StartProcessing);
        assert_eq!(parse_command("/download"), SessionCommand::Download(None));
        assert_eq!(
            parse_command("/download out"),
            SessionCommand::Download(Some("out".to_string()))
        );
        assert_eq!(parse_command("/exit"), SessionCommand::Quit);
    }

    #[test]
    fn parse_unknown_command() {
        assert_eq!(
            parse_command("/magic foo bar"),
            SessionCommand::Unknown {
                command: "magic".to_string(),
                arg: "foo bar".to_string(),
            }
        );
    }
}
