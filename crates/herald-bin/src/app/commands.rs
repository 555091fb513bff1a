//! Chat prefix commands.

use discord_gateway::ChatMessage;

/// A recognised chat command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
}

/// Parse `message` as a prefix command. Bot authors are ignored.
pub fn parse_command(prefix: &str, message: &ChatMessage) -> Option<Command> {
    if message.author_is_bot {
        return None;
    }
    let body = message.content.trim().strip_prefix(prefix)?;
    match body.split_whitespace().next()? {
        name if name.eq_ignore_ascii_case("status") => Some(Command::Status),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(content: &str, bot: bool) -> ChatMessage {
        ChatMessage {
            channel_id: "1".to_string(),
            author_is_bot: bot,
            content: content.to_string(),
        }
    }

    #[test]
    fn status_with_prefix() {
        assert_eq!(parse_command("!", &chat("!status", false)), Some(Command::Status));
        assert_eq!(parse_command("!", &chat("  !status  ", false)), Some(Command::Status));
        assert_eq!(parse_command("h?", &chat("h?STATUS now", false)), Some(Command::Status));
    }

    #[test]
    fn ignores_other_messages() {
        assert_eq!(parse_command("!", &chat("status", false)), None);
        assert_eq!(parse_command("!", &chat("!statusx", false)), None);
        assert_eq!(parse_command("!", &chat("!", false)), None);
        assert_eq!(parse_command("!", &chat("!help", false)), None);
    }

    #[test]
    fn ignores_bots() {
        assert_eq!(parse_command("!", &chat("!status", true)), None);
    }
}
