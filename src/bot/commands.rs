//! Parser de comandos con prefijo: emparejado de strings fino, sin más.

/// Comandos reconocidos por el bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Play { query: &'a str },
    Skip,
    Stop,
    Queue,
    NowPlaying,
    Chat { prompt: &'a str },
    ClearChat,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome<'a> {
    Command(Command<'a>),
    /// El comando existe pero le falta su argumento; se devuelve el uso
    MissingArgument(&'static str),
    Unknown(&'a str),
}

/// `None` si el mensaje no lleva el prefijo o queda vacío tras quitarlo
pub fn parse<'a>(content: &'a str, prefix: &str) -> Option<ParseOutcome<'a>> {
    let rest = content.strip_prefix(prefix)?.trim();
    if rest.is_empty() {
        return None;
    }

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    let outcome = match name.to_lowercase().as_str() {
        "play" | "p" => {
            if args.is_empty() {
                ParseOutcome::MissingArgument("play <búsqueda o URL>")
            } else {
                ParseOutcome::Command(Command::Play { query: args })
            }
        }
        "skip" | "next" => ParseOutcome::Command(Command::Skip),
        "stop" | "leave" | "disconnect" => ParseOutcome::Command(Command::Stop),
        "queue" | "q" => ParseOutcome::Command(Command::Queue),
        "nowplaying" | "np" => ParseOutcome::Command(Command::NowPlaying),
        "chat" => {
            if args.is_empty() {
                ParseOutcome::MissingArgument("chat <mensaje>")
            } else {
                ParseOutcome::Command(Command::Chat { prompt: args })
            }
        }
        "clearchat" => ParseOutcome::Command(Command::ClearChat),
        "help" => ParseOutcome::Command(Command::Help),
        _ => ParseOutcome::Unknown(name),
    };

    Some(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_ignores_messages_without_prefix() {
        assert_eq!(parse("hola mundo", "!"), None);
        assert_eq!(parse("!", "!"), None);
        assert_eq!(parse("!   ", "!"), None);
    }

    #[test]
    fn test_parse_play_with_query() {
        assert_eq!(
            parse("!play daft punk around the world", "!"),
            Some(ParseOutcome::Command(Command::Play {
                query: "daft punk around the world"
            }))
        );
        assert_eq!(
            parse("!p around the world", "!"),
            Some(ParseOutcome::Command(Command::Play {
                query: "around the world"
            }))
        );
    }

    #[test]
    fn test_parse_play_without_query_reports_usage() {
        assert_eq!(
            parse("!play", "!"),
            Some(ParseOutcome::MissingArgument("play <búsqueda o URL>"))
        );
    }

    #[test]
    fn test_parse_is_case_insensitive_on_the_name() {
        assert_eq!(parse("!SKIP", "!"), Some(ParseOutcome::Command(Command::Skip)));
        assert_eq!(
            parse("!NowPlaying", "!"),
            Some(ParseOutcome::Command(Command::NowPlaying))
        );
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(parse("!next", "!"), Some(ParseOutcome::Command(Command::Skip)));
        assert_eq!(parse("!q", "!"), Some(ParseOutcome::Command(Command::Queue)));
        assert_eq!(parse("!leave", "!"), Some(ParseOutcome::Command(Command::Stop)));
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(
            parse("!bailar", "!"),
            Some(ParseOutcome::Unknown("bailar"))
        );
    }

    #[test]
    fn test_parse_with_custom_prefix() {
        assert_eq!(
            parse("s!chat ¿cómo estás?", "s!"),
            Some(ParseOutcome::Command(Command::Chat {
                prompt: "¿cómo estás?"
            }))
        );
    }
}
