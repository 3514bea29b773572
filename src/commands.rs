//! Command parsing.

use crate::purge::query::DEFAULT_QUERY_LIMIT;

pub const HELP: &str = "\
/ask <persona> <question> - ask a persona a question
/personas - list personas
/purge <user> <amount> [keyword] [#topic] - delete a user's recent messages (moderators)
/purge <amount> [keyword] - same, replying to one of the user's messages (a leading number is always the amount)
/purgelogs [user] [limit] [#topic] - show recent purges (moderators, limit up to 20)
/setkey <key> - set the completion API key (owners, private chat)";

/// Who a moderation command is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Id(i64),
    Username(String),
    /// The author of the message the command replies to.
    Reply,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Ask { persona: String, question: String },
    Personas,
    SetKey { key: String },
    Purge {
        target: Target,
        amount: i64,
        keyword: Option<String>,
        topic: Option<i32>,
    },
    PurgeLogs {
        target: Option<Target>,
        limit: usize,
        topic: Option<i32>,
    },
}

/// Parse a message.
///
/// `Ok(None)` means the text is not a command for this bot. `Err` carries a
/// usage message for the sender.
pub fn parse(text: &str, bot_username: Option<&str>, is_reply: bool) -> Result<Option<Command>, String> {
    let text = text.trim();
    let Some(rest) = text.strip_prefix('/') else {
        return Ok(None);
    };

    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = match head.split_once('@') {
        Some((name, addressee)) => {
            let ours = bot_username.is_some_and(|b| b.eq_ignore_ascii_case(addressee));
            if !ours {
                return Ok(None);
            }
            name
        }
        None => head,
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "help" | "start" => Command::Help,
        "personas" => Command::Personas,
        "ask" => parse_ask(args)?,
        "setkey" => {
            if args.is_empty() {
                return Err("Usage: /setkey <key>".to_string());
            }
            Command::SetKey { key: args.to_string() }
        }
        "purge" => parse_purge(args, is_reply)?,
        "purgelogs" => parse_purge_logs(args, is_reply)?,
        _ => return Ok(None),
    };
    Ok(Some(command))
}

fn parse_ask(args: &str) -> Result<Command, String> {
    let (persona, question) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
    if persona.is_empty() || question.trim().is_empty() {
        return Err("Usage: /ask <persona> <question>".to_string());
    }
    Ok(Command::Ask {
        persona: persona.to_string(),
        question: question.trim().to_string(),
    })
}

fn parse_purge(args: &str, is_reply: bool) -> Result<Command, String> {
    const USAGE: &str = "Usage: /purge <user> <amount> [keyword] [#topic], or reply with /purge <amount> [keyword]";
    let (mut tokens, topic) = split_topic(args)?;
    if tokens.is_empty() {
        return Err(USAGE.to_string());
    }

    // In reply form only an @username overrides the replied-to author.
    let explicit_user = !is_reply || tokens[0].starts_with('@');

    let target = if explicit_user {
        let target = parse_target(tokens[0]).ok_or_else(|| USAGE.to_string())?;
        tokens.remove(0);
        target
    } else {
        Target::Reply
    };

    let Some(amount) = tokens.first() else {
        return Err(USAGE.to_string());
    };
    let amount: i64 = amount
        .parse()
        .map_err(|_| format!("Amount must be a whole number, got '{amount}'"))?;

    let keyword = tokens[1..].join(" ");
    Ok(Command::Purge {
        target,
        amount,
        keyword: if keyword.is_empty() { None } else { Some(keyword) },
        topic,
    })
}

fn parse_purge_logs(args: &str, is_reply: bool) -> Result<Command, String> {
    const USAGE: &str = "Usage: /purgelogs [user] [limit] [#topic]";
    let (tokens, topic) = split_topic(args)?;

    let (target, limit) = match tokens.as_slice() {
        [] => (None, None),
        [only] if only.starts_with('@') => (parse_target(only), None),
        [only] => (None, Some(*only)),
        [user, limit] => (Some(parse_target(user).ok_or_else(|| USAGE.to_string())?), Some(*limit)),
        _ => return Err(USAGE.to_string()),
    };

    let limit = match limit {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| format!("Limit must be a positive number, got '{raw}'"))?,
        None => DEFAULT_QUERY_LIMIT,
    };

    let target = target.or(if is_reply { Some(Target::Reply) } else { None });
    Ok(Command::PurgeLogs { target, limit, topic })
}

/// Split off a trailing `#<topic id>` token.
fn split_topic(args: &str) -> Result<(Vec<&str>, Option<i32>), String> {
    let mut tokens: Vec<&str> = args.split_whitespace().collect();
    let topic = match tokens.last().and_then(|t| t.strip_prefix('#')) {
        Some(raw) => {
            let id = raw.parse::<i32>().map_err(|_| format!("Topic must be a number, got '#{raw}'"))?;
            tokens.pop();
            Some(id)
        }
        None => None,
    };
    Ok((tokens, topic))
}

fn parse_target(token: &str) -> Option<Target> {
    if let Some(name) = token.strip_prefix('@') {
        return if name.is_empty() { None } else { Some(Target::Username(name.to_string())) };
    }
    token.parse::<i64>().ok().filter(|id| *id > 0).map(Target::Id)
}
