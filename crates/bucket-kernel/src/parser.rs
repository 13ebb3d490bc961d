//! Command recognition.
//!
//! An utterance is *addressed* when it starts with the bot's nick followed
//! by `:` or `,`. The text after that prefix is matched against the command
//! forms below; anything else addressed is a query. Utterances that are not
//! addressed become an implicit query on their last `:`-separated segment.

use bucket_types::factoid::Verb;
use regex_lite::Regex;
use std::sync::OnceLock;

/// A recognized addressed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `<key> is|are|<verb> <value>`
    Teach { key: String, verb: Verb, value: String },
    /// `remember <speaker> <substring>`
    Remember { speaker: String, needle: String },
    /// `combine <n> <key>`
    Combine { key: String, times: usize },
    /// `what was that?`
    RecallLast,
    /// `delete <key> #<index>`
    Delete { key: String, index: usize },
    /// `delete all <key>`
    DeleteAll { key: String },
    /// `undo last`
    UndoLast,
    /// Anything else with text.
    Query { key: String },
    /// Addressed with nothing after the prefix.
    Empty,
}

/// The outcome of parsing one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Utterance {
    /// Addressed to the bot.
    Addressed(Command),
    /// Ordinary channel chatter; `key` is the implicit query, if any.
    Overheard { key: Option<String> },
}

struct Patterns {
    is: Regex,
    are: Regex,
    verb: Regex,
    remember: Regex,
    combine: Regex,
    what_was: Regex,
    delete: Regex,
    delete_all: Regex,
    undo: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        is: Regex::new(r"^(.+) is (.+)$").expect("is regex is valid"),
        are: Regex::new(r"^(.+) are (.+)$").expect("are regex is valid"),
        verb: Regex::new(r"^(.+) <([^<>]+)> (.+)$").expect("verb regex is valid"),
        remember: Regex::new(r"^remember (\S+) (.+)$").expect("remember regex is valid"),
        combine: Regex::new(r"^combine (\d) (.+)$").expect("combine regex is valid"),
        what_was: Regex::new(r"^what was that\?").expect("what-was regex is valid"),
        delete: Regex::new(r"^delete (.+) #(\d+)").expect("delete regex is valid"),
        delete_all: Regex::new(r"^delete all (.+)$").expect("delete-all regex is valid"),
        undo: Regex::new(r"^undo last").expect("undo regex is valid"),
    })
}

/// Return the text after `<nick>:` or `<nick>,`, if the utterance is addressed.
///
/// Nick comparison is ASCII case-insensitive, as IRC nicks are.
pub fn addressed_text<'a>(text: &'a str, nick: &str) -> Option<&'a str> {
    let text = text.trim();
    let head = text.get(..nick.len())?;
    if nick.is_empty() || !head.eq_ignore_ascii_case(nick) {
        return None;
    }
    let rest = &text[nick.len()..];
    let rest = rest.strip_prefix(':').or_else(|| rest.strip_prefix(','))?;
    Some(rest.trim())
}

/// Strip the trailing `?`/`!` people put on questions.
fn query_key(text: &str) -> &str {
    text.trim()
        .trim_end_matches(['?', '!'])
        .trim_end()
}

/// Parse one utterance from the channel.
pub fn parse(text: &str, nick: &str) -> Utterance {
    match addressed_text(text, nick) {
        Some(rest) => Utterance::Addressed(parse_command(rest)),
        None => {
            let segment = text.rsplit(':').next().unwrap_or(text);
            let key = query_key(segment);
            Utterance::Overheard {
                key: (!key.is_empty()).then(|| key.to_string()),
            }
        }
    }
}

/// Parse the addressed text (prefix already removed).
///
/// Commands that act immediately take precedence over teaching, except
/// `delete all`, which only applies when the text is not a teach form.
/// Among the teach forms a bracketed verb beats `are`, which beats `is`.
pub fn parse_command(rest: &str) -> Command {
    let p = patterns();
    let rest = rest.trim();

    if let Some(c) = p.remember.captures(rest) {
        return Command::Remember {
            speaker: c[1].to_string(),
            needle: c[2].to_string(),
        };
    }

    if let Some(c) = p.combine.captures(rest) {
        if let Ok(times) = c[1].parse() {
            return Command::Combine {
                key: c[2].trim().to_string(),
                times,
            };
        }
    }

    if p.what_was.is_match(rest) {
        return Command::RecallLast;
    }

    if let Some(c) = p.delete.captures(rest) {
        if let Ok(index) = c[2].parse() {
            return Command::Delete {
                key: c[1].to_string(),
                index,
            };
        }
    }

    if let Some(c) = p.delete_all.captures(rest) {
        if parse_teach(rest).is_none() {
            return Command::DeleteAll {
                key: c[1].to_string(),
            };
        }
    }

    if p.undo.is_match(rest) {
        return Command::UndoLast;
    }

    if let Some(teach) = parse_teach(rest) {
        return teach;
    }

    let key = query_key(rest);
    if key.is_empty() {
        Command::Empty
    } else {
        Command::Query {
            key: key.to_string(),
        }
    }
}

fn parse_teach(rest: &str) -> Option<Command> {
    let p = patterns();
    let teach = |c: regex_lite::Captures<'_>, verb: Verb, value_group: usize| Command::Teach {
        key: c[1].to_string(),
        verb,
        value: c[value_group].trim().to_string(),
    };

    if let Some(c) = p.verb.captures(rest) {
        let verb = Verb::from_bracketed(&c[2]);
        return Some(teach(c, verb, 3));
    }
    if let Some(c) = p.are.captures(rest) {
        return Some(teach(c, Verb::Are, 2));
    }
    if let Some(c) = p.is.captures(rest) {
        return Some(teach(c, Verb::Is, 2));
    }
    None
}
