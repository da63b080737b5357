//! REPL command parser
//!
//! One line in, one `Command` out. Store mutations become `Command::Dispatch`;
//! everything else is handled by the REPL itself.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::types::{Action, PartOfSpeech, View};

lazy_static! {
    // add <part> <word>
    static ref RE_ADD: Regex = Regex::new(r"(?i)^add\s+([a-z]+)\s+(\S+)$").unwrap();

    // remove <word id>
    static ref RE_REMOVE: Regex = Regex::new(r"(?i)^remove\s+(\d+)$").unwrap();

    // pattern <pattern id>
    static ref RE_PATTERN: Regex = Regex::new(r"(?i)^pattern\s+([A-Za-z][A-Za-z0-9_-]*)$").unwrap();

    // challenge <id> [progress]
    static ref RE_CHALLENGE: Regex = Regex::new(r"(?i)^challenge\s+([a-z0-9_]+)(?:\s+(\d+))?$").unwrap();

    // generate <topic> [level]
    static ref RE_GENERATE: Regex = Regex::new(r"(?i)^generate\s+(\S+)(?:\s+(\S+))?$").unwrap();

    // view <name>
    static ref RE_VIEW: Regex = Regex::new(r"(?i)^view\s+(builder|dashboard|achievements|settings)$").unwrap();

    // favorite <word>
    static ref RE_FAVORITE: Regex = Regex::new(r"(?i)^fav(?:orite)?\s+(\S+)$").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Dispatch(Action),
    Undo,
    Redo,
    Sync,
    Status,
    Queue,
    Patterns,
    Generate { topic: String, level: String },
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown part of speech '{0}'")]
    UnknownPart(String),

    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("number out of range: {0}")]
    BadNumber(String),
}

/// Parse one REPL line. Blank lines are `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let simple = match line.to_lowercase().as_str() {
        "validate" | "check" => Some(Command::Dispatch(Action::ValidateSentence)),
        "clear" => Some(Command::Dispatch(Action::ClearSentence)),
        "online" => Some(Command::Dispatch(Action::SetOnline { online: true })),
        "offline" => Some(Command::Dispatch(Action::SetOnline { online: false })),
        "reset" => Some(Command::Dispatch(Action::Reset)),
        "dismiss" => Some(Command::Dispatch(Action::DismissAchievement)),
        "undo" => Some(Command::Undo),
        "redo" => Some(Command::Redo),
        "sync" => Some(Command::Sync),
        "status" => Some(Command::Status),
        "queue" => Some(Command::Queue),
        "patterns" => Some(Command::Patterns),
        "help" | "?" => Some(Command::Help),
        "quit" | "exit" | "q" => Some(Command::Quit),
        _ => None,
    };
    if simple.is_some() {
        return Ok(simple);
    }

    if let Some(caps) = RE_ADD.captures(line) {
        let part = PartOfSpeech::parse(&caps[1]).ok_or_else(|| CommandError::UnknownPart(caps[1].to_string()))?;
        return Ok(Some(Command::Dispatch(Action::AddWord { word: caps[2].to_string(), part })));
    }

    if let Some(caps) = RE_REMOVE.captures(line) {
        let id = number::<u64>(&caps[1])?;
        return Ok(Some(Command::Dispatch(Action::RemoveWord { id })));
    }

    if let Some(caps) = RE_PATTERN.captures(line) {
        return Ok(Some(Command::Dispatch(Action::SelectPattern { pattern: caps[1].to_string() })));
    }

    if let Some(caps) = RE_CHALLENGE.captures(line) {
        let id = caps[1].to_lowercase();
        let action = match caps.get(2) {
            Some(progress) => Action::UpdateChallengeProgress { id, progress: number(progress.as_str())? },
            None => Action::StartChallenge { id },
        };
        return Ok(Some(Command::Dispatch(action)));
    }

    if let Some(caps) = RE_GENERATE.captures(line) {
        let level = caps.get(2).map_or("basic", |m| m.as_str());
        return Ok(Some(Command::Generate { topic: caps[1].to_string(), level: level.to_string() }));
    }

    if let Some(caps) = RE_VIEW.captures(line) {
        let view = match caps[1].to_lowercase().as_str() {
            "dashboard" => View::Dashboard,
            "achievements" => View::Achievements,
            "settings" => View::Settings,
            _ => View::Builder,
        };
        return Ok(Some(Command::Dispatch(Action::SetActiveView { view })));
    }

    if let Some(caps) = RE_FAVORITE.captures(line) {
        return Ok(Some(Command::Dispatch(Action::ToggleFavorite { word: caps[1].to_string() })));
    }

    Err(CommandError::Unknown(line.to_string()))
}

fn number<T: std::str::FromStr>(raw: &str) -> Result<T, CommandError> {
    raw.parse().map_err(|_| CommandError::BadNumber(raw.to_string()))
}

pub const HELP: &str = "\
Commands:
  add <part> <word>        add a word (article, subject, verb, adjective, object,
                           preposition, place, adverb, conjunction)
  remove <id>              remove a word by id
  pattern <id>             select a pattern      patterns   list patterns
  validate | clear         check or archive the current sentence
  undo | redo              step through history
  challenge <id> [pct]     start a challenge or report progress
  generate <topic> [lvl]   generated content (uses a credit)
  favorite <word>          toggle a favorite word
  view <name>              builder, dashboard, achievements, settings
  online | offline         toggle connectivity
  sync | queue | status    sync now, show the queue, show progress
  reset | dismiss | quit";
