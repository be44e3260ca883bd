use crate::error::{OverlayError, Result};
use crate::keys::{KeyCombo, KeyEvent};
use crate::position::Point;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char, digit1, space0, space1};
use nom::combinator::{all_consuming, map, map_res, opt, recognize, rest, value};
use nom::error::{convert_error, VerboseError};
use nom::multi::separated_list1;
use nom::number::complete::double;
use nom::sequence::{delimited, pair, preceded, separated_pair};
use nom::{Err, IResult};

type ParseResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// One line of a replay script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptEvent {
    Toggle,
    Status,
    Tick(f64),
    Load(String),
    Key(KeyEvent),
    PointerDown(Point),
    PointerMove(Point),
    PointerUp,
    Command(String),
}

/// A parsed script event with its 1-based line number.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    pub line: usize,
    pub event: ScriptEvent,
}

pub fn parse_script(input: &str) -> Result<Vec<ScriptLine>> {
    let mut lines = Vec::new();
    for (i, raw) in input.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match all_consuming(delimited(space0, script_event, space0))(trimmed) {
            Ok((_, event)) => lines.push(ScriptLine { line: i + 1, event }),
            Err(err) => {
                return Err(OverlayError::ParseError(format!(
                    "Invalid script line {}:\n{}",
                    i + 1,
                    describe(trimmed, err)
                )))
            }
        }
    }
    Ok(lines)
}

pub fn parse_key_combo(input: &str) -> Result<KeyCombo> {
    let tokens = key_tokens_only(input)?;
    let (key, modifiers) = match tokens.split_last() {
        Some(split) => split,
        None => unreachable!("separated_list1 yields at least one token"),
    };

    let mut chars = key.chars();
    let key = match (chars.next(), chars.next()) {
        (Some(c), None) => c.to_ascii_uppercase(),
        _ => {
            return Err(OverlayError::ParseError(format!(
                "Shortcut key must be a single character, got '{}'",
                key
            )))
        }
    };

    let mut combo = KeyCombo {
        command: false,
        shift: false,
        alt: false,
        key,
    };
    for modifier in modifiers {
        match modifier.to_ascii_lowercase().as_str() {
            "mod" | "cmdorctrl" | "ctrl" | "control" | "cmd" | "command" | "meta" => {
                combo.command = true
            }
            "shift" => combo.shift = true,
            "alt" | "option" => combo.alt = true,
            other => {
                return Err(OverlayError::ParseError(format!(
                    "Unknown modifier '{}' in shortcut '{}'",
                    other, input
                )))
            }
        }
    }
    Ok(combo)
}

fn key_tokens_only(input: &str) -> Result<Vec<&str>> {
    match all_consuming(delimited(space0, key_tokens, space0))(input) {
        Ok((_, tokens)) => Ok(tokens),
        Err(err) => Err(OverlayError::ParseError(format!(
            "Invalid key combination '{}':\n{}",
            input,
            describe(input, err)
        ))),
    }
}

fn describe(input: &str, err: Err<VerboseError<&str>>) -> String {
    match err {
        Err::Error(err) | Err::Failure(err) => convert_error(input, err),
        Err::Incomplete(_) => unreachable!("Incomplete data received by non-streaming parser."),
    }
}

fn key_token(input: &str) -> ParseResult<'_, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != '+')(input)
}

fn key_tokens(input: &str) -> ParseResult<'_, Vec<&str>> {
    separated_list1(delimited(space0, char('+'), space0), key_token)(input)
}

fn key_event(input: &str) -> ParseResult<'_, KeyEvent> {
    map_res(key_tokens, |tokens: Vec<&str>| {
        let (key, modifiers) = tokens.split_last().ok_or("empty key combination")?;
        let mut event = KeyEvent {
            key: key.to_string(),
            ..KeyEvent::default()
        };
        for modifier in modifiers {
            match modifier.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => event.ctrl = true,
                "meta" | "cmd" | "command" => event.meta = true,
                "shift" => event.shift = true,
                "alt" | "option" => event.alt = true,
                _ => return Err("unknown modifier"),
            }
        }
        Ok(event)
    })(input)
}

fn integer(input: &str) -> ParseResult<'_, i32> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
        s.parse::<i32>()
    })(input)
}

fn point(input: &str) -> ParseResult<'_, Point> {
    map(separated_pair(integer, space1, integer), |(x, y)| {
        Point::new(x, y)
    })(input)
}

fn argument<'a, O, F>(keyword: &'static str, parser: F) -> impl FnMut(&'a str) -> ParseResult<'a, O>
where
    F: FnMut(&'a str) -> ParseResult<'a, O>,
{
    preceded(pair(tag(keyword), space1), parser)
}

fn script_event(input: &str) -> ParseResult<'_, ScriptEvent> {
    alt((
        map(argument("tick", double), ScriptEvent::Tick),
        value(ScriptEvent::Toggle, tag("toggle")),
        value(ScriptEvent::Status, tag("status")),
        map(argument("load", rest), |path: &str| {
            ScriptEvent::Load(path.trim().to_string())
        }),
        map(argument("key", key_event), ScriptEvent::Key),
        map(argument("down", point), ScriptEvent::PointerDown),
        map(argument("move", point), ScriptEvent::PointerMove),
        value(ScriptEvent::PointerUp, tag("up")),
        map(argument("command", rest), |json: &str| {
            ScriptEvent::Command(json.trim().to_string())
        }),
    ))(input)
}
