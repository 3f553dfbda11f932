//! # MI Commands
//!
//! Parsing of request lines: `[token]-<verb> <args>`.
//!
//! The token is everything before the first `-`; it is echoed back in front
//! of the reply. Lines without a `-` have an empty token and are parsed as a
//! bare verb.

use std::str::FromStr;

use manadbg_core::breakpoints::BreakpointId;
use manadbg_core::process::MAX_READ_LEN;
use manadbg_core::stepping::StepMode;
use manadbg_core::types::Address;

use crate::error::ProtocolError;

/// A parsed MI command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command
{
    ThreadInfo,
    ExecContinue,
    ExecInterrupt,
    /// `exec-step`, `exec-next`, `exec-finish`
    Step(StepMode),
    BreakInsert
    {
        file: String, line: u32
    },
    BreakDelete(Vec<BreakpointId>),
    BreakList,
    StackListFrames,
    StackListVariables
    {
        frame: usize
    },
    EvaluateExpression
    {
        expression: String,
        frame: usize,
    },
    ReadMemoryBytes
    {
        address: Address, count: usize
    },
    GdbExit,
}

/// Split a request line into its token and command text.
///
/// ```rust
/// use manadbg_protocol::command::split_token;
///
/// assert_eq!(split_token("12-exec-continue"), ("12", "exec-continue"));
/// assert_eq!(split_token("-thread-info"), ("", "thread-info"));
/// assert_eq!(split_token("gdb"), ("", "gdb"));
/// ```
pub fn split_token(line: &str) -> (&str, &str)
{
    match line.split_once('-') {
        Some((token, command)) => (token, command),
        None => ("", line),
    }
}

impl FromStr for Command
{
    type Err = ProtocolError;

    fn from_str(text: &str) -> Result<Self, Self::Err>
    {
        let text = text.trim();
        let (verb, args) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
        let args = args.trim();

        let command = match verb {
            "thread-info" => Command::ThreadInfo,
            "exec-continue" => Command::ExecContinue,
            "exec-interrupt" => Command::ExecInterrupt,
            "exec-next" => Command::Step(StepMode::Over),
            "exec-step" => Command::Step(StepMode::In),
            "exec-finish" => Command::Step(StepMode::Out),
            "break-insert" => parse_break_insert(args)?,
            "break-delete" => parse_break_delete(args)?,
            "break-list" => Command::BreakList,
            "stack-list-frames" => Command::StackListFrames,
            "stack-list-variables" => Command::StackListVariables {
                frame: frame_option("stack-list-variables", args)?.0,
            },
            "data-evaluate-expression" => parse_evaluate(args)?,
            "data-read-memory-bytes" => parse_read_memory(args)?,
            "gdb-exit" => Command::GdbExit,
            _ => return Err(ProtocolError::UnknownCommand(text.to_string())),
        };
        Ok(command)
    }
}

/// `break-insert [options] <file>:<line>`; leading `-` options are ignored.
fn parse_break_insert(args: &str) -> Result<Command, ProtocolError>
{
    const VERB: &str = "break-insert";
    let location = args
        .split_whitespace()
        .rfind(|arg| !arg.starts_with('-'))
        .ok_or_else(|| ProtocolError::malformed(VERB, "missing location"))?;
    let (file, line) = location
        .rsplit_once(':')
        .ok_or_else(|| ProtocolError::malformed(VERB, "Unknown breakpoint location format"))?;
    let file = file.trim_matches('"');
    let line = line
        .parse::<u32>()
        .ok()
        .filter(|line| *line > 0 && !file.is_empty())
        .ok_or_else(|| ProtocolError::malformed(VERB, "Unknown breakpoint location format"))?;
    Ok(Command::BreakInsert {
        file: file.to_string(),
        line,
    })
}

fn parse_break_delete(args: &str) -> Result<Command, ProtocolError>
{
    const VERB: &str = "break-delete";
    let ids = args
        .split_whitespace()
        .map(|id| {
            id.parse::<u32>()
                .map(BreakpointId::from_raw)
                .map_err(|_| ProtocolError::malformed(VERB, format!("invalid breakpoint number '{id}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if ids.is_empty() {
        return Err(ProtocolError::malformed(VERB, "missing breakpoint number"));
    }
    Ok(Command::BreakDelete(ids))
}

/// Extract `--frame N` from `args`, dropping `--thread N` and value-printing
/// options. Returns the frame and the remaining text.
fn frame_option<'a>(verb: &'static str, args: &'a str) -> Result<(usize, &'a str), ProtocolError>
{
    let mut frame = 0;
    let mut rest = args.trim_start();
    loop {
        let (word, after) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        match word {
            "--frame" | "--thread" => {
                let (value, after) = after.trim_start().split_once(char::is_whitespace).unwrap_or((after.trim_start(), ""));
                let value = value
                    .parse::<usize>()
                    .map_err(|_| ProtocolError::malformed(verb, format!("invalid value for {word}: '{value}'")))?;
                if word == "--frame" {
                    frame = value;
                }
                rest = after.trim_start();
            }
            "--no-values" | "--all-values" | "--simple-values" | "0" | "1" | "2" if verb == "stack-list-variables" => {
                rest = after.trim_start();
            }
            _ => return Ok((frame, rest)),
        }
    }
}

fn parse_evaluate(args: &str) -> Result<Command, ProtocolError>
{
    const VERB: &str = "data-evaluate-expression";
    let (frame, expression) = frame_option(VERB, args)?;
    let expression = unquote(expression.trim());
    if expression.is_empty() {
        return Err(ProtocolError::malformed(VERB, "missing expression"));
    }
    Ok(Command::EvaluateExpression { expression, frame })
}

/// Strip one pair of surrounding double quotes and undo `\"` and `\\`.
fn unquote(text: &str) -> String
{
    let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) else {
        return text.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match (c, chars.clone().next()) {
            ('\\', Some(next @ ('"' | '\\'))) => {
                out.push(next);
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

fn parse_read_memory(args: &str) -> Result<Command, ProtocolError>
{
    const VERB: &str = "data-read-memory-bytes";
    let mut words = args.split_whitespace();
    let mut offset = 0_u64;
    let mut address = None;
    let mut count = None;

    while let Some(word) = words.next() {
        if word == "-o" {
            let value = words.next().ok_or_else(|| ProtocolError::malformed(VERB, "missing offset"))?;
            offset = parse_number(value).ok_or_else(|| ProtocolError::malformed(VERB, format!("invalid offset '{value}'")))?;
        } else if address.is_none() {
            address = Some(parse_number(word).ok_or_else(|| ProtocolError::malformed(VERB, format!("invalid address '{word}'")))?);
        } else if count.is_none() {
            count = Some(parse_number(word).ok_or_else(|| ProtocolError::malformed(VERB, format!("invalid count '{word}'")))?);
        } else {
            return Err(ProtocolError::malformed(VERB, format!("unexpected argument '{word}'")));
        }
    }

    let (Some(address), Some(count)) = (address, count) else {
        return Err(ProtocolError::malformed(VERB, "usage: data-read-memory-bytes [-o offset] address count"));
    };
    let count = usize::try_from(count)
        .ok()
        .filter(|count| *count <= MAX_READ_LEN)
        .ok_or_else(|| ProtocolError::malformed(VERB, format!("count exceeds {MAX_READ_LEN} bytes")))?;
    Ok(Command::ReadMemoryBytes {
        address: Address::new(address) + offset,
        count,
    })
}

/// Decimal, or hexadecimal with a `0x` prefix.
fn parse_number(text: &str) -> Option<u64>
{
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}
