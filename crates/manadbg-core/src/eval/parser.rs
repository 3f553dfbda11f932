//! # Expression Compiler
//!
//! Turns watch expressions into the postfix program run by the
//! [`EvalStackMachine`](super::EvalStackMachine).
//!
//! The accepted language is the part of C# a watch window needs:
//!
//! - identifiers, `this`, dotted access `a.b`, null-conditional `a?.b`
//! - element access `a[i, j]` and `a?[i]`
//! - invocation `f(x)`, `a.f(x, y)`, `a?.f()`
//! - literals: integers (decimal and `0x` hex), reals (`1.5`, `2f`), decimals
//!   (`1.5m`), strings, characters, `true`, `false`, `null`
//! - unary minus on numeric literals and parentheses
//!
//! ## Example
//!
//! ```rust
//! use manadbg_core::eval::{compile, EvalCommand};
//!
//! let program = compile("order?.Lines[0]").unwrap();
//! assert_eq!(program, vec![
//!     EvalCommand::Identifier("order".into()),
//!     EvalCommand::MemberAccess { name: "Lines".into(), conditional: true },
//!     EvalCommand::Literal(manadbg_core::eval::Literal::Int(0)),
//!     EvalCommand::ElementAccess { indices: 1, conditional: false },
//! ]);
//! ```

use crate::error::EvalError;
use crate::types::Decimal;

/// Literal constant of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal
{
    Int(i64),
    /// Integer too large for `i64`.
    UInt(u64),
    Float(f64),
    Decimal(Decimal),
    String(String),
    Char(char),
    Bool(bool),
    Null,
}

/// One instruction of the postfix program.
///
/// Every command pops its operands and pushes exactly one entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalCommand
{
    /// Push an unresolved identifier.
    Identifier(String),
    /// Push `this` of the frame.
    This,
    Literal(Literal),
    /// Pop a receiver, push its member `name`.
    MemberAccess
    {
        name: String, conditional: bool
    },
    /// Pop `indices` index operands and an array, push the element.
    ElementAccess
    {
        indices: usize, conditional: bool
    },
    /// Pop `args` arguments and, when `receiver` is set, the receiver; push the call result.
    Invocation
    {
        method: String,
        args: usize,
        receiver: bool,
        conditional: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token
{
    Ident(String),
    This,
    Literal(Literal),
    Dot,
    QuestionDot,
    QuestionBracket,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Minus,
}

/// Deepest nesting of parentheses, brackets and argument lists.
const MAX_DEPTH: usize = 256;

fn syntax(position: usize, message: impl Into<String>) -> EvalError
{
    EvalError::Syntax {
        position,
        message: message.into(),
    }
}

/// Compile `expression` into a postfix program.
pub fn compile(expression: &str) -> Result<Vec<EvalCommand>, EvalError>
{
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: expression.len(),
        depth: 0,
        program: Vec::new(),
    };
    parser.expression()?;
    if let Some((position, token)) = parser.tokens.get(parser.pos) {
        return Err(syntax(*position, format!("unexpected {token:?}")));
    }
    Ok(parser.program)
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, EvalError>
{
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '.' if !matches!(text[start + 1..].chars().next(), Some(d) if d.is_ascii_digit()) => {
                chars.next();
                Token::Dot
            }
            '?' => {
                chars.next();
                match chars.next() {
                    Some((_, '.')) => Token::QuestionDot,
                    Some((_, '[')) => Token::QuestionBracket,
                    _ => return Err(syntax(start, "expected '.' or '[' after '?'")),
                }
            }
            '[' | ']' | '(' | ')' | ',' | '-' => {
                chars.next();
                match c {
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    _ => Token::Minus,
                }
            }
            '"' => {
                chars.next();
                Token::Literal(Literal::String(quoted(&mut chars, '"', start)?))
            }
            '\'' => {
                chars.next();
                let body = quoted(&mut chars, '\'', start)?;
                let mut body_chars = body.chars();
                match (body_chars.next(), body_chars.next()) {
                    (Some(ch), None) => Token::Literal(Literal::Char(ch)),
                    _ => return Err(syntax(start, "character literal must hold one character")),
                }
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '.' || d == '_' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Literal(number(&text[start..end], start)?)
            }
            c if c == '_' || c == '$' || c == '@' || c.is_alphabetic() => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d == '_' || d == '$' || d == '@' || d.is_alphanumeric() {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                match &text[start..end] {
                    "this" => Token::This,
                    "true" => Token::Literal(Literal::Bool(true)),
                    "false" => Token::Literal(Literal::Bool(false)),
                    "null" => Token::Literal(Literal::Null),
                    word => Token::Ident(word.trim_start_matches('@').to_string()),
                }
            }
            other => return Err(syntax(start, format!("unexpected character '{other}'"))),
        };
        tokens.push((start, token));
    }

    Ok(tokens)
}

/// Body of a quoted literal, after its opening quote.
fn quoted(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>, quote: char, start: usize) -> Result<String, EvalError>
{
    let mut body = String::new();
    loop {
        match chars.next() {
            None => return Err(syntax(start, "unterminated literal")),
            Some((_, c)) if c == quote => return Ok(body),
            Some((at, '\\')) => {
                let escaped = match chars.next() {
                    Some((_, 'n')) => '\n',
                    Some((_, 't')) => '\t',
                    Some((_, 'r')) => '\r',
                    Some((_, '0')) => '\0',
                    Some((_, c @ ('\\' | '"' | '\''))) => c,
                    _ => return Err(syntax(at, "unknown escape sequence")),
                };
                body.push(escaped);
            }
            Some((_, c)) => body.push(c),
        }
    }
}

fn number(text: &str, position: usize) -> Result<Literal, EvalError>
{
    let invalid = || syntax(position, format!("invalid numeric literal '{text}'"));
    let digits = text.replace('_', "");

    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        let value = u64::from_str_radix(hex, 16).map_err(|_| invalid())?;
        return Ok(i64::try_from(value).map_or(Literal::UInt(value), Literal::Int));
    }

    let (body, suffix) = match digits.char_indices().find(|(_, c)| c.is_ascii_alphabetic()) {
        Some((i, _)) => digits.split_at(i),
        None => (digits.as_str(), ""),
    };
    match suffix.to_ascii_lowercase().as_str() {
        "m" => Decimal::parse(body).map(Literal::Decimal).ok_or_else(invalid),
        "f" | "d" => body.parse::<f64>().map(Literal::Float).map_err(|_| invalid()),
        "" if body.contains('.') => body.parse::<f64>().map(Literal::Float).map_err(|_| invalid()),
        "" | "l" | "u" | "ul" | "lu" => match body.parse::<i64>() {
            Ok(value) => Ok(Literal::Int(value)),
            Err(_) => body.parse::<u64>().map(Literal::UInt).map_err(|_| invalid()),
        },
        _ => Err(invalid()),
    }
}

struct Parser
{
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
    program: Vec<EvalCommand>,
}

impl Parser
{
    fn peek(&self) -> Option<&Token>
    {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn position(&self) -> usize
    {
        self.tokens.get(self.pos).map_or(self.end, |(position, _)| *position)
    }

    fn next(&mut self) -> Option<Token>
    {
        let token = self.tokens.get(self.pos).map(|(_, token)| token.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), EvalError>
    {
        let position = self.position();
        match self.next() {
            Some(token) if token == *expected => Ok(()),
            Some(token) => Err(syntax(position, format!("expected {expected:?}, found {token:?}"))),
            None => Err(syntax(position, format!("expected {expected:?}"))),
        }
    }

    fn identifier(&mut self) -> Result<String, EvalError>
    {
        let position = self.position();
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            _ => Err(syntax(position, "expected a member name")),
        }
    }

    fn expression(&mut self) -> Result<(), EvalError>
    {
        if self.depth == MAX_DEPTH {
            return Err(syntax(self.position(), "expression is nested too deeply"));
        }
        self.depth += 1;
        let result = self.nested_expression();
        self.depth -= 1;
        result
    }

    fn nested_expression(&mut self) -> Result<(), EvalError>
    {
        if self.peek() == Some(&Token::Minus) {
            let position = self.position();
            self.pos += 1;
            return match self.next() {
                Some(Token::Literal(literal)) => {
                    let negated = negate(literal).ok_or_else(|| syntax(position, "'-' applies to numbers only"))?;
                    self.program.push(EvalCommand::Literal(negated));
                    self.postfix()
                }
                _ => Err(syntax(position, "'-' applies to numeric literals only")),
            };
        }
        self.primary()?;
        self.postfix()
    }

    fn primary(&mut self) -> Result<(), EvalError>
    {
        let position = self.position();
        match self.next() {
            Some(Token::Ident(name)) => self.program.push(EvalCommand::Identifier(name)),
            Some(Token::This) => self.program.push(EvalCommand::This),
            Some(Token::Literal(literal)) => self.program.push(EvalCommand::Literal(literal)),
            Some(Token::LParen) => {
                self.expression()?;
                self.expect(&Token::RParen)?;
            }
            Some(token) => return Err(syntax(position, format!("unexpected {token:?}"))),
            None => return Err(syntax(position, "unexpected end of expression")),
        }
        Ok(())
    }

    fn postfix(&mut self) -> Result<(), EvalError>
    {
        loop {
            match self.peek() {
                Some(Token::Dot) | Some(Token::QuestionDot) => {
                    let conditional = self.next() == Some(Token::QuestionDot);
                    let name = self.identifier()?;
                    self.program.push(EvalCommand::MemberAccess { name, conditional });
                }
                Some(Token::LBracket) | Some(Token::QuestionBracket) => {
                    let conditional = self.next() == Some(Token::QuestionBracket);
                    let indices = self.arguments(&Token::RBracket)?;
                    if indices == 0 {
                        return Err(syntax(self.position(), "element access needs an index"));
                    }
                    self.program.push(EvalCommand::ElementAccess { indices, conditional });
                }
                Some(Token::LParen) => {
                    let position = self.position();
                    let callee = self.program.pop();
                    self.pos += 1;
                    let (method, receiver, conditional) = match callee {
                        Some(EvalCommand::Identifier(name)) => (name, false, false),
                        Some(EvalCommand::MemberAccess { name, conditional }) => (name, true, conditional),
                        _ => return Err(syntax(position, "expression is not invocable")),
                    };
                    let args = self.arguments(&Token::RParen)?;
                    self.program.push(EvalCommand::Invocation {
                        method,
                        args,
                        receiver,
                        conditional,
                    });
                }
                _ => return Ok(()),
            }
        }
    }

    /// Comma-separated expressions up to `close`, which is consumed.
    fn arguments(&mut self, close: &Token) -> Result<usize, EvalError>
    {
        if self.peek() == Some(close) {
            self.pos += 1;
            return Ok(0);
        }
        let mut count = 0;
        loop {
            self.expression()?;
            count += 1;
            if self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                continue;
            }
            self.expect(close)?;
            return Ok(count);
        }
    }
}

fn negate(literal: Literal) -> Option<Literal>
{
    match literal {
        Literal::Int(value) => Some(Literal::Int(-value)),
        Literal::UInt(value) if value == i64::MIN.unsigned_abs() => Some(Literal::Int(i64::MIN)),
        Literal::Float(value) => Some(Literal::Float(-value)),
        Literal::Decimal(value) => Some(Literal::Decimal(value.negate())),
        _ => None,
    }
}
