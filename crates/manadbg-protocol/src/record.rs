//! # MI Records
//!
//! Values and result lists of the MI output syntax:
//!
//! ```text
//! value  = const | tuple | list
//! const  = c-string
//! tuple  = "{" result ( "," result )* "}"
//! list   = "[" value ( "," value )* "]" | "[" result ( "," result )* "]"
//! result = variable "=" value
//! ```
//!
//! Records are built as data and rendered through [`fmt::Display`], so
//! escaping happens in exactly one place.

use std::fmt;

/// An MI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiValue
{
    Const(String),
    Tuple(Vec<(String, MiValue)>),
    /// List of bare values: `[v1,v2]`.
    List(Vec<MiValue>),
    /// List of results: `[name=v1,name=v2]`.
    ResultList(Vec<(String, MiValue)>),
}

impl MiValue
{
    pub fn text(value: impl ToString) -> Self
    {
        Self::Const(value.to_string())
    }
}

impl From<&str> for MiValue
{
    fn from(value: &str) -> Self
    {
        Self::Const(value.to_string())
    }
}

impl From<String> for MiValue
{
    fn from(value: String) -> Self
    {
        Self::Const(value)
    }
}

/// Ordered `name=value` pairs, the body of replies and async records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Results(Vec<(String, MiValue)>);

impl Results
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Append a result, builder style.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<MiValue>) -> Self
    {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: &str, value: impl Into<MiValue>)
    {
        self.0.push((name.to_string(), value.into()));
    }

    pub fn extend(&mut self, other: Results)
    {
        self.0.extend(other.0);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_tuple(self) -> MiValue
    {
        MiValue::Tuple(self.0)
    }
}

impl From<Results> for MiValue
{
    fn from(results: Results) -> Self
    {
        results.into_tuple()
    }
}

impl fmt::Display for Results
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write_results(f, &self.0)
    }
}

impl fmt::Display for MiValue
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            MiValue::Const(text) => write_c_string(f, text),
            MiValue::Tuple(results) => {
                f.write_str("{")?;
                write_results(f, results)?;
                f.write_str("}")
            }
            MiValue::List(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
            MiValue::ResultList(results) => {
                f.write_str("[")?;
                write_results(f, results)?;
                f.write_str("]")
            }
        }
    }
}

fn write_results(f: &mut fmt::Formatter<'_>, results: &[(String, MiValue)]) -> fmt::Result
{
    for (i, (name, value)) in results.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{name}={value}")?;
    }
    Ok(())
}

/// Quote `text` as a C string.
fn write_c_string(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result
{
    f.write_str("\"")?;
    for c in text.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            _ => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

/// One output line of the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record
{
    /// `token^done[,results]`
    Done
    {
        token: String, results: Results
    },
    /// `token^error,msg="..."`
    Error
    {
        token: String, message: String
    },
    /// `token^exit`
    Exit
    {
        token: String
    },
    /// `*class,results`
    ExecAsync
    {
        class: &'static str, results: Results
    },
    /// `=class,results`
    NotifyAsync
    {
        class: &'static str, results: Results
    },
}

impl fmt::Display for Record
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Record::Done { token, results } if results.is_empty() => write!(f, "{token}^done"),
            Record::Done { token, results } => write!(f, "{token}^done,{results}"),
            Record::Error { token, message } => {
                write!(f, "{token}^error,msg={}", MiValue::text(message))
            }
            Record::Exit { token } => write!(f, "{token}^exit"),
            Record::ExecAsync { class, results } => async_record(f, '*', class, results),
            Record::NotifyAsync { class, results } => async_record(f, '=', class, results),
        }
    }
}

fn async_record(f: &mut fmt::Formatter<'_>, prefix: char, class: &str, results: &Results) -> fmt::Result
{
    if results.is_empty() {
        write!(f, "{prefix}{class}")
    } else {
        write!(f, "{prefix}{class},{results}")
    }
}
