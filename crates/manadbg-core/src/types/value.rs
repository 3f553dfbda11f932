//! Runtime values as seen by the evaluator.

use std::fmt;

/// Opaque handle the runtime uses to find a value again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueHandle(pub u64);

/// Fixed-point decimal (`System.Decimal`): a 96-bit mantissa scaled by `10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal
{
    mantissa: i128,
    scale: u8,
}

/// Field layout of `System.Decimal` used when materializing a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalParts
{
    /// Scale in bits 16..24, sign in bit 31.
    pub flags: u32,
    pub hi: u32,
    pub lo: u32,
    pub mid: u32,
}

impl Decimal
{
    /// Largest magnitude a 96-bit mantissa holds.
    pub const MAX_MANTISSA: i128 = (1_i128 << 96) - 1;
    /// Largest scale `System.Decimal` accepts.
    pub const MAX_SCALE: u8 = 28;

    pub fn new(mantissa: i128, scale: u8) -> Option<Self>
    {
        if mantissa.abs() > Self::MAX_MANTISSA || scale > Self::MAX_SCALE {
            return None;
        }
        Some(Self { mantissa, scale })
    }

    /// Parse the digits of a literal such as `12.50` (no suffix, no sign).
    ///
    /// ```rust
    /// use manadbg_core::types::Decimal;
    ///
    /// let d = Decimal::parse("12.50").unwrap();
    /// assert_eq!(d.to_string(), "12.50");
    /// ```
    pub fn parse(text: &str) -> Option<Self>
    {
        let (int_part, frac_part) = text.split_once('.').unwrap_or((text, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        let digits = format!("{int_part}{frac_part}");
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let scale = u8::try_from(frac_part.len()).ok()?;
        let mantissa = digits.parse::<i128>().ok()?;
        Self::new(mantissa, scale)
    }

    #[must_use]
    pub fn negate(self) -> Self
    {
        Self {
            mantissa: -self.mantissa,
            scale: self.scale,
        }
    }

    pub fn mantissa(&self) -> i128
    {
        self.mantissa
    }

    pub fn scale(&self) -> u8
    {
        self.scale
    }

    pub fn parts(&self) -> DecimalParts
    {
        let magnitude = self.mantissa.unsigned_abs();
        let sign = if self.mantissa < 0 { 1_u32 << 31 } else { 0 };
        DecimalParts {
            flags: sign | (u32::from(self.scale) << 16),
            hi: (magnitude >> 64) as u32,
            lo: magnitude as u32,
            mid: (magnitude >> 32) as u32,
        }
    }
}

impl fmt::Display for Decimal
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let digits = self.mantissa.unsigned_abs().to_string();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let scale = usize::from(self.scale);
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

/// Primitive payload read out of a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive
{
    Bool(bool),
    Char(char),
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal(Decimal),
}

impl fmt::Display for Primitive
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Primitive::Bool(value) => write!(f, "{value}"),
            Primitive::Char(value) => write!(f, "{} '{value}'", u32::from(*value)),
            Primitive::Int(value) => write!(f, "{value}"),
            Primitive::UInt(value) => write!(f, "{value}"),
            Primitive::Float(value) => write!(f, "{value}"),
            Primitive::Decimal(value) => write!(f, "{value}"),
        }
    }
}

/// What the runtime could tell about a value's contents.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueData
{
    /// Null reference.
    Null,
    Primitive(Primitive),
    String(String),
    /// Class or struct instance; members are fetched on demand.
    Object,
    /// Array with the length of each dimension.
    Array
    {
        dims: Vec<u32>
    },
}

/// A value living in the stopped debuggee.
#[derive(Debug, Clone, PartialEq)]
pub struct Value
{
    pub handle: ValueHandle,
    /// Runtime type name, e.g. `System.Int32` or `App.Customer`.
    pub type_name: String,
    pub data: ValueData,
}

impl Value
{
    pub fn new(handle: ValueHandle, type_name: impl Into<String>, data: ValueData) -> Self
    {
        Self {
            handle,
            type_name: type_name.into(),
            data,
        }
    }

    /// Typed null, used when a short-circuited expression has no receiver to report.
    pub fn null(type_name: impl Into<String>) -> Self
    {
        Self::new(ValueHandle(0), type_name, ValueData::Null)
    }

    pub fn is_null(&self) -> bool
    {
        matches!(self.data, ValueData::Null)
    }

    pub fn as_index(&self) -> Option<u32>
    {
        match self.data {
            ValueData::Primitive(Primitive::Int(value)) => u32::try_from(value).ok(),
            ValueData::Primitive(Primitive::UInt(value)) => u32::try_from(value).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match &self.data {
            ValueData::Null => write!(f, "null"),
            ValueData::Primitive(primitive) => write!(f, "{primitive}"),
            ValueData::String(text) => write!(f, "\"{text}\""),
            ValueData::Object => write!(f, "{{{}}}", self.type_name),
            ValueData::Array { dims } => {
                let element = self.type_name.trim_end_matches(|c| c == '[' || c == ']' || c == ',');
                let dims = dims.iter().map(u32::to_string).collect::<Vec<_>>().join(", ");
                write!(f, "{{{element}[{dims}]}}")
            }
        }
    }
}
