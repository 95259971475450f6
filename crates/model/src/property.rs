//! Property (column) definitions of a data block.

use crate::error::{ErrorKind, Result};
use crate::value::Value;
use exn::{OptionExt, ResultExt};
use std::fmt::{self, Display};

/// Numeric columns narrower than this fit a 32-bit integer.
const INTEGER_WIDTH_LIMIT: u32 = 10;

/// Logical type of a block property, decoded from the VFK type code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// `N<w>` with `w < 10`.
    Integer,
    /// `N<w>` with `w >= 10`; identifiers usually land here.
    BigInteger,
    /// `N<w>.<p>` with `p > 0`.
    Real,
    /// `T<w>`.
    Text,
    /// `D`, kept verbatim as text (`dd.mm.yyyy hh:mm:ss`).
    Date,
}
impl PropertyType {
    /// Column type used when the property is persisted to SQL.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Integer | Self::BigInteger => "integer",
            Self::Real => "real",
            Self::Text | Self::Date => "text",
        }
    }
}

/// One property of a data block, e.g. `ID N30` or `SOURADNICE_Y N10.2`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyDefn {
    name: String,
    kind: PropertyType,
    width: u32,
    precision: u32,
    code: String,
}
impl PropertyDefn {
    /// Create a property from its name and VFK type code (`N30`, `T100`, `D`).
    pub fn new(name: impl Into<String>, code: impl AsRef<str>) -> Result<Self> {
        let name = name.into();
        let code = code.as_ref().trim();
        let invalid = || ErrorKind::InvalidProperty(format!("{name} {code}"));
        if name.is_empty() {
            exn::bail!(invalid());
        }
        let mut chars = code.chars();
        let tag = chars.next().ok_or_raise(invalid)?;
        let (width, precision) = match chars.as_str() {
            "" => (0, 0),
            size => match size.split_once('.') {
                Some((width, precision)) => (
                    width.parse::<u32>().or_raise(invalid)?,
                    precision.parse::<u32>().or_raise(invalid)?,
                ),
                None => (size.parse::<u32>().or_raise(invalid)?, 0),
            },
        };
        let kind = match tag.to_ascii_uppercase() {
            'N' if precision > 0 => PropertyType::Real,
            'N' if width < INTEGER_WIDTH_LIMIT => PropertyType::Integer,
            'N' => PropertyType::BigInteger,
            'T' => PropertyType::Text,
            'D' => PropertyType::Date,
            _ => exn::bail!(invalid()),
        };
        Ok(Self { name, kind, width, precision, code: code.to_string() })
    }

    /// Parse a `NAME TYPE` pair as found in `&B` lines and the cache manifest.
    pub fn parse(definition: &str) -> Result<Self> {
        let (name, code) = definition
            .trim()
            .split_once(char::is_whitespace)
            .ok_or_raise(|| ErrorKind::InvalidProperty(definition.to_string()))?;
        Self::new(name, code)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PropertyType {
        self.kind
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// The VFK type code this property was declared with.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Convert one raw (already unquoted) field into a typed value.
    ///
    /// Empty fields are null. Numbers that fail to parse are kept as text
    /// rather than dropped, so no source data is lost.
    pub fn parse_value(&self, raw: &str) -> Value {
        if raw.is_empty() {
            return Value::Null;
        }
        let parsed = match self.kind {
            PropertyType::Integer | PropertyType::BigInteger => raw.trim().parse::<i64>().ok().map(Value::Integer),
            PropertyType::Real => raw.trim().parse::<f64>().ok().map(Value::Real),
            PropertyType::Text | PropertyType::Date => return Value::Text(raw.to_string()),
        };
        parsed.unwrap_or_else(|| {
            tracing::debug!(property = %self.name, value = raw, "Numeric property holds a non-numeric value");
            Value::Text(raw.to_string())
        })
    }
}
impl Display for PropertyDefn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ID N30", PropertyType::BigInteger, 30, 0)]
    #[case("STAV_DAT N2", PropertyType::Integer, 2, 0)]
    #[case("SOURADNICE_Y N10.2", PropertyType::Real, 10, 2)]
    #[case("NAZEV T255", PropertyType::Text, 255, 0)]
    #[case("DATUM_VZNIKU D", PropertyType::Date, 0, 0)]
    #[case("VYMERA N9.0", PropertyType::Integer, 9, 0)]
    fn test_parse(#[case] input: &str, #[case] kind: PropertyType, #[case] width: u32, #[case] precision: u32) {
        let defn = PropertyDefn::parse(input).unwrap();
        assert_eq!(defn.kind(), kind);
        assert_eq!(defn.width(), width);
        assert_eq!(defn.precision(), precision);
        assert_eq!(defn.to_string(), input);
    }

    #[rstest]
    #[case("ID")]
    #[case("ID X30")]
    #[case("ID N3x")]
    #[case(" ")]
    fn test_parse_invalid(#[case] input: &str) {
        assert!(PropertyDefn::parse(input).is_err());
    }

    #[rstest]
    #[case("ID N30", "123456789012", Value::Integer(123456789012))]
    #[case("ID N30", "", Value::Null)]
    #[case("Y N10.2", "-745123.45", Value::Real(-745123.45))]
    #[case("NAZEV T20", "Nov\u{e1}k; Jan", Value::Text("Nov\u{e1}k; Jan".to_string()))]
    #[case("ID N30", "abc", Value::Text("abc".to_string()))]
    fn test_parse_value(#[case] defn: &str, #[case] raw: &str, #[case] expected: Value) {
        assert_eq!(PropertyDefn::parse(defn).unwrap().parse_value(raw), expected);
    }
}
