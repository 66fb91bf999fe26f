//! Parameter guards applied before any value reaches the device.
//!
//! Typed callers use the numeric guards directly. Loosely-typed values,
//! such as the `key=value` setting overrides the command line accepts, are
//! parsed into a [`Param`] with [`Param::parse_token`] and checked against
//! the type of the setting they replace:
//!
//! - [`check_range`] - inclusive or exclusive numeric bounds
//! - [`check_int`] - integers, or floats with a zero fractional part
//! - [`check_number`] - any finite int or float
//! - [`check_string`] - text values
//! - [`check_bool`] - boolean values
//!
//! All guards are side-effect free and return the (possibly coerced) value.

use std::fmt;

use thiserror::Error;

/// A loosely-typed parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// Integer value
    Int(i64),
    /// Floating-point value
    Float(f64),
    /// Text value
    Text(String),
    /// Boolean value
    Bool(bool),
}

impl Param {
    /// Short name of the carried type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
            Self::Bool(_) => "boolean",
        }
    }

    /// Interpret a command-line token: integers, then floats, then booleans,
    /// falling back to text.
    pub fn parse_token(token: &str) -> Self {
        if let Ok(i) = token.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = token.parse::<f64>() {
            return Self::Float(f);
        }
        match token {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => Self::Text(token.to_string()),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "\"{}\"", v),
            Self::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for Param {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// The constraint a value violated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Numeric value outside its allowed interval.
    #[error("{value} is outside {}", describe_range(.min, .max, .inclusive))]
    OutOfRange {
        value: f64,
        min: f64,
        max: f64,
        inclusive: bool,
    },

    /// Expected a specific type.
    #[error("expected {expected}, got {actual} {value}")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
        value: String,
    },

    /// Float with a fractional part where an integer is required.
    #[error("{0} is not a whole number")]
    NotWhole(f64),

    /// NaN or infinite input.
    #[error("{0} is not finite")]
    NotFinite(f64),

    /// Text value rejected by a content rule.
    #[error("{0}")]
    Content(String),
}

fn describe_range(min: &f64, max: &f64, inclusive: &bool) -> String {
    if *inclusive {
        format!("range [{}, {}] (inclusive)", min, max)
    } else {
        format!("range ({}, {}) (exclusive)", min, max)
    }
}

/// Result type for the guards in this module.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Check that `value` lies within `min..=max` (or strictly between them).
///
/// Infinite bounds are allowed and behave like open-ended intervals.
pub fn check_range(value: f64, min: f64, max: f64, inclusive: bool) -> ValidationResult<f64> {
    if value.is_nan() {
        return Err(ValidationError::NotFinite(value));
    }
    let ok = if inclusive {
        min <= value && value <= max
    } else {
        min < value && value < max
    };
    if ok {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            value,
            min,
            max,
            inclusive,
        })
    }
}

/// Integer variant of [`check_range`] (always inclusive).
pub fn check_range_i64(value: i64, min: i64, max: i64) -> ValidationResult<i64> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            value: value as f64,
            min: min as f64,
            max: max as f64,
            inclusive: true,
        })
    }
}

/// Accept integers, and floats whose fractional part is zero.
pub fn check_int(value: &Param) -> ValidationResult<i64> {
    match value {
        Param::Int(v) => Ok(*v),
        Param::Float(f) if !f.is_finite() => Err(ValidationError::NotFinite(*f)),
        Param::Float(f) if f.fract() == 0.0 => {
            if *f < i64::MIN as f64 || *f > i64::MAX as f64 {
                Err(ValidationError::OutOfRange {
                    value: *f,
                    min: i64::MIN as f64,
                    max: i64::MAX as f64,
                    inclusive: true,
                })
            } else {
                Ok(*f as i64)
            }
        }
        Param::Float(f) => Err(ValidationError::NotWhole(*f)),
        other => Err(wrong_type("integer", other)),
    }
}

/// Accept ints and finite floats, returned as `f64`.
pub fn check_number(value: &Param) -> ValidationResult<f64> {
    match value {
        Param::Int(v) => Ok(*v as f64),
        Param::Float(f) if f.is_finite() => Ok(*f),
        Param::Float(f) => Err(ValidationError::NotFinite(*f)),
        other => Err(wrong_type("number", other)),
    }
}

/// Accept text values.
pub fn check_string(value: &Param) -> ValidationResult<&str> {
    match value {
        Param::Text(s) => Ok(s.as_str()),
        other => Err(wrong_type("string", other)),
    }
}

/// Accept boolean values.
pub fn check_bool(value: &Param) -> ValidationResult<bool> {
    match value {
        Param::Bool(b) => Ok(*b),
        other => Err(wrong_type("boolean", other)),
    }
}

/// Reject empty paths and paths containing NUL bytes.
pub fn check_path(value: &str) -> ValidationResult<&str> {
    if value.is_empty() {
        return Err(ValidationError::Content("path cannot be empty".into()));
    }
    if value.contains('\0') {
        return Err(ValidationError::Content(
            "path cannot contain null bytes".into(),
        ));
    }
    Ok(value)
}

fn wrong_type(expected: &'static str, actual: &Param) -> ValidationError {
    ValidationError::WrongType {
        expected,
        actual: actual.type_name(),
        value: actual.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range_inclusive() {
        assert_eq!(check_range(5.0, 0.0, 5.0, true).unwrap(), 5.0);
        assert_eq!(check_range(0.0, 0.0, 5.0, true).unwrap(), 0.0);
        assert!(check_range(5.1, 0.0, 5.0, true).is_err());
    }

    #[test]
    fn test_check_range_exclusive() {
        assert!(check_range(5.0, 0.0, 5.0, false).is_err());
        assert!(check_range(0.0, 0.0, 5.0, false).is_err());
        assert_eq!(check_range(2.5, 0.0, 5.0, false).unwrap(), 2.5);
    }

    #[test]
    fn test_check_range_open_ended() {
        assert!(check_range(1e12, 0.0, f64::INFINITY, true).is_ok());
        assert!(check_range(-1.0, 0.0, f64::INFINITY, true).is_err());
        assert!(check_range(f64::NAN, 0.0, 1.0, true).is_err());
    }

    #[test]
    fn test_check_range_error_message() {
        let err = check_range(41e6, 9765.625, 40e6, true).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("41000000"), "{msg}");
        assert!(msg.contains("inclusive"), "{msg}");
    }

    #[test]
    fn test_check_int_accepts_whole_floats() {
        assert_eq!(check_int(&Param::Int(7)).unwrap(), 7);
        assert_eq!(check_int(&Param::Float(1e6)).unwrap(), 1_000_000);
        assert_eq!(check_int(&Param::Float(-3.0)).unwrap(), -3);
    }

    #[test]
    fn test_check_int_rejects() {
        assert_eq!(
            check_int(&Param::Float(2.5)),
            Err(ValidationError::NotWhole(2.5))
        );
        assert!(matches!(
            check_int(&Param::from("abc")),
            Err(ValidationError::WrongType { expected: "integer", .. })
        ));
        assert!(check_int(&Param::Bool(true)).is_err());
        assert!(check_int(&Param::Float(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_check_number() {
        assert_eq!(check_number(&Param::Int(400)).unwrap(), 400.0);
        assert_eq!(check_number(&Param::Float(2.5)).unwrap(), 2.5);
        assert!(check_number(&Param::from("abc")).is_err());
        assert!(check_number(&Param::Float(f64::NAN)).is_err());
    }

    #[test]
    fn test_check_string_and_bool() {
        assert_eq!(check_string(&Param::from("CLIENT")).unwrap(), "CLIENT");
        assert!(check_string(&Param::Int(400)).is_err());
        assert!(check_bool(&Param::Bool(false)).is_ok());
        assert!(check_bool(&Param::Int(0)).is_err());
    }

    #[test]
    fn test_check_path() {
        assert!(check_path("/tmp/capture").is_ok());
        assert!(check_path("").is_err());
        assert!(check_path("a\0b").is_err());
    }

    #[test]
    fn test_parse_token() {
        assert_eq!(Param::parse_token("42"), Param::Int(42));
        assert_eq!(Param::parse_token("1e6"), Param::Float(1e6));
        assert_eq!(Param::parse_token("true"), Param::Bool(true));
        assert_eq!(Param::parse_token("INT16"), Param::Text("INT16".into()));
    }
}
