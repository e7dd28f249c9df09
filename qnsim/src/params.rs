//! Loosely typed station parameters.
//!
//! Numeric parameters may be given as JSON numbers or as strings. Strings follow a strict
//! syntax: an optional sign, digits, and an optional fractional part introduced by `.` or `,`.

use std::str::FromStr;

use serde_json::{Map, Value};

use crate::BuildError;

pub(crate) struct Params<'a> {
    station: &'a str,
    table: &'a Map<String, Value>,
}

fn parse_float(text: &str) -> Option<f64> {
    let text = text.replacen(',', ".", 1);
    let unsigned = text.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(&text);
    let mut parts = unsigned.splitn(2, '.');
    let whole = parts.next()?;
    let valid = |digits: &str| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit());
    if !valid(whole) || !parts.next().map_or(true, valid) {
        return None;
    }
    text.parse().ok()
}

fn parse_int(text: &str) -> Option<i64> {
    let unsigned = text.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(text);
    if unsigned.is_empty() || !unsigned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

impl<'a> Params<'a> {
    pub(crate) fn new(station: &'a str, table: &'a Map<String, Value>) -> Self {
        Self { station, table }
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.table.get(key).map_or(false, |v| !v.is_null())
    }

    /// Raw value as text; numbers are formatted the way they appear in JSON.
    pub(crate) fn text(&self, key: &str) -> Option<String> {
        match self.table.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Enumeration code: integral numbers in any spelling map to their integer text, anything
    /// else falls back to [`Params::text`].
    pub(crate) fn code(&self, key: &str) -> Option<String> {
        self.int(key)
            .map(|code| code.to_string())
            .or_else(|| self.text(key))
    }

    pub(crate) fn get(&self, key: &str) -> Option<&'a Value> {
        self.table.get(key)
    }

    pub(crate) fn invalid(&self, key: &str, requirement: &'static str) -> BuildError {
        BuildError::InvalidParameter {
            station: self.station.to_string(),
            parameter: key.to_string(),
            requirement,
        }
    }

    fn float(&self, key: &str) -> Option<f64> {
        let value = match self.table.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_float(s),
            _ => None,
        }?;
        if value.is_finite() {
            Some(value)
        } else {
            None
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    fn int(&self, key: &str) -> Option<i64> {
        match self.table.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                    .map(|f| f as i64)
            }),
            Value::String(s) => parse_int(s),
            _ => None,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the parameter is missing, malformed, or not greater than zero.
    pub(crate) fn positive_float(&self, key: &str) -> Result<f64, BuildError> {
        self.float(key)
            .filter(|&v| v > 0.0)
            .ok_or_else(|| self.invalid(key, "a positive number"))
    }

    /// # Errors
    ///
    /// Returns an error if the parameter is missing, malformed, or negative.
    pub(crate) fn non_negative_float(&self, key: &str) -> Result<f64, BuildError> {
        Self::non_negative(self.float(key)).ok_or_else(|| self.invalid(key, "a non-negative number"))
    }

    /// Parses a free-standing value, such as one element of a list parameter.
    pub(crate) fn non_negative_float_value(value: &Value) -> Option<f64> {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_float(s.trim()),
            _ => None,
        };
        Self::non_negative(parsed.filter(|v| v.is_finite()))
    }

    fn non_negative(value: Option<f64>) -> Option<f64> {
        value.filter(|&v| v >= 0.0)
    }

    /// # Errors
    ///
    /// Returns an error if the parameter is missing, malformed, or not greater than zero.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub(crate) fn positive_int(&self, key: &str) -> Result<usize, BuildError> {
        self.int(key)
            .filter(|&v| v > 0)
            .map(|v| v as usize)
            .ok_or_else(|| self.invalid(key, "a positive integer"))
    }

    /// Like [`Params::positive_int`] but falls back to `default` when the parameter is absent.
    pub(crate) fn positive_int_or(&self, key: &str, default: usize) -> Result<usize, BuildError> {
        if self.contains(key) {
            self.positive_int(key)
        } else {
            Ok(default)
        }
    }

    /// # Errors
    ///
    /// Returns an error if the parameter is missing, malformed, or negative.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub(crate) fn non_negative_int(&self, key: &str) -> Result<usize, BuildError> {
        self.int(key)
            .filter(|&v| v >= 0)
            .map(|v| v as usize)
            .ok_or_else(|| self.invalid(key, "a non-negative integer"))
    }

    /// # Errors
    ///
    /// Returns an error if the parameter is present but is neither a boolean nor
    /// `"true"`/`"false"`.
    pub(crate) fn bool_or(&self, key: &str, default: bool) -> Result<bool, BuildError> {
        match self.table.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => {
                bool::from_str(s).map_err(|_| self.invalid(key, "true or false"))
            }
            Some(_) => Err(self.invalid(key, "true or false")),
        }
    }
}
