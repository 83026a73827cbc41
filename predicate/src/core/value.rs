use std::{cmp::Ordering, fmt};

/// Literal values accepted by predicate constants and produced by field reads.
#[derive(Clone, Debug)]
pub enum ScalarValue {
    /// Absent value; missing fields read as `Null`.
    Null,
    /// Boolean literal.
    Boolean(bool),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    Utf8(String),
}

impl ScalarValue {
    /// Represents the `Null` literal.
    #[must_use]
    pub fn null() -> Self {
        ScalarValue::Null
    }

    /// Returns true when the literal is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Returns the boolean payload, if any.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Utf8(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns true for the `Utf8` variant.
    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self, ScalarValue::Utf8(_))
    }

    /// Renders the value the way a blob tag would store it. `Null` has no tag form.
    #[must_use]
    pub fn to_tag_string(&self) -> Option<String> {
        if self.is_null() {
            None
        } else {
            Some(self.to_string())
        }
    }

    /// Compares this scalar with another, returning the ordering when both sides are comparable.
    ///
    /// Integer and float variants compare across widths; `Null` never orders.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        use ScalarValue::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Boolean(lhs), Boolean(rhs)) => Some(lhs.cmp(rhs)),
            (Utf8(lhs), Utf8(rhs)) => Some(lhs.cmp(rhs)),
            (Int64(lhs), Int64(rhs)) => Some(lhs.cmp(rhs)),
            (UInt64(lhs), UInt64(rhs)) => Some(lhs.cmp(rhs)),
            (Int64(lhs), UInt64(rhs)) => Some(i128::from(*lhs).cmp(&i128::from(*rhs))),
            (UInt64(lhs), Int64(rhs)) => Some(i128::from(*lhs).cmp(&i128::from(*rhs))),
            (Float64(lhs), Float64(rhs)) => lhs.partial_cmp(rhs),
            (Float64(lhs), Int64(rhs)) => lhs.partial_cmp(&(*rhs as f64)),
            (Float64(lhs), UInt64(rhs)) => lhs.partial_cmp(&(*rhs as f64)),
            (Int64(lhs), Float64(rhs)) => (*lhs as f64).partial_cmp(rhs),
            (UInt64(lhs), Float64(rhs)) => (*lhs as f64).partial_cmp(rhs),
            _ => None,
        }
    }
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_null(), other.is_null()) {
            (true, true) => true,
            (false, false) => self.compare(other) == Some(Ordering::Equal),
            _ => false,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => Ok(()),
            ScalarValue::Boolean(value) => write!(f, "{value}"),
            ScalarValue::Int64(value) => write!(f, "{value}"),
            ScalarValue::UInt64(value) => write!(f, "{value}"),
            ScalarValue::Float64(value) => write!(f, "{value}"),
            ScalarValue::Utf8(value) => f.write_str(value),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int64(i64::from(value))
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int64(value)
    }
}

impl From<u32> for ScalarValue {
    fn from(value: u32) -> Self {
        ScalarValue::UInt64(u64::from(value))
    }
}

impl From<u64> for ScalarValue {
    fn from(value: u64) -> Self {
        ScalarValue::UInt64(value)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float64(value)
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Utf8(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_owned())
    }
}

impl From<&String> for ScalarValue {
    fn from(value: &String) -> Self {
        ScalarValue::Utf8(value.clone())
    }
}

impl<T> From<Option<T>> for ScalarValue
where
    T: Into<ScalarValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(ScalarValue::Null, Into::into)
    }
}
