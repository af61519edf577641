//! Values bound to statement parameters and read back from cursors.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::BoxError;

/// SQL type of an explicitly typed `NULL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Varchar,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    Boolean,
    Date,
    Time,
    Timestamp,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SqlType::Varchar => "VARCHAR",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Float => "FLOAT",
            SqlType::Double => "DOUBLE",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
        })
    }
}

/// A single positional parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null(SqlType),
    Text(String),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn sql_type(&self) -> SqlType {
        match self {
            Value::Null(sql_type) => *sql_type,
            Value::Text(_) => SqlType::Varchar,
            Value::SmallInt(_) => SqlType::SmallInt,
            Value::Int(_) => SqlType::Integer,
            Value::BigInt(_) => SqlType::BigInt,
            Value::Float(_) => SqlType::Float,
            Value::Double(_) => SqlType::Double,
            Value::Bool(_) => SqlType::Boolean,
            Value::Date(_) => SqlType::Date,
            Value::Time(_) => SqlType::Time,
            Value::Timestamp(_) => SqlType::Timestamp,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null(sql_type) => write!(f, "null ({sql_type})"),
            Value::Text(v) => f.write_str(v),
            Value::SmallInt(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{v}"),
            Value::Time(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{v}"),
        }
    }
}

/// Rust types with a fixed SQL type, used to type a `None` bound as `NULL`.
pub trait SqlTyped {
    const SQL_TYPE: SqlType;
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident, $sql:ident;)*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }

            impl SqlTyped for $ty {
                const SQL_TYPE: SqlType = SqlType::$sql;
            }
        )*
    };
}

value_from! {
    String => Text, Varchar;
    i16 => SmallInt, SmallInt;
    i32 => Int, Integer;
    i64 => BigInt, BigInt;
    f32 => Float, Float;
    f64 => Double, Double;
    bool => Bool, Boolean;
    NaiveDate => Date, Date;
    NaiveTime => Time, Time;
    NaiveDateTime => Timestamp, Timestamp;
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl SqlTyped for &str {
    const SQL_TYPE: SqlType = SqlType::Varchar;
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value> + SqlTyped,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Value::Null(T::SQL_TYPE),
        }
    }
}

/// Conversion from a column [`Value`]; `NULL` converts to `None`.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Option<Self>, BoxError>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Option<Self>, BoxError> {
        Ok(Some(value))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Option<Self>, BoxError> {
        Ok(match value {
            Value::Null(_) => None,
            Value::Text(text) => Some(text),
            other => Some(other.to_string()),
        })
    }
}

fn mismatch(value: &Value, target: &str) -> BoxError {
    format!("cannot convert {} value '{value}' to {target}", value.sql_type()).into()
}

macro_rules! integer_from_value {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Option<Self>, BoxError> {
                    let wide: i64 = match value {
                        Value::Null(_) => return Ok(None),
                        Value::SmallInt(v) => v.into(),
                        Value::Int(v) => v.into(),
                        Value::BigInt(v) => v,
                        Value::Bool(v) => v.into(),
                        Value::Text(ref text) => text
                            .trim()
                            .parse()
                            .map_err(|_| mismatch(&value, stringify!($ty)))?,
                        ref other => return Err(mismatch(other, stringify!($ty))),
                    };
                    <$ty>::try_from(wide)
                        .map(Some)
                        .map_err(|_| format!("{wide} is out of range for {}", stringify!($ty)).into())
                }
            }
        )*
    };
}

integer_from_value!(i16, i32, i64);

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Option<Self>, BoxError> {
        match value {
            Value::Null(_) => Ok(None),
            Value::SmallInt(v) => Ok(Some(v.into())),
            Value::Int(v) => Ok(Some(v.into())),
            Value::BigInt(v) => Ok(Some(v as f64)),
            Value::Float(v) => Ok(Some(v.into())),
            Value::Double(v) => Ok(Some(v)),
            Value::Text(ref text) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| mismatch(&value, "f64")),
            other => Err(mismatch(&other, "f64")),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Option<Self>, BoxError> {
        match value {
            Value::Float(v) => Ok(Some(v)),
            other => Ok(f64::from_value(other)?.map(|v| v as f32)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Option<Self>, BoxError> {
        match value {
            Value::Null(_) => Ok(None),
            Value::Bool(v) => Ok(Some(v)),
            Value::SmallInt(v) => Ok(Some(v != 0)),
            Value::Int(v) => Ok(Some(v != 0)),
            Value::BigInt(v) => Ok(Some(v != 0)),
            other => Err(mismatch(&other, "bool")),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Option<Self>, BoxError> {
        match value {
            Value::Null(_) => Ok(None),
            Value::Timestamp(v) => Ok(Some(v)),
            Value::Date(v) => Ok(Some(v.and_time(chrono::NaiveTime::MIN))),
            other => Err(mismatch(&other, "timestamp")),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: Value) -> Result<Option<Self>, BoxError> {
        match value {
            Value::Null(_) => Ok(None),
            Value::Time(v) => Ok(Some(v)),
            Value::Timestamp(v) => Ok(Some(v.time())),
            other => Err(mismatch(&other, "time")),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> Result<Option<Self>, BoxError> {
        match value {
            Value::Null(_) => Ok(None),
            Value::Date(v) => Ok(Some(v)),
            Value::Timestamp(v) => Ok(Some(v.date())),
            other => Err(mismatch(&other, "date")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_becomes_typed_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null(SqlType::Integer));
        assert_eq!(Value::from(None::<&str>), Value::Null(SqlType::Varchar));
        assert_eq!(Value::from(Some(7i64)), Value::BigInt(7));
    }

    #[test]
    fn test_integer_widening_and_range() {
        assert_eq!(i64::from_value(Value::Int(5)).unwrap(), Some(5));
        assert_eq!(i32::from_value(Value::BigInt(12)).unwrap(), Some(12));
        assert!(i16::from_value(Value::BigInt(i64::MAX)).is_err());
        assert_eq!(i32::from_value(Value::Null(SqlType::Integer)).unwrap(), None);
    }

    #[test]
    fn test_text_conversions() {
        assert_eq!(String::from_value(Value::Int(3)).unwrap(), Some("3".to_string()));
        assert_eq!(i64::from_value(Value::Text(" 42 ".into())).unwrap(), Some(42));
        assert!(i64::from_value(Value::Text("abc".into())).is_err());
    }

    #[test]
    fn test_date_promotes_to_timestamp() {
        let date = NaiveDate::from_ymd_opt(2014, 3, 1).unwrap();
        let ts = NaiveDateTime::from_value(Value::Date(date)).unwrap().unwrap();
        assert_eq!(ts.date(), date);
    }

    #[test]
    fn test_time_values() {
        let noon = NaiveTime::from_hms_opt(12, 30, 0).unwrap();
        assert_eq!(Value::from(noon).sql_type(), SqlType::Time);
        assert_eq!(Value::from(None::<NaiveTime>), Value::Null(SqlType::Time));
        assert_eq!(Value::Time(noon).to_string(), "12:30:00");
        assert_eq!(NaiveTime::from_value(Value::Time(noon)).unwrap(), Some(noon));
        assert_eq!(String::from_value(Value::Time(noon)).unwrap().as_deref(), Some("12:30:00"));
        assert!(NaiveTime::from_value(Value::Int(1)).is_err());
    }

    #[test]
    fn test_display_for_diagnostics() {
        assert_eq!(Value::Text("foo".into()).to_string(), "foo");
        assert_eq!(Value::Null(SqlType::BigInt).to_string(), "null (BIGINT)");
    }
}
