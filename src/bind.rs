use std::fmt;

use crate::error::SqlSessionError;
use crate::types::RowValues;

/// Type tag applied to a bound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindType {
    Int,
    Float,
    String,
    Blob,
}

impl BindType {
    /// Infer the tag for a value. Anything that is not an integer, float or text binds as a blob.
    #[must_use]
    pub fn infer(value: &RowValues) -> Self {
        match value {
            RowValues::Int(_) => BindType::Int,
            RowValues::Float(_) => BindType::Float,
            RowValues::Text(_) => BindType::String,
            RowValues::Bool(_) | RowValues::Null | RowValues::Blob(_) => BindType::Blob,
        }
    }

    /// Long tag name: `int`, `float`, `string` or `blob`.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            BindType::Int => "int",
            BindType::Float => "float",
            BindType::String => "string",
            BindType::Blob => "blob",
        }
    }

    /// Compact one-letter code (`i`, `d`, `s`, `b`).
    #[must_use]
    pub fn code(self) -> char {
        match self {
            BindType::Int => 'i',
            BindType::Float => 'd',
            BindType::String => 's',
            BindType::Blob => 'b',
        }
    }

    /// Parse a compact tag string such as `"isd"`.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::InvalidInput` for an unknown code.
    pub fn parse_tags(tags: &str) -> Result<Vec<BindType>, SqlSessionError> {
        tags.chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c {
                'i' => Ok(BindType::Int),
                'd' | 'f' => Ok(BindType::Float),
                's' => Ok(BindType::String),
                'b' => Ok(BindType::Blob),
                other => Err(SqlSessionError::InvalidInput(format!(
                    "unknown bind type code '{other}'"
                ))),
            })
            .collect()
    }

    /// Coerce `value` to this tag. `Null` passes through every tag.
    ///
    /// # Errors
    ///
    /// Returns `SqlSessionError::InvalidInput` if the value cannot be represented.
    pub fn coerce(self, value: &RowValues) -> Result<RowValues, SqlSessionError> {
        let mismatch = || {
            SqlSessionError::InvalidInput(format!("cannot bind {value:?} as {}", self.tag()))
        };
        Ok(match (self, value) {
            (_, RowValues::Null) => RowValues::Null,
            (BindType::Int, RowValues::Int(i)) => RowValues::Int(*i),
            (BindType::Int, RowValues::Bool(b)) => RowValues::Int(i64::from(*b)),
            #[allow(clippy::cast_possible_truncation)]
            (BindType::Int, RowValues::Float(f)) if f.fract() == 0.0 => RowValues::Int(*f as i64),
            (BindType::Int, RowValues::Text(s)) => {
                RowValues::Int(s.trim().parse().map_err(|_| mismatch())?)
            }
            (BindType::Float, RowValues::Float(f)) => RowValues::Float(*f),
            #[allow(clippy::cast_precision_loss)]
            (BindType::Float, RowValues::Int(i)) => RowValues::Float(*i as f64),
            (BindType::Float, RowValues::Text(s)) => {
                RowValues::Float(s.trim().parse().map_err(|_| mismatch())?)
            }
            (BindType::String, RowValues::Text(s)) => RowValues::Text(s.clone()),
            (BindType::String, RowValues::Int(i)) => RowValues::Text(i.to_string()),
            (BindType::String, RowValues::Float(f)) => RowValues::Text(f.to_string()),
            (BindType::String, RowValues::Bool(b)) => RowValues::Text(u8::from(*b).to_string()),
            (BindType::String, RowValues::Blob(bytes)) => {
                RowValues::Text(String::from_utf8(bytes.clone()).map_err(|_| mismatch())?)
            }
            (BindType::Blob, RowValues::Blob(bytes)) => RowValues::Blob(bytes.clone()),
            (BindType::Blob, RowValues::Text(s)) => RowValues::Blob(s.clone().into_bytes()),
            // integers, floats and bools keep their native form under blob
            (BindType::Blob, other) => other.clone(),
            _ => return Err(mismatch()),
        })
    }
}

impl fmt::Display for BindType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Infer one tag per value.
#[must_use]
pub fn infer_bind_types(values: &[RowValues]) -> Vec<BindType> {
    values.iter().map(BindType::infer).collect()
}

/// Coerce each value to its tag.
///
/// # Errors
///
/// Returns `SqlSessionError::InvalidInput` if the tag count differs from the value count or a
/// value cannot be coerced.
pub fn apply_bind_types(
    values: &[RowValues],
    tags: &[BindType],
) -> Result<Vec<RowValues>, SqlSessionError> {
    if tags.len() != values.len() {
        return Err(SqlSessionError::InvalidInput(format!(
            "{} bind types for {} values",
            tags.len(),
            values.len()
        )));
    }
    tags.iter()
        .zip(values)
        .map(|(tag, value)| tag.coerce(value))
        .collect()
}

/// Explicit type tags and values for exactly one call.
///
/// Built by [`crate::Session::bind_param`]; the returned [`crate::BoundCall`] consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct BindSpec {
    pub types: Vec<BindType>,
    pub values: Vec<RowValues>,
}

/// Tags accepted by `bind_param`: a compact string or an explicit list.
pub trait IntoBindTypes {
    /// # Errors
    ///
    /// Returns `SqlSessionError::InvalidInput` for unparseable tags.
    fn into_bind_types(self) -> Result<Vec<BindType>, SqlSessionError>;
}

impl IntoBindTypes for &str {
    fn into_bind_types(self) -> Result<Vec<BindType>, SqlSessionError> {
        BindType::parse_tags(self)
    }
}

impl IntoBindTypes for Vec<BindType> {
    fn into_bind_types(self) -> Result<Vec<BindType>, SqlSessionError> {
        Ok(self)
    }
}

impl IntoBindTypes for &[BindType] {
    fn into_bind_types(self) -> Result<Vec<BindType>, SqlSessionError> {
        Ok(self.to_vec())
    }
}

impl BindSpec {
    /// # Errors
    ///
    /// Returns `SqlSessionError::InvalidInput` if tags and values differ in length or a value
    /// cannot be coerced to its tag.
    pub fn new(types: impl IntoBindTypes, values: Vec<RowValues>) -> Result<Self, SqlSessionError> {
        let types = types.into_bind_types()?;
        let values = apply_bind_types(&values, &types)?;
        Ok(Self { types, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_tags() {
        let values = vec![
            RowValues::Int(1),
            RowValues::Float(1.5),
            RowValues::Text("a".into()),
            RowValues::Null,
            RowValues::Blob(vec![0, 1]),
            RowValues::Bool(true),
        ];
        let tags: Vec<&str> = infer_bind_types(&values).into_iter().map(BindType::tag).collect();
        assert_eq!(tags, ["int", "float", "string", "blob", "blob", "blob"]);
    }

    #[test]
    fn parses_compact_codes() {
        assert_eq!(
            BindType::parse_tags("isdb").unwrap(),
            vec![BindType::Int, BindType::String, BindType::Float, BindType::Blob]
        );
        assert!(BindType::parse_tags("ix").is_err());
    }

    #[test]
    fn coerces_text_to_int() {
        assert_eq!(
            BindType::Int.coerce(&RowValues::Text(" 42".into())).unwrap(),
            RowValues::Int(42)
        );
        assert!(BindType::Int.coerce(&RowValues::Text("x".into())).is_err());
        assert_eq!(BindType::Float.coerce(&RowValues::Null).unwrap(), RowValues::Null);
    }

    #[test]
    fn spec_rejects_count_mismatch() {
        assert!(BindSpec::new("ii", vec![RowValues::Int(1)]).is_err());
        let spec = BindSpec::new("is", vec![RowValues::Text("4".into()), RowValues::Int(9)]).unwrap();
        assert_eq!(spec.values, vec![RowValues::Int(4), RowValues::Text("9".into())]);
    }
}
