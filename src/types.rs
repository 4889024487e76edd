use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Values that can be stored in a database row or used as query parameters.
///
/// The same enum is used for every backend, for bind values and for result rows:
/// ```rust
/// use sql_session::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Null,
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// NULL value
    Null,
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Interpret a text value written by `now()` or a `DATETIME` column.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<chrono::NaiveDateTime> {
        let s = self.as_text()?;
        // Try "YYYY-MM-DD HH:MM:SS"
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Some(dt);
        }
        // Try "YYYY-MM-DD HH:MM:SS.SSS"
        chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S.%3f").ok()
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_owned())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<Vec<u8>> for RowValues {
    fn from(value: Vec<u8>) -> Self {
        RowValues::Blob(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// Name to value mapping for `:name` placeholders.
///
/// Backed by a `BTreeMap`, so two mappings with the same entries serialize identically no
/// matter in which order they were built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedParams(BTreeMap<String, RowValues>);

impl NamedParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, replacing any earlier value under the same name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RowValues>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RowValues> {
        self.0.get(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>, V: Into<RowValues>> FromIterator<(K, V)> for NamedParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut named = NamedParams::new();
        for (name, value) in iter {
            named.insert(name, value);
        }
        named
    }
}

/// Parameter set supplied with a query: positional values or a name to value mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Params {
    Positional(Vec<RowValues>),
    Named(NamedParams),
}

impl Params {
    /// An empty positional parameter set.
    #[must_use]
    pub fn none() -> Self {
        Params::Positional(Vec::new())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Params::Positional(values) => values.is_empty(),
            Params::Named(named) => named.is_empty(),
        }
    }

    /// Deterministic encoding used as the parameter half of a cursor key.
    ///
    /// Every value carries a type tag and strings are length prefixed, so two sets encode alike
    /// only when they hold the same values. Floats are encoded by their bit pattern, which keeps
    /// `inf`, `-inf` and `NaN` apart.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut out = String::new();
        match self {
            Params::Positional(values) => {
                out.push('P');
                for value in values {
                    out.push(',');
                    push_fingerprint(&mut out, value);
                }
            }
            Params::Named(named) => {
                out.push('N');
                for (name, value) in &named.0 {
                    out.push_str(&format!(",{}:{name}=", name.len()));
                    push_fingerprint(&mut out, value);
                }
            }
        }
        out
    }
}

fn push_fingerprint(out: &mut String, value: &RowValues) {
    match value {
        RowValues::Int(i) => out.push_str(&format!("i{i}")),
        RowValues::Float(f) => out.push_str(&format!("f{:016x}", f.to_bits())),
        RowValues::Text(s) => out.push_str(&format!("t{}:{s}", s.len())),
        RowValues::Bool(b) => out.push_str(if *b { "b1" } else { "b0" }),
        RowValues::Null => out.push('n'),
        RowValues::Blob(bytes) => {
            out.push_str(&format!("x{}:", bytes.len()));
            for byte in bytes {
                out.push_str(&format!("{byte:02x}"));
            }
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Params::none()
    }
}

impl From<()> for Params {
    fn from((): ()) -> Self {
        Params::none()
    }
}

impl From<Vec<RowValues>> for Params {
    fn from(values: Vec<RowValues>) -> Self {
        Params::Positional(values)
    }
}

impl From<&[RowValues]> for Params {
    fn from(values: &[RowValues]) -> Self {
        Params::Positional(values.to_vec())
    }
}

impl<const N: usize> From<[RowValues; N]> for Params {
    fn from(values: [RowValues; N]) -> Self {
        Params::Positional(values.to_vec())
    }
}

impl From<NamedParams> for Params {
    fn from(named: NamedParams) -> Self {
        Params::Named(named)
    }
}

/// The backends shipped with this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum BackendKind {
    /// `SQLite` through rusqlite
    Sqlite,
    /// In-memory SQL subset, for tests
    Memory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_params_fingerprint_ignores_insertion_order() {
        let a: Params = NamedParams::new().with("x", 1).with("y", "s").into();
        let b: Params = NamedParams::new().with("y", "s").with("x", 1).into();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn distinct_params_have_distinct_fingerprints() {
        let a = Params::from(vec![RowValues::Int(1)]);
        let b = Params::from(vec![RowValues::Text("1".into())]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn non_finite_floats_have_distinct_fingerprints() {
        let keys: Vec<String> = [f64::INFINITY, f64::NEG_INFINITY, f64::NAN, 0.0, -0.0]
            .into_iter()
            .map(|f| Params::from(vec![RowValues::Float(f)]).fingerprint())
            .collect();
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_ne!(
            Params::from(vec![RowValues::Float(f64::NAN)]).fingerprint(),
            Params::from(vec![RowValues::Null]).fingerprint()
        );
    }

    #[test]
    fn text_boundaries_cannot_be_forged() {
        let split = Params::from(vec![RowValues::from("a"), RowValues::from("b")]);
        let joined = Params::from(vec![RowValues::from("a,t1:b")]);
        assert_ne!(split.fingerprint(), joined.fingerprint());

        let named: Params = NamedParams::new().with("a", "x").with("b", "y").into();
        let forged: Params = NamedParams::new().with("a", "x,1:b=t1:y").into();
        assert_ne!(named.fingerprint(), forged.fingerprint());
    }

    #[test]
    fn option_converts_to_null() {
        let v: RowValues = None::<i64>.into();
        assert!(v.is_null());
        assert_eq!(RowValues::from(Some("a")), RowValues::Text("a".into()));
    }

    #[test]
    fn timestamp_from_text() {
        let v = RowValues::Text("2024-05-01 10:30:00".into());
        assert!(v.as_timestamp().is_some());
        assert!(RowValues::Int(3).as_timestamp().is_none());
    }
}
