use std::cmp::Ordering;

use regex::RegexBuilder;

use crate::types::RowValues;

fn numeric(value: &RowValues) -> Option<f64> {
    match value {
        RowValues::Int(i) => Some(*i as f64),
        RowValues::Float(f) => Some(*f),
        RowValues::Bool(b) => Some(f64::from(u8::from(*b))),
        RowValues::Text(s) => s.trim().parse::<f64>().ok(),
        RowValues::Null | RowValues::Blob(_) => None,
    }
}

fn textual(value: &RowValues) -> String {
    match value {
        RowValues::Int(i) => i.to_string(),
        RowValues::Float(f) => f.to_string(),
        RowValues::Text(s) => s.clone(),
        RowValues::Bool(b) => u8::from(*b).to_string(),
        RowValues::Null => String::new(),
        RowValues::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Loose ordering: numbers and numeric strings compare as numbers, everything else as text.
///
/// NULL only equals NULL and is unordered against anything else.
pub(crate) fn loose_cmp(left: &RowValues, right: &RowValues) -> Option<Ordering> {
    match (left, right) {
        (RowValues::Null, RowValues::Null) => Some(Ordering::Equal),
        (RowValues::Null, _) | (_, RowValues::Null) => None,
        _ => match (numeric(left), numeric(right)) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => Some(textual(left).cmp(&textual(right))),
        },
    }
}

pub(crate) fn loose_eq(left: &RowValues, right: &RowValues) -> bool {
    loose_cmp(left, right) == Some(Ordering::Equal)
}

/// SQL `LIKE`: `%` matches any run, `_` one character, case-insensitive.
pub(crate) fn like(value: &RowValues, pattern: &RowValues) -> bool {
    if value.is_null() || pattern.is_null() {
        return false;
    }
    let mut translated = String::from("^");
    for ch in textual(pattern).chars() {
        match ch {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            other => translated.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    translated.push('$');
    RegexBuilder::new(&translated)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .is_ok_and(|re| re.is_match(&textual(value)))
}
