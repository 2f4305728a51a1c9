//! String collations and value ordering.

use std::cmp::Ordering;

use crate::model::Value;

/// How filter operands and property strings are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Collation {
    /// Case-insensitive.
    #[default]
    NoCase,
    /// Byte-wise.
    Binary,
    /// Case-insensitive, with digit runs compared by numeric value.
    Natural,
}

impl Collation {
    pub fn parse(name: &str) -> Option<Collation> {
        match name {
            "NOCASE" => Some(Collation::NoCase),
            "BINARY" => Some(Collation::Binary),
            "NATCOLL" => Some(Collation::Natural),
            _ => None,
        }
    }

    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            Collation::Binary => a.cmp(b),
            Collation::NoCase => a.to_lowercase().cmp(&b.to_lowercase()),
            Collation::Natural => natural_cmp(a, b),
        }
    }

    /// Folds a string for pattern matching under this collation.
    pub(crate) fn fold(self, s: &str) -> String {
        match self {
            Collation::Binary => s.to_string(),
            _ => s.to_lowercase(),
        }
    }
}

/// Compares strings caselessly, treating runs of ASCII digits as numbers,
/// so that "track 9" sorts before "track 10".
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let x_run = take_digits(&mut left);
                let y_run = take_digits(&mut right);
                let ord = compare_digit_runs(&x_run, &y_run);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
        .then_with(|| a.len().cmp(&b.len()))
}

/// Orders property values for sorting.
///
/// Numbers compare numerically, strings naturally; numbers sort before
/// strings, and any other type after both.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Int64(_) | Value::Float(_) => 0,
            Value::String(_) => 1,
            _ => 2,
        }
    }
    match (a, b) {
        (Value::Int64(x), Value::Int64(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
        (Value::Int64(x), Value::Float(y)) => (*x as f64).total_cmp(y),
        (Value::Float(x), Value::Int64(y)) => x.total_cmp(&(*y as f64)),
        (Value::String(x), Value::String(y)) => natural_cmp(x, y),
        _ => rank(a)
            .cmp(&rank(b))
            .then_with(|| (a.value_type() as u32).cmp(&(b.value_type() as u32))),
    }
}

/// Orders optional property values; entries lacking the property sort last.
pub fn compare_optional(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare_values(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
