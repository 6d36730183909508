//! Answer Equivalence
//!
//! Decides whether a typed answer equals a stored canonical answer even when
//! the text differs: `1/2`, `2/4`, `0.5` and `.5` are all the same answer, as
//! are `1.5`, `3/2` and `1 1/2`.
//!
//! Parse order for each side:
//! 1. decimal / fraction grammar (leading `.` normalized to `0.`)
//! 2. mixed number `<signed-int> <int>/<int>`; a negative whole part negates
//!    the whole value, so `-1 1/2` is `-3/2`
//! 3. float fallback, converted to its nearest exact rational
//!
//! Anything that fails all three is "not equivalent"; parsing never errors.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};
use serde::{Serialize, Deserialize};

use crate::core::rational::{from_f64, parse_decimal};

/// How a submitted answer is compared to the stored one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPolicy {
    /// Byte-identical strings only.
    ExactMatch,
    /// Mathematically equal values.
    #[default]
    Equivalent,
}

impl AnswerPolicy {
    /// Compare a submitted answer against the canonical one.
    pub fn accepts(self, submitted: &str, correct: &str) -> bool {
        match self {
            AnswerPolicy::ExactMatch => submitted == correct,
            AnswerPolicy::Equivalent => answers_equivalent(submitted, correct),
        }
    }

    /// Parse a policy name (`exact_match` / `equivalent`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "exact_match" | "exact" => Some(AnswerPolicy::ExactMatch),
            "equivalent" | "rational" => Some(AnswerPolicy::Equivalent),
            _ => None,
        }
    }
}

/// Whether two answers are mathematically equal.
pub fn answers_equivalent(submitted: &str, correct: &str) -> bool {
    if submitted == correct {
        return true;
    }
    match (parse_answer(submitted), parse_answer(correct)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Parse an answer string into an exact rational.
pub fn parse_answer(s: &str) -> Option<BigRational> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let normalized = if let Some(rest) = s.strip_prefix('.') {
        format!("0.{}", rest)
    } else if let Some(rest) = s.strip_prefix("-.") {
        format!("-0.{}", rest)
    } else {
        s.to_string()
    };

    parse_decimal(&normalized)
        .or_else(|| parse_mixed_number(&normalized))
        .or_else(|| normalized.parse::<f64>().ok().and_then(from_f64))
}

/// Parse `<signed-int> <int>/<int>`.
fn parse_mixed_number(s: &str) -> Option<BigRational> {
    let (whole, fraction) = s.split_once(char::is_whitespace)?;
    let (num, den) = fraction.trim_start().split_once('/')?;

    let (negative, whole_digits) = match whole.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, whole),
    };

    let whole = digits(whole_digits)?;
    let num = digits(num)?;
    let den = digits(den)?;
    if den.is_zero() {
        return None;
    }

    let magnitude = BigRational::from_integer(whole) + BigRational::new(num, den);
    // "-0 1/2" still reads as negative
    Some(if negative { -magnitude.abs() } else { magnitude })
}

fn digits(s: &str) -> Option<BigInt> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
