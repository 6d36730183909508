//! Exact Rational Helpers
//!
//! Canonical answers are exact reduced fractions. These helpers convert
//! between `BigRational` and the text forms stored and typed by players.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

/// Largest decimal exponent accepted by [`parse_decimal`].
const MAX_EXPONENT: u32 = 308;

/// Build a rational from an integer.
pub fn from_i64(n: i64) -> BigRational {
    BigRational::from_integer(BigInt::from(n))
}

/// Nearest exact rational for a finite float. `None` for NaN and infinities.
pub fn from_f64(f: f64) -> Option<BigRational> {
    BigRational::from_float(f)
}

/// Render a rational as `n` or `n/d` (always reduced, sign on the numerator).
pub fn format_rational(r: &BigRational) -> String {
    if r.denom().is_one() {
        r.numer().to_string()
    } else {
        format!("{}/{}", r.numer(), r.denom())
    }
}

/// Parse the decimal/fraction grammar:
///
/// ```text
/// [+-] digits '/' digits
/// [+-] digits [ '.' digits* ] [ (e|E) [+-] digits ]
/// [+-] '.' digits [ (e|E) [+-] digits ]
/// ```
///
/// Returns `None` for anything else, including a zero denominator.
pub fn parse_decimal(s: &str) -> Option<BigRational> {
    let (negative, body) = split_sign(s);
    if body.is_empty() {
        return None;
    }

    if let Some((num, den)) = body.split_once('/') {
        let num = parse_digits(num)?;
        let den = parse_digits(den)?;
        if den.is_zero() {
            return None;
        }
        let r = BigRational::new(num, den);
        return Some(if negative { -r } else { r });
    }

    let (mantissa, exponent) = match body.find(|c: char| c == 'e' || c == 'E') {
        Some(idx) => {
            let (exp_negative, exp_digits) = split_sign(&body[idx + 1..]);
            if exp_digits.is_empty() || !exp_digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let exp: u32 = exp_digits.parse().ok()?;
            if exp > MAX_EXPONENT {
                return None;
            }
            (&body[..idx], if exp_negative { -(exp as i64) } else { exp as i64 })
        }
        None => (body, 0),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }

    let digits = format!("{}{}", int_part, frac_part);
    let numer = parse_digits(&digits)?;
    let scale = exponent - frac_part.len() as i64;
    let ten = BigInt::from(10u32);
    let power = num_traits::pow(ten, scale.unsigned_abs() as usize);

    let r = if scale >= 0 {
        BigRational::from_integer(numer * power)
    } else {
        BigRational::new(numer, power)
    };
    Some(if negative { -r } else { r })
}

fn split_sign(s: &str) -> (bool, &str) {
    if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    }
}

fn parse_digits(s: &str) -> Option<BigInt> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
