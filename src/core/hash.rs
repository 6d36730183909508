//! Problem Identity Hashing
//!
//! Problems are keyed by a stable hash of their expression text, so the same
//! expression always maps to the same id no matter who generated it or when.

/// Problem identifier (32-bit FNV-1a of the normalized expression).
pub type ProblemId = u32;

const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a 32bit
pub fn fnv1a32(s: &str) -> u32 {
    let mut h = FNV_OFFSET_BASIS;
    for &b in s.as_bytes() {
        h ^= b as u32;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Strip all whitespace from an expression.
///
/// Stored expressions never contain whitespace; ids are computed on this form.
pub fn normalize_expression(expr: &str) -> String {
    expr.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Compute the problem id for an expression.
pub fn problem_id(expr: &str) -> ProblemId {
    fnv1a32(&normalize_expression(expr))
}

// =============================================================================
// TESTS
// =============================================================================
