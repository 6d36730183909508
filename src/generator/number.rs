//! Leaf Number Generation
//!
//! Difficulty is exponential in magnitude: a leaf of difficulty `d` is drawn
//! below `base^d`, and its reported difficulty is `|log_base(n)|`.

use crate::core::rational::from_i64;
use crate::core::rng::DeterministicRng;
use crate::generator::options::{GeneratorConfig, Options};
use crate::generator::term::Term;

/// Difficulty reported for degenerate magnitudes (0, 1, infinities, NaN).
pub const DEGENERATE_DIFFICULTY: f64 = 0.5;

/// Heuristic difficulty of a number.
pub fn number_difficulty(n: f64, config: &GeneratorConfig) -> f64 {
    let diff = (n.abs().ln() / config.number_diff_magnitude.ln()).abs();
    if diff == 0.0 || !diff.is_finite() {
        DEGENERATE_DIFFICULTY
    } else {
        diff
    }
}

/// Draw a random leaf whose difficulty is bounded by `max_difficulty`.
pub fn generate_number(
    max_difficulty: f64,
    options: &Options,
    config: &GeneratorConfig,
    rng: &mut DeterministicRng,
) -> Term {
    let mut max_difficulty = max_difficulty;

    let negative = options.negatives && rng.next_coin();
    if negative {
        // Sign counts as difficulty, so spend less of it on magnitude
        max_difficulty /= config.negative_diff_multiplier;
    }
    // options.fractions is accepted but leaves are always integers for now

    let max = config
        .number_diff_magnitude
        .powf(max_difficulty)
        .min(config.max_allowed_number as f64)
        .max(1.0);

    let mut n = rng.next_below(max as u64) as i64;
    let mut difficulty = number_difficulty(n as f64, config);

    if negative {
        difficulty *= config.negative_diff_multiplier;
        n = -n;
    }

    Term::number(from_i64(n), difficulty)
}
