//! Problem Generator
//!
//! Synthesizes an arithmetic expression whose heuristic difficulty converges
//! to a requested target, using only the allowed operators.
//!
//! ## Algorithm
//!
//! 1. Start from a leaf at `target * starting_difficulty_ratio`.
//! 2. Each iteration computes `remaining = target - current`. From the second
//!    iteration on, stop once `remaining` falls below the leaf difficulty of
//!    `target / ln(iteration)`.
//! 3. Otherwise sample operators without replacement. For each, bound a new
//!    leaf by inverting the operator's difficulty formula, combine, and
//!    accept if the result overshoots the target by at most `target_delta`.
//! 4. If no operator is accepted the current expression is final.
//!
//! ## Module Structure
//!
//! - `options`: Options, Operator, GeneratorConfig, validation
//! - `number`: leaf generation and leaf difficulty
//! - `term`: expression + exact value + difficulty
//! - `operation`: operator combination
//! - `eval`: exact evaluator used to verify answers

pub mod options;
pub mod number;
pub mod term;
pub mod operation;
pub mod eval;

use std::collections::BTreeSet;

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::rng::DeterministicRng;

pub use options::{GeneratorConfig, Operator, Options, OptionsError};
pub use number::{generate_number, number_difficulty};
pub use term::Term;
pub use eval::{evaluate, EvalError};

/// Output of one generation call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedProblem {
    /// Rendered expression, no whitespace.
    pub expression: String,
    /// Canonical answer: reduced fraction or integer.
    pub answer: String,
    /// Heuristic difficulty of `expression`.
    pub difficulty: f64,
    /// Operators that appear in `expression`.
    pub operators: BTreeSet<Operator>,
}

impl From<Term> for GeneratedProblem {
    fn from(term: Term) -> Self {
        Self {
            answer: term.answer(),
            expression: term.expr,
            difficulty: term.difficulty,
            operators: term.operators,
        }
    }
}

/// Generate a problem.
///
/// Fails only when `options` is invalid; that check runs before any
/// randomness is drawn.
pub fn generate(
    options: &Options,
    config: &GeneratorConfig,
    rng: &mut DeterministicRng,
) -> Result<GeneratedProblem, OptionsError> {
    let operators = options.validate()?;
    let target = options.target_difficulty;

    let mut current =
        generate_number(target * config.starting_difficulty_ratio, options, config, rng);
    let mut iteration = 1u32;

    while iteration <= config.max_iterations {
        match step(&current, iteration, &operators, options, config, rng) {
            Some(next) => current = next,
            None => break,
        }
        iteration += 1;
    }

    debug!(
        target_difficulty = target,
        difficulty = current.difficulty,
        iterations = iteration,
        expression = %current.expr,
        "generated problem"
    );

    Ok(current.into())
}

/// One refinement step. `None` means the term is final.
fn step(
    current: &Term,
    iteration: u32,
    operators: &[Operator],
    options: &Options,
    config: &GeneratorConfig,
    rng: &mut DeterministicRng,
) -> Option<Term> {
    let target = options.target_difficulty;
    let remaining = target - current.difficulty;

    if iteration > 1 {
        let threshold = number_difficulty(target / (iteration as f64).ln(), config);
        if remaining <= threshold {
            return None;
        }
    }

    let mut candidates = operators.to_vec();
    while !candidates.is_empty() {
        let idx = rng.next_index(candidates.len());
        let op = candidates[idx];

        let operand = generate_number(op.input_difficulty(remaining, config), options, config, rng);
        let combined = op.apply(current, &operand, options, config);
        debug!(iteration, op = %op, candidate = %combined, "trying operator");

        if combined.difficulty - target <= config.target_delta {
            return Some(combined);
        }
        candidates.swap_remove(idx);
    }

    None
}

// =============================================================================
// TESTS
// =============================================================================
