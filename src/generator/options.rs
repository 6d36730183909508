//! Generation Options and Tuning
//!
//! `Options` is what a caller asks for; `GeneratorConfig` holds the tuning
//! constants of the difficulty model and is always passed in explicitly.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Supported arithmetic operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
}

impl Operator {
    /// Every supported operator.
    pub const ALL: [Operator; 3] = [Operator::Add, Operator::Subtract, Operator::Multiply];

    /// Symbol used in options and rendered expressions.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
        }
    }

    /// Parse an operator symbol.
    pub fn from_symbol(symbol: &str) -> Option<Operator> {
        match symbol {
            "+" => Some(Operator::Add),
            "-" => Some(Operator::Subtract),
            "*" => Some(Operator::Multiply),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Options for one generation call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Options {
    /// Allowed operator symbols (`"+"`, `"-"`, `"*"`).
    pub operations: Vec<String>,
    /// Accepted but not yet used by leaf generation.
    pub fractions: bool,
    /// Allow negative leaves.
    pub negatives: bool,
    /// Difficulty the generated expression should converge to.
    pub target_difficulty: f64,
}

impl Options {
    /// Check every field and resolve operator symbols.
    ///
    /// Duplicated symbols are kept, which weights the random operator pick.
    pub fn validate(&self) -> Result<Vec<Operator>, OptionsError> {
        if !self.target_difficulty.is_finite() {
            return Err(OptionsError::InvalidTargetDifficulty(self.target_difficulty));
        }
        self.operations
            .iter()
            .map(|symbol| {
                Operator::from_symbol(symbol)
                    .ok_or_else(|| OptionsError::UnsupportedOperation(symbol.clone()))
            })
            .collect()
    }
}

/// Options validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionsError {
    /// Operator symbol outside the supported set.
    #[error("'{0}' is not a supported operation")]
    UnsupportedOperation(String),

    /// Target difficulty is NaN or infinite.
    #[error("target difficulty {0} is not a finite number")]
    InvalidTargetDifficulty(f64),
}

/// Tuning constants of the difficulty model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Starting leaf difficulty as a fraction of the target.
    pub starting_difficulty_ratio: f64,
    /// Accepted overshoot above the target difficulty.
    pub target_delta: f64,
    /// Leaves are drawn strictly below this magnitude.
    pub max_allowed_number: u64,
    /// Base of the leaf difficulty logarithm.
    pub number_diff_magnitude: f64,
    /// Difficulty multiplier for negative leaves.
    pub negative_diff_multiplier: f64,
    /// Difficulty multiplier for addition.
    pub add_diff_multiplier: f64,
    /// Difficulty multiplier for subtraction.
    pub sub_diff_multiplier: f64,
    /// Difficulty multiplier for multiplication.
    pub mul_diff_multiplier: f64,
    /// Hard cap on refinement iterations.
    pub max_iterations: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            starting_difficulty_ratio: 1.0 / 3.0,
            target_delta: 0.25,
            max_allowed_number: 100_000,
            number_diff_magnitude: 3.0,
            negative_diff_multiplier: 1.5,
            add_diff_multiplier: 1.0,
            sub_diff_multiplier: 1.2,
            mul_diff_multiplier: 2.0,
            max_iterations: 256,
        }
    }
}

impl GeneratorConfig {
    /// Combination multiplier for an operator.
    pub fn multiplier(&self, op: Operator) -> f64 {
        match op {
            Operator::Add => self.add_diff_multiplier,
            Operator::Subtract => self.sub_diff_multiplier,
            Operator::Multiply => self.mul_diff_multiplier,
        }
    }
}
