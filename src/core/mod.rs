//! Core deterministic primitives.
//!
//! Randomness, problem identity and exact rational helpers shared by the
//! generator, the answer checker and the controller.

pub mod rng;
pub mod hash;
pub mod rational;

// Re-export core types
pub use rng::DeterministicRng;
pub use hash::{problem_id, ProblemId};
pub use rational::{format_rational, parse_decimal};
