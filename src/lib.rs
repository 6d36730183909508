//! # Mathgame Adaptive Difficulty Engine
//!
//! Backend core for an arithmetic-practice game: generates problems near a
//! target difficulty, checks free-text answers, and adapts difficulty to keep
//! a target ratio of work time to reward-video time.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  MATHGAME ADAPTIVE ENGINE                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  ├── hash.rs     - FNV-1a problem ids                        │
//! │  └── rational.rs - Exact rational parse / format             │
//! │                                                              │
//! │  generator/      - Problem Generator                         │
//! │  ├── options.rs  - Options, operators, tuning                │
//! │  ├── number.rs   - Leaf numbers and leaf difficulty          │
//! │  ├── term.rs     - Expression terms                          │
//! │  ├── operation.rs- Operator combination                      │
//! │  └── eval.rs     - Exact expression evaluation               │
//! │                                                              │
//! │  answer/         - Answer Equivalence Checker                │
//! │                                                              │
//! │  game/           - Gamestate Controller                      │
//! │  ├── events.rs   - Event log and parsed actions              │
//! │  ├── state.rs    - Gamestate, Settings, Problem, Video       │
//! │  ├── store.rs    - Collaborator traits                       │
//! │  ├── memory.rs   - In-memory backend                         │
//! │  ├── adaptive.rs - Adaptive difficulty step                  │
//! │  ├── config.rs   - Controller configuration                  │
//! │  └── controller.rs - process_events                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! All randomness comes from a seeded Xorshift128+ generator, and all
//! answer arithmetic is exact. Given the same seed, options and event
//! batch, the engine produces the same problems and the same state.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod generator;
pub mod answer;
pub mod game;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use core::hash::{problem_id, ProblemId};
pub use generator::{generate, GeneratedProblem, GeneratorConfig, Options, OptionsError};
pub use answer::{answers_equivalent, AnswerPolicy};
pub use game::{ControllerConfig, ControllerError, Event, EventType, GamestateController, PlayData};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
