//! Controller Configuration
//!
//! Every tunable the controller uses, with defaults matching the live game.
//! Values are passed in by the caller; nothing below reads the environment
//! except `from_env`.

use std::str::FromStr;

use chrono::Duration;
use tracing::warn;

use crate::answer::AnswerPolicy;
use crate::game::adaptive::AdaptiveLimits;
use crate::game::state::{Gamestate, ProblemType, Settings, UserId};
use crate::generator::GeneratorConfig;

/// Controller configuration.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Adaptive step bounds.
    pub adaptive: AdaptiveLimits,
    /// Problem generator tuning.
    pub generator: GeneratorConfig,
    /// How answers are compared.
    pub answer_policy: AnswerPolicy,
    /// Duration events in the work-ratio window.
    pub duration_window: usize,
    /// How far back displayed problems count as recent.
    pub problem_lookback: Duration,
    /// Generation attempts before accepting a recently shown problem.
    pub regeneration_attempts: u32,
    /// Problem types for new users.
    pub default_problem_types: ProblemType,
    /// Target difficulty for new users.
    pub default_target_difficulty: f64,
    /// Target work percentage for new users.
    pub default_target_work_percentage: u8,
    /// Problems per reward for new users.
    pub default_gamestate_target: u32,
    /// Fixed RNG seed. `None` derives one per call.
    pub rng_seed: Option<u64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            adaptive: AdaptiveLimits::default(),
            generator: GeneratorConfig::default(),
            answer_policy: AnswerPolicy::default(),
            duration_window: 900,
            problem_lookback: Duration::minutes(30),
            regeneration_attempts: 5,
            default_problem_types: ProblemType::ADDITION,
            default_target_difficulty: 3.0,
            default_target_work_percentage: 70,
            default_gamestate_target: 10,
            rng_seed: None,
        }
    }
}

impl ControllerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            answer_policy: std::env::var("MATHGAME_ANSWER_POLICY")
                .ok()
                .and_then(|v| {
                    let policy = AnswerPolicy::from_name(&v);
                    if policy.is_none() {
                        warn!("Ignoring unknown MATHGAME_ANSWER_POLICY {:?}", v);
                    }
                    policy
                })
                .unwrap_or(defaults.answer_policy),
            duration_window: env_parse("MATHGAME_DURATION_WINDOW")
                .unwrap_or(defaults.duration_window),
            problem_lookback: env_parse("MATHGAME_PROBLEM_LOOKBACK_MINUTES")
                .and_then(lookback_minutes)
                .unwrap_or(defaults.problem_lookback),
            default_target_difficulty: env_parse("MATHGAME_DEFAULT_TARGET_DIFFICULTY")
                .unwrap_or(defaults.default_target_difficulty),
            rng_seed: env_parse("MATHGAME_RNG_SEED"),
            ..defaults
        }
    }

    /// Settings for a user seen for the first time.
    pub fn default_settings(&self, user_id: UserId) -> Settings {
        Settings {
            user_id,
            problem_type_bitmap: self.default_problem_types,
            target_difficulty: self.default_target_difficulty.max(self.adaptive.min_difficulty),
            target_work_percentage: self.default_target_work_percentage.min(100),
        }
    }

    /// Gamestate for a user seen for the first time.
    pub fn default_gamestate(&self, user_id: UserId) -> Gamestate {
        Gamestate::new(user_id, self.clamp_target(self.default_gamestate_target))
    }

    /// Clamp a problems-per-reward target into bounds.
    pub fn clamp_target(&self, target: u32) -> u32 {
        target.clamp(self.adaptive.min_problems, self.adaptive.max_target)
    }

    /// Clamp a target difficulty to the floor.
    pub fn clamp_difficulty(&self, difficulty: f64) -> f64 {
        difficulty.max(self.adaptive.min_difficulty)
    }
}

fn lookback_minutes(minutes: i64) -> Option<Duration> {
    let lookback = Duration::try_minutes(minutes).filter(|d| *d >= Duration::zero());
    if lookback.is_none() {
        warn!("Ignoring out of range MATHGAME_PROBLEM_LOOKBACK_MINUTES={}", minutes);
    }
    lookback
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}
