//! Adaptive Difficulty
//!
//! After each reward video the controller compares the user's recent work
//! ratio with their target and moves two levers: the number of problems per
//! reward and the target difficulty. Pure; the controller applies the result.

use serde::{Serialize, Deserialize};

/// Bounds and step sizes for the adaptive step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveLimits {
    /// Fewest problems per reward.
    pub min_problems: u32,
    /// Most problems per reward.
    pub max_target: u32,
    /// Lowest target difficulty.
    pub min_difficulty: f64,
    /// Work ratios this close to the target need no change.
    pub epsilon: f64,
    /// Difficulty moves by `max(1, ratio * difficulty)`.
    pub difficulty_step_ratio: f64,
}

impl Default for AdaptiveLimits {
    fn default() -> Self {
        Self {
            min_problems: 5,
            max_target: 20,
            min_difficulty: 3.0,
            epsilon: 0.05,
            difficulty_step_ratio: 0.05,
        }
    }
}

impl AdaptiveLimits {
    fn difficulty_step(&self, difficulty: f64) -> f64 {
        (self.difficulty_step_ratio * difficulty).max(1.0)
    }

    fn halved_target(&self, target: u32) -> u32 {
        self.min_problems.max(target.div_ceil(2))
    }
}

/// Which way the work ratio is off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Within epsilon of the target.
    OnTarget,
    /// Too little time spent working.
    MoreWork,
    /// Too much time spent working.
    LessWork,
}

/// New lever values. `None` leaves a lever untouched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Adjustment {
    /// Direction that was applied.
    pub direction: Direction,
    /// New problems-per-reward target.
    pub target: Option<u32>,
    /// New target difficulty.
    pub difficulty: Option<f64>,
}

/// Compute the adaptive step.
///
/// `work_fraction` is `work / (work + video)` over the recent window and
/// `target_work_percentage` is 0-100.
pub fn adjust(
    work_fraction: f64,
    target_work_percentage: u8,
    target: u32,
    difficulty: f64,
    limits: &AdaptiveLimits,
) -> Adjustment {
    let wanted = f64::from(target_work_percentage) / 100.0;

    let unchanged = |direction| Adjustment { direction, target: None, difficulty: None };

    if (wanted - work_fraction).abs() < limits.epsilon {
        return unchanged(Direction::OnTarget);
    }

    if wanted > work_fraction {
        // Harder: more problems, and once at the cap trade count for difficulty
        if target < limits.max_target {
            return Adjustment { target: Some(target + 1), ..unchanged(Direction::MoreWork) };
        }
        return Adjustment {
            target: Some(limits.halved_target(target)),
            difficulty: Some(difficulty + limits.difficulty_step(difficulty)),
            ..unchanged(Direction::MoreWork)
        };
    }

    if target > limits.min_problems {
        return Adjustment {
            target: Some(limits.halved_target(target)),
            ..unchanged(Direction::LessWork)
        };
    }
    if difficulty <= limits.min_difficulty {
        // Already as easy as allowed
        return Adjustment {
            difficulty: Some(limits.min_difficulty),
            ..unchanged(Direction::LessWork)
        };
    }
    Adjustment {
        target: Some(target + 1),
        difficulty: Some(
            limits
                .min_difficulty
                .max(difficulty - limits.difficulty_step(difficulty)),
        ),
        ..unchanged(Direction::LessWork)
    }
}
