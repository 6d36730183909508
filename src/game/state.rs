//! Persisted State Shapes
//!
//! Per-user rows the controller reads and writes, plus the problem and
//! video rows it resolves for the play-data response.

use std::collections::BTreeSet;

use serde::{Serialize, Deserialize};

use crate::core::hash::ProblemId;
use crate::generator::{GeneratedProblem, Operator, Options};

/// User identifier.
pub type UserId = u32;

/// Reward-video identifier.
pub type VideoId = u32;

// =============================================================================
// PROBLEM TYPE BITMAP
// =============================================================================

/// Allowed-operator bitmap stored in Settings and on each Problem.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblemType(pub u64);

impl ProblemType {
    /// `+` problems.
    pub const ADDITION: ProblemType = ProblemType(1);
    /// `-` problems.
    pub const SUBTRACTION: ProblemType = ProblemType(1 << 1);
    /// `*` problems.
    pub const MULTIPLICATION: ProblemType = ProblemType(1 << 2);
    /// Negative leaves allowed.
    pub const NEGATIVES: ProblemType = ProblemType(1 << 3);

    /// Check whether every bit of `other` is set.
    #[inline]
    pub fn contains(self, other: ProblemType) -> bool {
        self.0 & other.0 == other.0
    }

    /// Bit for an operator.
    pub fn for_operator(op: Operator) -> ProblemType {
        match op {
            Operator::Add => ProblemType::ADDITION,
            Operator::Subtract => ProblemType::SUBTRACTION,
            Operator::Multiply => ProblemType::MULTIPLICATION,
        }
    }

    /// Bitmap of a set of operators.
    pub fn from_operators<'a>(ops: impl IntoIterator<Item = &'a Operator>) -> ProblemType {
        ProblemType(ops.into_iter().fold(0, |acc, op| acc | Self::for_operator(*op).0))
    }

    /// Operators enabled by this bitmap, in `Operator::ALL` order.
    pub fn operators(self) -> Vec<Operator> {
        Operator::ALL
            .iter()
            .copied()
            .filter(|op| self.contains(Self::for_operator(*op)))
            .collect()
    }

    /// Generation options for this bitmap at a target difficulty.
    pub fn to_options(self, target_difficulty: f64) -> Options {
        Options {
            operations: self.operators().iter().map(|op| op.symbol().to_string()).collect(),
            fractions: false,
            negatives: self.contains(ProblemType::NEGATIVES),
            target_difficulty,
        }
    }
}

impl std::ops::BitOr for ProblemType {
    type Output = ProblemType;

    fn bitor(self, rhs: ProblemType) -> ProblemType {
        ProblemType(self.0 | rhs.0)
    }
}

// =============================================================================
// ROWS
// =============================================================================

/// Per-user progression record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gamestate {
    /// Owner.
    pub user_id: UserId,
    /// Problem currently shown. `None` until one is selected.
    pub problem_id: Option<ProblemId>,
    /// Current reward video. `None` until one is selected.
    pub video_id: Option<VideoId>,
    /// Problems solved toward the next reward.
    pub solved: u32,
    /// Problems required for the next reward.
    pub target: u32,
}

impl Gamestate {
    /// Fresh gamestate with no problem or video.
    pub fn new(user_id: UserId, target: u32) -> Self {
        Self {
            user_id,
            problem_id: None,
            video_id: None,
            solved: 0,
            target,
        }
    }

    /// True once the reward video is earned.
    pub fn reached_target(&self) -> bool {
        self.solved >= self.target
    }
}

/// Per-user settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Owner.
    pub user_id: UserId,
    /// Allowed problem types.
    pub problem_type_bitmap: ProblemType,
    /// Target difficulty for generated problems.
    pub target_difficulty: f64,
    /// Share of recent time that should be spent working (0-100).
    pub target_work_percentage: u8,
}

impl Settings {
    /// Generation options for the current settings.
    pub fn generator_options(&self) -> Options {
        self.problem_type_bitmap.to_options(self.target_difficulty)
    }
}

/// A stored problem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Hash of `expression`.
    pub id: ProblemId,
    /// Expression text, no whitespace.
    pub expression: String,
    /// Canonical answer.
    pub answer: String,
    /// Heuristic difficulty.
    pub difficulty: f64,
    /// Operators used by `expression`.
    pub problem_type_bitmap: ProblemType,
}

impl From<GeneratedProblem> for Problem {
    fn from(p: GeneratedProblem) -> Self {
        Self {
            id: crate::core::hash::problem_id(&p.expression),
            problem_type_bitmap: ProblemType::from_operators(&p.operators),
            expression: p.expression,
            answer: p.answer,
            difficulty: p.difficulty,
        }
    }
}

/// A reward video.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    /// Identifier.
    pub id: VideoId,
    /// Display title.
    pub title: String,
    /// Playback URL.
    pub url: String,
    /// Disabled videos are never selected again.
    pub disabled: bool,
}

/// Response body: the final gamestate with its problem and video resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayData {
    /// Final gamestate.
    pub gamestate: Gamestate,
    /// Current problem, if one is set.
    pub problem: Option<Problem>,
    /// Current reward video, if one is set.
    pub video: Option<Video>,
}

/// Video ids to skip when selecting a replacement.
pub type VideoExclusions = BTreeSet<VideoId>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_operators() {
        assert_eq!(ProblemType::ADDITION.operators(), vec![Operator::Add]);
        let both = ProblemType::ADDITION | ProblemType::SUBTRACTION;
        assert_eq!(both.operators(), vec![Operator::Add, Operator::Subtract]);
        assert!(ProblemType(0).operators().is_empty());
        assert!(ProblemType::NEGATIVES.operators().is_empty());
    }

    #[test]
    fn test_bitmap_to_options() {
        let bitmap =
            ProblemType::SUBTRACTION | ProblemType::MULTIPLICATION | ProblemType::NEGATIVES;
        let options = bitmap.to_options(4.5);
        assert_eq!(options.operations, vec!["-".to_string(), "*".to_string()]);
        assert!(options.negatives);
        assert!(!options.fractions);
        assert_eq!(options.target_difficulty, 4.5);
    }

    #[test]
    fn test_bitmap_from_operators() {
        let ops = [Operator::Multiply, Operator::Add];
        assert_eq!(ProblemType::from_operators(&ops), ProblemType(0b101));
        assert_eq!(ProblemType::from_operators(std::iter::empty()), ProblemType(0));
    }

    #[test]
    fn test_problem_from_generated() {
        let generated = GeneratedProblem {
            expression: "10-3".to_string(),
            answer: "7".to_string(),
            difficulty: 3.6,
            operators: [Operator::Subtract].into_iter().collect(),
        };
        let problem = Problem::from(generated);
        assert_eq!(problem.id, crate::core::hash::problem_id("10-3"));
        assert_eq!(problem.problem_type_bitmap, ProblemType::SUBTRACTION);
        assert_eq!(problem.answer, "7");
    }

    #[test]
    fn test_gamestate_serializes_bitmap_as_integer() {
        let settings = Settings {
            user_id: 1,
            problem_type_bitmap: ProblemType(3),
            target_difficulty: 3.0,
            target_work_percentage: 70,
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["problem_type_bitmap"], 3);
    }
}
