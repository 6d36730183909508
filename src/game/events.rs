//! Gameplay Events
//!
//! The append-only event log. Event types travel as open strings; the
//! controller parses every input event into an `EventAction` before it
//! touches any state, so a bad batch is rejected as a whole.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::state::{ProblemType, UserId};

/// Known event types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// No value.
    LoggedIn,
    /// Value: problem id.
    DisplayedProblem,
    /// Value: duration in seconds.
    WorkingOnProblem,
    /// Value: submitted answer.
    AnsweredProblem,
    /// Value: duration in seconds.
    WatchingVideo,
    /// Value: video id.
    DoneWatchingVideo,
    /// Value: new target difficulty.
    SetTargetDifficulty,
    /// Value: new target work percentage.
    SetTargetWorkPercentage,
    /// Value: new problem type bitmap.
    SetProblemTypeBitmap,
    /// Value: new gamestate target.
    SetGamestateTarget,
    /// Value: video id, if known.
    ErrorPlayingVideo,
    /// Value: id of the problem chosen for the user.
    SelectedProblem,
}

impl EventType {
    /// Every known event type.
    pub const ALL: [EventType; 12] = [
        EventType::LoggedIn,
        EventType::DisplayedProblem,
        EventType::WorkingOnProblem,
        EventType::AnsweredProblem,
        EventType::WatchingVideo,
        EventType::DoneWatchingVideo,
        EventType::SetTargetDifficulty,
        EventType::SetTargetWorkPercentage,
        EventType::SetProblemTypeBitmap,
        EventType::SetGamestateTarget,
        EventType::ErrorPlayingVideo,
        EventType::SelectedProblem,
    ];

    /// Wire tag.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::LoggedIn => "logged_in",
            EventType::DisplayedProblem => "displayed_problem",
            EventType::WorkingOnProblem => "working_on_problem",
            EventType::AnsweredProblem => "answered_problem",
            EventType::WatchingVideo => "watching_video",
            EventType::DoneWatchingVideo => "done_watching_video",
            EventType::SetTargetDifficulty => "set_target_difficulty",
            EventType::SetTargetWorkPercentage => "set_target_work_percentage",
            EventType::SetProblemTypeBitmap => "set_problem_type_bitmap",
            EventType::SetGamestateTarget => "set_gamestate_target",
            EventType::ErrorPlayingVideo => "error_playing_video",
            EventType::SelectedProblem => "selected_problem",
        }
    }

    /// Whether the value is a duration that feeds the work ratio.
    pub fn is_duration(self) -> bool {
        matches!(self, EventType::WorkingOnProblem | EventType::WatchingVideo)
    }
}

impl FromStr for EventType {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EventError::UnknownEventType(s.to_string()))
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// EVENT ROW
// =============================================================================

/// One row of the event log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Assigned by the event store; 0 until appended.
    #[serde(default)]
    pub id: u64,
    /// Stamped by the controller when the event is committed.
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
    /// Stamped by the controller.
    #[serde(default)]
    pub user_id: UserId,
    /// Open string tag, normally one of `EventType`.
    pub event_type: String,
    /// Always a string; numbers and ids are stringified.
    #[serde(default)]
    pub value: String,
}

impl Event {
    /// Create an unstamped event.
    pub fn new(event_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: 0,
            timestamp: DateTime::<Utc>::default(),
            user_id: 0,
            event_type: event_type.into(),
            value: value.into(),
        }
    }

    /// Create an unstamped event of a known type.
    pub fn of(event_type: EventType, value: impl Into<String>) -> Self {
        Self::new(event_type.as_str(), value)
    }

    /// Parsed event type.
    pub fn kind(&self) -> Result<EventType, EventError> {
        self.event_type.parse()
    }

    /// Duration in seconds, for duration events with a valid value.
    pub fn duration(&self) -> Option<f64> {
        match self.kind() {
            Ok(t) if t.is_duration() => parse_duration(&self.value).ok(),
            _ => None,
        }
    }
}

// =============================================================================
// PARSED ACTIONS
// =============================================================================

/// Event parsing errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventError {
    /// Tag is not a known event type.
    #[error("invalid event type: {0}")]
    UnknownEventType(String),

    /// Value does not fit the event type.
    #[error("invalid value '{value}' for {event_type}: {reason}")]
    InvalidValue {
        /// Event type.
        event_type: EventType,
        /// Raw value.
        value: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// What an input event asks the controller to do.
#[derive(Clone, Debug, PartialEq)]
pub enum EventAction {
    /// Log only.
    Record,
    /// Log only; the duration feeds the work ratio.
    Duration(f64),
    /// Check an answer against the current problem.
    Answer(String),
    /// Replace the target difficulty.
    SetTargetDifficulty(f64),
    /// Replace the target work percentage.
    SetTargetWorkPercentage(u8),
    /// Replace the problem type bitmap.
    SetProblemTypeBitmap(u64),
    /// Replace the gamestate target.
    SetGamestateTarget(u32),
    /// Disable the current video and pick another.
    ErrorPlayingVideo,
    /// Reward finished: adapt, reset, pick another video.
    DoneWatchingVideo,
}

impl EventAction {
    /// Parse an event into an action.
    pub fn parse(event: &Event) -> Result<EventAction, EventError> {
        let kind = event.kind()?;
        let value = event.value.trim();
        let invalid = |reason| EventError::InvalidValue {
            event_type: kind,
            value: event.value.clone(),
            reason,
        };

        let action = match kind {
            EventType::LoggedIn | EventType::DisplayedProblem | EventType::SelectedProblem => {
                EventAction::Record
            }
            EventType::WorkingOnProblem | EventType::WatchingVideo => {
                EventAction::Duration(parse_duration(value).map_err(invalid)?)
            }
            EventType::AnsweredProblem => EventAction::Answer(event.value.clone()),
            EventType::SetTargetDifficulty => {
                let d: f64 = value.parse().map_err(|_| invalid("not a number"))?;
                if !d.is_finite() {
                    return Err(invalid("not finite"));
                }
                EventAction::SetTargetDifficulty(d)
            }
            EventType::SetTargetWorkPercentage => {
                let pct: f64 = value.parse().map_err(|_| invalid("not a number"))?;
                if !(0.0..=100.0).contains(&pct) {
                    return Err(invalid("must be between 0 and 100"));
                }
                EventAction::SetTargetWorkPercentage(pct.round() as u8)
            }
            EventType::SetProblemTypeBitmap => {
                let bitmap: u64 = value.parse().map_err(|_| invalid("not a bitmap"))?;
                if ProblemType(bitmap).operators().is_empty() {
                    return Err(invalid("no operator enabled"));
                }
                EventAction::SetProblemTypeBitmap(bitmap)
            }
            EventType::SetGamestateTarget => {
                EventAction::SetGamestateTarget(value.parse().map_err(|_| invalid("not a count"))?)
            }
            EventType::ErrorPlayingVideo => EventAction::ErrorPlayingVideo,
            EventType::DoneWatchingVideo => EventAction::DoneWatchingVideo,
        };
        Ok(action)
    }
}

fn parse_duration(value: &str) -> Result<f64, &'static str> {
    let secs: f64 = value.trim().parse().map_err(|_| "not a duration")?;
    if !secs.is_finite() || secs < 0.0 {
        return Err("duration must be a non-negative number");
    }
    Ok(secs)
}

// =============================================================================
// TESTS
// =============================================================================
