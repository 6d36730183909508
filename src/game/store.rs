//! Collaborator Interfaces
//!
//! The controller never talks to a database directly. It reads and writes
//! through these traits; each write is a separate call with no enclosing
//! transaction.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::hash::{problem_id, ProblemId};
use crate::game::events::Event;
use crate::game::state::{Gamestate, Problem, Settings, UserId, Video, VideoExclusions, VideoId};

/// Storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A row the caller relies on does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Row kind.
        kind: &'static str,
        /// Row id.
        id: u64,
    },

    /// Any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Shorthand for `NotFound`.
    pub fn not_found(kind: &'static str, id: impl Into<u64>) -> Self {
        StoreError::NotFound { kind, id: id.into() }
    }
}

/// Result alias for store calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Seconds spent working and watching over a window of duration events.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorkTotals {
    /// Sum of `working_on_problem` durations.
    pub work_seconds: f64,
    /// Sum of `watching_video` durations.
    pub video_seconds: f64,
    /// Number of events summed.
    pub events: usize,
}

impl WorkTotals {
    /// Fold one duration event in.
    pub fn add(&mut self, working: bool, seconds: f64) {
        if working {
            self.work_seconds += seconds;
        } else {
            self.video_seconds += seconds;
        }
        self.events += 1;
    }

    /// Combine two windows.
    pub fn merge(self, other: WorkTotals) -> WorkTotals {
        WorkTotals {
            work_seconds: self.work_seconds + other.work_seconds,
            video_seconds: self.video_seconds + other.video_seconds,
            events: self.events + other.events,
        }
    }

    /// `work / (work + video)`, or `None` when nothing was recorded.
    pub fn work_fraction(&self) -> Option<f64> {
        let total = self.work_seconds + self.video_seconds;
        if total > 0.0 {
            Some(self.work_seconds / total)
        } else {
            None
        }
    }
}

/// Problem rows.
pub trait ProblemStore {
    /// Fetch a problem.
    fn get_problem(&self, id: ProblemId) -> StoreResult<Option<Problem>>;

    /// Insert a problem. Returns `false` if the id already existed.
    fn create_problem(&mut self, problem: &Problem) -> StoreResult<bool>;

    /// Fetch the problem stored for an expression.
    fn find_problem_by_expression(&self, expression: &str) -> StoreResult<Option<Problem>> {
        self.get_problem(problem_id(expression))
    }
}

/// Reward videos.
pub trait VideoStore {
    /// Fetch a video.
    fn get_video(&self, id: VideoId) -> StoreResult<Option<Video>>;

    /// Overwrite a video.
    fn update_video(&mut self, video: &Video) -> StoreResult<()>;

    /// Pick an enabled video for `user` outside `exclude`. `None` if there is none.
    fn select_video(
        &mut self,
        user: UserId,
        exclude: &VideoExclusions,
    ) -> StoreResult<Option<VideoId>>;
}

/// Settings rows.
pub trait SettingsStore {
    /// Fetch settings.
    fn get_settings(&self, user: UserId) -> StoreResult<Option<Settings>>;

    /// Insert or overwrite settings.
    fn update_settings(&mut self, settings: &Settings) -> StoreResult<()>;
}

/// Gamestate rows.
pub trait GamestateStore {
    /// Fetch a gamestate.
    fn get_gamestate(&self, user: UserId) -> StoreResult<Option<Gamestate>>;

    /// Insert or overwrite a gamestate.
    fn update_gamestate(&mut self, gamestate: &Gamestate) -> StoreResult<()>;
}

/// The append-only event log.
pub trait EventStore {
    /// Append an event and return its id.
    fn append_event(&mut self, event: &Event) -> StoreResult<u64>;

    /// Totals over the `limit` most recent duration events of `user`.
    fn work_totals(&self, user: UserId, limit: usize) -> StoreResult<WorkTotals>;

    /// Values of `displayed_problem` events at or after `since`.
    fn displayed_problems_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<ProblemId>>;
}

/// Everything the controller needs.
pub trait Backend: ProblemStore + VideoStore + SettingsStore + GamestateStore + EventStore {}

impl<T> Backend for T where
    T: ProblemStore + VideoStore + SettingsStore + GamestateStore + EventStore
{
}
