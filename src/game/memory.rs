//! In-Memory Backend
//!
//! Implements every store trait over ordered maps. Used by the demo binary
//! and the controller tests. Writes can be made to fail on demand to
//! exercise partial commits.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::core::hash::ProblemId;
use crate::core::rng::DeterministicRng;
use crate::game::events::{Event, EventType};
use crate::game::state::{Gamestate, Problem, Settings, UserId, Video, VideoExclusions, VideoId};
use crate::game::store::{
    EventStore, GamestateStore, ProblemStore, SettingsStore, StoreError, StoreResult, VideoStore,
    WorkTotals,
};

/// Write operations that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailPoint {
    /// `append_event`
    AppendEvent,
    /// `update_settings`
    UpdateSettings,
    /// `update_gamestate`
    UpdateGamestate,
    /// `create_problem`
    CreateProblem,
    /// `update_video`
    UpdateVideo,
}

/// All state in ordered maps.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    problems: BTreeMap<ProblemId, Problem>,
    videos: BTreeMap<VideoId, Video>,
    user_videos: BTreeMap<UserId, BTreeSet<VideoId>>,
    settings: BTreeMap<UserId, Settings>,
    gamestates: BTreeMap<UserId, Gamestate>,
    events: Vec<Event>,
    next_event_id: u64,
    failures: BTreeMap<FailPoint, u32>,
    rng: DeterministicRng,
}

impl MemoryStore {
    /// Empty store; `seed` drives video selection.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(seed),
            next_event_id: 1,
            ..Default::default()
        }
    }

    /// Add a video to a user's library.
    pub fn add_video(&mut self, user: UserId, video: Video) {
        self.user_videos.entry(user).or_default().insert(video.id);
        self.videos.insert(video.id, video);
    }

    /// Make the `nth` (0-based) next call to `point` fail.
    pub fn fail_at(&mut self, point: FailPoint, nth: u32) {
        self.failures.insert(point, nth);
    }

    /// Every event, in append order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events of one user, in append order.
    pub fn events_for(&self, user: UserId) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.user_id == user)
    }

    /// Number of stored problems.
    pub fn problem_count(&self) -> usize {
        self.problems.len()
    }

    fn check(&mut self, point: FailPoint) -> StoreResult<()> {
        let Some(remaining) = self.failures.get_mut(&point) else {
            return Ok(());
        };
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(());
        }
        self.failures.remove(&point);
        Err(StoreError::Backend(format!("injected failure at {:?}", point)))
    }

    /// Most recent first: newest timestamp, then highest id.
    fn events_newest_first(&self, user: UserId) -> Vec<&Event> {
        let mut events: Vec<&Event> = self.events_for(user).collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        events
    }
}

impl ProblemStore for MemoryStore {
    fn get_problem(&self, id: ProblemId) -> StoreResult<Option<Problem>> {
        Ok(self.problems.get(&id).cloned())
    }

    fn create_problem(&mut self, problem: &Problem) -> StoreResult<bool> {
        self.check(FailPoint::CreateProblem)?;
        if self.problems.contains_key(&problem.id) {
            return Ok(false);
        }
        self.problems.insert(problem.id, problem.clone());
        Ok(true)
    }
}

impl VideoStore for MemoryStore {
    fn get_video(&self, id: VideoId) -> StoreResult<Option<Video>> {
        Ok(self.videos.get(&id).cloned())
    }

    fn update_video(&mut self, video: &Video) -> StoreResult<()> {
        self.check(FailPoint::UpdateVideo)?;
        if !self.videos.contains_key(&video.id) {
            return Err(StoreError::not_found("video", video.id));
        }
        self.videos.insert(video.id, video.clone());
        Ok(())
    }

    fn select_video(
        &mut self,
        user: UserId,
        exclude: &VideoExclusions,
    ) -> StoreResult<Option<VideoId>> {
        let candidates: Vec<VideoId> = self
            .user_videos
            .get(&user)
            .into_iter()
            .flatten()
            .copied()
            .filter(|id| !exclude.contains(id))
            .filter(|id| self.videos.get(id).is_some_and(|v| !v.disabled))
            .collect();
        Ok(self.rng.choose(&candidates).copied())
    }
}

impl SettingsStore for MemoryStore {
    fn get_settings(&self, user: UserId) -> StoreResult<Option<Settings>> {
        Ok(self.settings.get(&user).cloned())
    }

    fn update_settings(&mut self, settings: &Settings) -> StoreResult<()> {
        self.check(FailPoint::UpdateSettings)?;
        self.settings.insert(settings.user_id, settings.clone());
        Ok(())
    }
}

impl GamestateStore for MemoryStore {
    fn get_gamestate(&self, user: UserId) -> StoreResult<Option<Gamestate>> {
        Ok(self.gamestates.get(&user).cloned())
    }

    fn update_gamestate(&mut self, gamestate: &Gamestate) -> StoreResult<()> {
        self.check(FailPoint::UpdateGamestate)?;
        self.gamestates.insert(gamestate.user_id, gamestate.clone());
        Ok(())
    }
}

impl EventStore for MemoryStore {
    fn append_event(&mut self, event: &Event) -> StoreResult<u64> {
        self.check(FailPoint::AppendEvent)?;
        let id = self.next_event_id.max(1);
        self.next_event_id = id + 1;
        self.events.push(Event { id, ..event.clone() });
        Ok(id)
    }

    fn work_totals(&self, user: UserId, limit: usize) -> StoreResult<WorkTotals> {
        let mut totals = WorkTotals::default();
        let durations = self
            .events_newest_first(user)
            .into_iter()
            .filter_map(|e| Some((e.kind().ok()?, e.duration()?)))
            .take(limit);
        for (kind, seconds) in durations {
            totals.add(kind == EventType::WorkingOnProblem, seconds);
        }
        Ok(totals)
    }

    fn displayed_problems_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<ProblemId>> {
        Ok(self
            .events_for(user)
            .filter(|e| e.timestamp >= since)
            .filter(|e| e.event_type == EventType::DisplayedProblem.as_str())
            .filter_map(|e| e.value.trim().parse().ok())
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
