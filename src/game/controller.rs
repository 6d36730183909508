//! Gamestate Controller
//!
//! Applies an ordered batch of events for one user.
//!
//! ## Call Flow
//!
//! 1. Parse every input event. Any unknown type or bad value rejects the
//!    whole batch before anything is read or written.
//! 2. Load Settings and Gamestate once, creating defaults for new users.
//! 3. Apply each event in order. Follow-on events (adaptive changes,
//!    problem selection) are queued directly after the event that caused
//!    them.
//! 4. Commit: append all events, then Settings if changed, then Gamestate
//!    if changed.
//!
//! ## Partial Commits
//!
//! The commit is three independent store calls. If one fails the earlier
//! ones stay applied; the caller sees the store error. Problem rows and
//! video updates are written while events are applied, before the commit.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::core::hash::ProblemId;
use crate::core::rational::parse_decimal;
use crate::core::rng::DeterministicRng;
use crate::game::adaptive::{adjust, Direction};
use crate::game::config::ControllerConfig;
use crate::game::events::{Event, EventAction, EventError, EventType};
use crate::game::state::{
    Gamestate, PlayData, Problem, ProblemType, Settings, UserId, VideoExclusions,
};
use crate::game::store::{
    Backend, EventStore, GamestateStore, ProblemStore, SettingsStore, StoreError, VideoStore,
    WorkTotals,
};
use crate::generator::{evaluate, generate, OptionsError};

// =============================================================================
// ERRORS
// =============================================================================

/// Controller errors.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// An input event could not be parsed.
    #[error(transparent)]
    Event(#[from] EventError),

    /// Settings enable no operator.
    #[error("problem type bitmap {0} enables no operators")]
    NoProblemTypes(u64),

    /// No enabled video left for the user.
    #[error("no eligible reward video for user {0}")]
    NoEligibleVideo(UserId),

    /// Gamestate points at a problem that is not stored.
    #[error("current problem {0} does not exist")]
    ProblemMissing(ProblemId),

    /// Every generation attempt failed answer verification.
    #[error("no verified problem after {0} attempts")]
    GenerationFailed(u32),

    /// Generator rejected the options built from Settings.
    #[error(transparent)]
    Options(#[from] OptionsError),

    /// A collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ControllerError {
    /// True for errors caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ControllerError::Event(_)
                | ControllerError::Options(_)
                | ControllerError::NoProblemTypes(_)
        )
    }
}

// =============================================================================
// CALL STATE
// =============================================================================

/// Working copy of one user's rows for the duration of a call.
struct CallState {
    user: UserId,
    gamestate: Gamestate,
    settings: Settings,
    gamestate_changed: bool,
    settings_changed: bool,
    /// Input and follow-on events, in commit order.
    pending: Vec<Event>,
}

impl CallState {
    fn record(&mut self, event_type: EventType, value: impl Into<String>) {
        self.pending.push(Event::of(event_type, value));
    }

    /// Replace the value of the input event being applied.
    fn log_applied(&mut self, value: impl ToString) {
        if let Some(event) = self.pending.last_mut() {
            event.value = value.to_string();
        }
    }

    fn set_target(&mut self, target: u32) {
        self.gamestate.target = target;
        self.gamestate.solved = self.gamestate.solved.min(target);
        self.gamestate_changed = true;
    }

    /// Duration totals of this call's events, newest first, at most `limit`.
    fn pending_work(&self, limit: usize) -> WorkTotals {
        let mut totals = WorkTotals::default();
        let durations = self
            .pending
            .iter()
            .rev()
            .filter_map(|e| Some((e.kind().ok()?, e.duration()?)))
            .take(limit);
        for (kind, seconds) in durations {
            totals.add(kind == EventType::WorkingOnProblem, seconds);
        }
        totals
    }

    fn pending_displayed(&self) -> impl Iterator<Item = ProblemId> + '_ {
        self.pending
            .iter()
            .filter(|e| e.event_type == EventType::DisplayedProblem.as_str())
            .filter_map(|e| e.value.trim().parse().ok())
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Event-driven controller over a storage backend.
pub struct GamestateController<B: Backend> {
    store: B,
    config: ControllerConfig,
    rng: DeterministicRng,
    clock: fn() -> DateTime<Utc>,
}

impl<B: Backend> GamestateController<B> {
    /// Create a controller.
    pub fn new(store: B, config: ControllerConfig) -> Self {
        let rng = DeterministicRng::new(config.rng_seed.unwrap_or_default());
        Self {
            store,
            config,
            rng,
            clock: Utc::now,
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Backing store.
    pub fn store(&self) -> &B {
        &self.store
    }

    /// Backing store, mutably.
    pub fn store_mut(&mut self) -> &mut B {
        &mut self.store
    }

    /// Consume the controller, returning the store.
    pub fn into_store(self) -> B {
        self.store
    }

    /// Apply `events` for `user` in order.
    ///
    /// Returns the final gamestate with its problem and video when
    /// `write_response` is set.
    pub fn process_events(
        &mut self,
        user: UserId,
        events: &[Event],
        write_response: bool,
    ) -> Result<Option<PlayData>, ControllerError> {
        let actions = events
            .iter()
            .map(EventAction::parse)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                warn!("Rejecting {} events for user {}: {}", events.len(), user, e);
                e
            })?;

        let now = (self.clock)();
        if self.config.rng_seed.is_none() {
            let nanos = now.timestamp_nanos_opt().unwrap_or_default();
            self.rng = DeterministicRng::for_user(u64::from(user), nanos);
        }

        let mut state = self.load(user, now)?;

        for (event, action) in events.iter().zip(actions) {
            state.pending.push(event.clone());
            let need_problem = self.apply(&mut state, action)?;
            if need_problem {
                self.select_problem(&mut state, now)?;
            }
        }

        self.commit(&mut state, now)?;

        if !write_response {
            return Ok(None);
        }
        let problem = match state.gamestate.problem_id {
            Some(id) => self.store.get_problem(id)?,
            None => None,
        };
        let video = match state.gamestate.video_id {
            Some(id) => self.store.get_video(id)?,
            None => None,
        };
        Ok(Some(PlayData {
            gamestate: state.gamestate,
            problem,
            video,
        }))
    }

    /// Load both rows, creating defaults for a new user.
    fn load(&mut self, user: UserId, now: DateTime<Utc>) -> Result<CallState, ControllerError> {
        let stored_settings = self.store.get_settings(user)?;
        let stored_gamestate = self.store.get_gamestate(user)?;

        let mut state = CallState {
            user,
            settings_changed: stored_settings.is_none(),
            gamestate_changed: stored_gamestate.is_none(),
            settings: stored_settings.unwrap_or_else(|| self.config.default_settings(user)),
            gamestate: stored_gamestate.unwrap_or_else(|| self.config.default_gamestate(user)),
            pending: Vec::new(),
        };

        if state.settings_changed {
            info!("Creating default settings for user {}", user);
            let settings = state.settings.clone();
            state.record(
                EventType::SetProblemTypeBitmap,
                settings.problem_type_bitmap.0.to_string(),
            );
            state.record(EventType::SetTargetDifficulty, settings.target_difficulty.to_string());
            state.record(
                EventType::SetTargetWorkPercentage,
                settings.target_work_percentage.to_string(),
            );
        }
        if state.gamestate_changed {
            info!("Creating gamestate for user {}", user);
            let target = state.gamestate.target;
            state.record(EventType::SetGamestateTarget, target.to_string());
        }
        debug!(settings = ?state.settings, gamestate = ?state.gamestate, "loaded");

        if state.gamestate.problem_id.is_none() {
            self.select_problem(&mut state, now)?;
        }
        Ok(state)
    }

    /// Apply one event. Returns whether a new problem is needed.
    ///
    /// Settings events are logged with the value actually applied.
    fn apply(
        &mut self,
        state: &mut CallState,
        action: EventAction,
    ) -> Result<bool, ControllerError> {
        let user = state.user;
        match action {
            EventAction::Record | EventAction::Duration(_) => Ok(false),

            EventAction::SetTargetDifficulty(requested) => {
                let difficulty = self.config.clamp_difficulty(requested);
                if difficulty != requested {
                    warn!("Target difficulty {} below minimum, using {}", requested, difficulty);
                    state.log_applied(difficulty);
                }
                state.settings.target_difficulty = difficulty;
                state.settings_changed = true;
                Ok(true)
            }

            EventAction::SetProblemTypeBitmap(bitmap) => {
                state.settings.problem_type_bitmap = ProblemType(bitmap);
                state.settings_changed = true;
                Ok(true)
            }

            EventAction::SetTargetWorkPercentage(pct) => {
                state.log_applied(pct);
                state.settings.target_work_percentage = pct;
                state.settings_changed = true;
                Ok(false)
            }

            EventAction::SetGamestateTarget(requested) => {
                let target = self.config.clamp_target(requested);
                if target != requested {
                    warn!("Gamestate target {} out of range, using {}", requested, target);
                    state.log_applied(target);
                }
                state.set_target(target);
                Ok(false)
            }

            EventAction::Answer(submitted) => self.check_answer(state, &submitted),

            EventAction::ErrorPlayingVideo => {
                let mut exclude = VideoExclusions::new();
                if let Some(video_id) = state.gamestate.video_id {
                    let mut video = self
                        .store
                        .get_video(video_id)?
                        .ok_or_else(|| StoreError::not_found("video", video_id))?;
                    info!("Disabling video {} for user {}", video.id, user);
                    video.disabled = true;
                    self.store.update_video(&video)?;
                    exclude.insert(video_id);
                }
                self.replace_video(state, &exclude)?;
                Ok(false)
            }

            EventAction::DoneWatchingVideo => {
                if state.gamestate.solved < state.gamestate.target {
                    error!(
                        "Done watching video, but problems solved is inconsistent: {} < {}",
                        state.gamestate.solved, state.gamestate.target
                    );
                }
                self.adapt(state)?;

                state.gamestate.solved = 0;
                state.gamestate_changed = true;

                let exclude: VideoExclusions = state.gamestate.video_id.into_iter().collect();
                self.replace_video(state, &exclude)?;
                Ok(false)
            }
        }
    }

    fn check_answer(
        &mut self,
        state: &mut CallState,
        submitted: &str,
    ) -> Result<bool, ControllerError> {
        let Some(problem_id) = state.gamestate.problem_id else {
            warn!("Answer {:?} from user {} with no current problem", submitted, state.user);
            return Ok(false);
        };
        let problem = self
            .store
            .get_problem(problem_id)?
            .ok_or(ControllerError::ProblemMissing(problem_id))?;

        if !self.config.answer_policy.accepts(submitted, &problem.answer) {
            info!(
                "Incorrect answer: {{{}}}, expected: {{{}}}",
                submitted, problem.answer
            );
            return Ok(false);
        }

        if state.gamestate.reached_target() {
            warn!(
                "Correct answer with {} of {} already solved; not counting it",
                state.gamestate.solved, state.gamestate.target
            );
        } else {
            state.gamestate.solved += 1;
            state.gamestate_changed = true;
        }
        debug!(
            solved = state.gamestate.solved,
            target = state.gamestate.target,
            "correct answer"
        );
        Ok(true)
    }

    /// Adjust problem count and difficulty from the recent work ratio.
    fn adapt(&mut self, state: &mut CallState) -> Result<(), ControllerError> {
        let window = self.config.duration_window;
        let in_call = state.pending_work(window);
        let stored = self.store.work_totals(state.user, window - in_call.events)?;
        let totals = in_call.merge(stored);

        let work_fraction = match totals.work_fraction() {
            Some(f) => f,
            None => {
                warn!(
                    "No recorded durations for user {}, skipping difficulty adjustment",
                    state.user
                );
                return Ok(());
            }
        };

        info!(
            "workPercentage: {:.3}, target: {}%, starting difficulty & num problems: {}, {}",
            work_fraction,
            state.settings.target_work_percentage,
            state.settings.target_difficulty,
            state.gamestate.target
        );

        let adjustment = adjust(
            work_fraction,
            state.settings.target_work_percentage,
            state.gamestate.target,
            state.settings.target_difficulty,
            &self.config.adaptive,
        );

        if adjustment.direction == Direction::OnTarget {
            info!("Difficulty is on target");
        }
        if let Some(target) = adjustment.target {
            state.set_target(target);
            state.record(EventType::SetGamestateTarget, target.to_string());
        }
        if let Some(difficulty) = adjustment.difficulty {
            state.settings.target_difficulty = difficulty;
            state.settings_changed = true;
            state.record(EventType::SetTargetDifficulty, difficulty.to_string());
        }

        info!(
            "Modified difficulty & num problems: {}, {}",
            state.settings.target_difficulty, state.gamestate.target
        );
        Ok(())
    }

    fn replace_video(
        &mut self,
        state: &mut CallState,
        exclude: &VideoExclusions,
    ) -> Result<(), ControllerError> {
        let video_id = self
            .store
            .select_video(state.user, exclude)?
            .ok_or(ControllerError::NoEligibleVideo(state.user))?;
        debug!("Selected video {} for user {}", video_id, state.user);
        state.gamestate.video_id = Some(video_id);
        state.gamestate_changed = true;
        Ok(())
    }

    /// Generate a problem for the current settings and make it current.
    fn select_problem(
        &mut self,
        state: &mut CallState,
        now: DateTime<Utc>,
    ) -> Result<(), ControllerError> {
        let bitmap = state.settings.problem_type_bitmap;
        if bitmap.operators().is_empty() {
            return Err(ControllerError::NoProblemTypes(bitmap.0));
        }

        let since = now
            .checked_sub_signed(self.config.problem_lookback)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut recent: BTreeSet<ProblemId> = self
            .store
            .displayed_problems_since(state.user, since)?
            .into_iter()
            .collect();
        recent.extend(state.pending_displayed());
        recent.extend(state.gamestate.problem_id);

        let problem = self.generate_problem(&state.settings, &recent)?;
        if self.store.create_problem(&problem)? {
            debug!("Stored new problem {} {}", problem.id, problem.expression);
        }

        info!(
            "Selected problem {} ({}) for user {}",
            problem.id, problem.expression, state.user
        );
        state.gamestate.problem_id = Some(problem.id);
        state.gamestate_changed = true;
        state.record(EventType::SelectedProblem, problem.id.to_string());
        Ok(())
    }

    /// Generate until a verified problem outside `recent` comes up.
    ///
    /// Falls back to a recently shown problem when attempts run out.
    fn generate_problem(
        &mut self,
        settings: &Settings,
        recent: &BTreeSet<ProblemId>,
    ) -> Result<Problem, ControllerError> {
        let options = settings.generator_options();
        let attempts = self.config.regeneration_attempts.max(1);
        let mut fallback = None;

        for attempt in 1..=attempts {
            let generated = generate(&options, &self.config.generator, &mut self.rng)?;

            let verified = evaluate(&generated.expression)
                .ok()
                .is_some_and(|value| Some(value) == parse_decimal(&generated.answer));
            if !verified {
                error!(
                    "Generated answer does not match {}: {}",
                    generated.expression, generated.answer
                );
                continue;
            }

            let problem = Problem::from(generated);
            if !recent.contains(&problem.id) {
                return Ok(problem);
            }
            debug!(attempt, id = problem.id, "problem shown recently, retrying");
            fallback = Some(problem);
        }

        fallback.ok_or(ControllerError::GenerationFailed(attempts))
    }

    fn commit(&mut self, state: &mut CallState, now: DateTime<Utc>) -> Result<(), ControllerError> {
        for event in &mut state.pending {
            event.user_id = state.user;
            event.timestamp = now;
            event.id = self.store.append_event(event)?;
        }

        if state.settings_changed {
            debug!(settings = ?state.settings, "writing settings");
            self.store.update_settings(&state.settings)?;
        }
        if state.gamestate_changed {
            debug!(gamestate = ?state.gamestate, "writing gamestate");
            self.store.update_gamestate(&state.gamestate)?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::AnswerPolicy;
    use crate::core::hash::problem_id;
    use crate::game::memory::{FailPoint, MemoryStore};
    use crate::game::state::Video;
    use chrono::TimeZone;

    const USER: UserId = 1;

    fn fixed_clock() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn video(id: u32) -> Video {
        Video {
            id,
            title: format!("video {}", id),
            url: format!("https://videos.test/{}", id),
            disabled: false,
        }
    }

    fn store_with_videos(count: u32) -> MemoryStore {
        let mut store = MemoryStore::new(9);
        for id in 1..=count {
            store.add_video(USER, video(id));
        }
        store
    }

    fn controller_with(
        store: MemoryStore,
        config: ControllerConfig,
    ) -> GamestateController<MemoryStore> {
        let config = ControllerConfig { rng_seed: Some(42), ..config };
        GamestateController::new(store, config).with_clock(fixed_clock)
    }

    fn controller(store: MemoryStore) -> GamestateController<MemoryStore> {
        controller_with(store, ControllerConfig::default())
    }

    /// Store a problem and seed rows that point at it.
    fn seed(
        store: &mut MemoryStore,
        expression: &str,
        answer: &str,
        solved: u32,
        target: u32,
    ) -> ProblemId {
        let problem = Problem {
            id: problem_id(expression),
            expression: expression.to_string(),
            answer: answer.to_string(),
            difficulty: 3.0,
            problem_type_bitmap: ProblemType::ADDITION,
        };
        store.create_problem(&problem).unwrap();
        store
            .update_settings(&Settings {
                user_id: USER,
                problem_type_bitmap: ProblemType::ADDITION,
                target_difficulty: 4.0,
                target_work_percentage: 50,
            })
            .unwrap();
        store
            .update_gamestate(&Gamestate {
                user_id: USER,
                problem_id: Some(problem.id),
                video_id: Some(1),
                solved,
                target,
            })
            .unwrap();
        problem.id
    }

    fn event_types(store: &MemoryStore) -> Vec<&str> {
        store.events().iter().map(|e| e.event_type.as_str()).collect()
    }

    fn logged(store: &MemoryStore) -> Vec<(&str, &str)> {
        store
            .events()
            .iter()
            .map(|e| (e.event_type.as_str(), e.value.as_str()))
            .collect()
    }

    fn gamestate(ctl: &GamestateController<MemoryStore>) -> Gamestate {
        ctl.store().get_gamestate(USER).unwrap().unwrap()
    }

    fn settings(ctl: &GamestateController<MemoryStore>) -> Settings {
        ctl.store().get_settings(USER).unwrap().unwrap()
    }

    #[test]
    fn test_first_call_creates_defaults() {
        let mut ctl = controller(store_with_videos(3));
        ctl.process_events(USER, &[Event::of(EventType::LoggedIn, "")], false).unwrap();

        assert_eq!(
            event_types(ctl.store()),
            vec![
                "set_problem_type_bitmap",
                "set_target_difficulty",
                "set_target_work_percentage",
                "set_gamestate_target",
                "selected_problem",
                "logged_in",
            ]
        );

        let settings = settings(&ctl);
        assert_eq!(settings.problem_type_bitmap, ProblemType::ADDITION);
        assert_eq!(settings.target_difficulty, 3.0);
        assert_eq!(settings.target_work_percentage, 70);

        let gs = gamestate(&ctl);
        assert_eq!(gs.target, 10);
        assert_eq!(gs.solved, 0);
        assert_eq!(gs.video_id, None);
        let problem = ctl.store().get_problem(gs.problem_id.unwrap()).unwrap().unwrap();
        assert!(!problem.expression.contains('-'));
        assert_eq!(evaluate(&problem.expression).ok(), parse_decimal(&problem.answer));
    }

    #[test]
    fn test_unknown_event_rejects_whole_batch() {
        let mut ctl = controller(store_with_videos(3));
        let events = [Event::of(EventType::LoggedIn, ""), Event::new("bogus", "1")];
        let err = ctl.process_events(USER, &events, true).unwrap_err();

        assert!(matches!(
            err,
            ControllerError::Event(EventError::UnknownEventType(ref t)) if t == "bogus"
        ));
        assert!(err.is_client_error());
        assert!(ctl.store().events().is_empty());
        assert_eq!(ctl.store().get_settings(USER).unwrap(), None);
        assert_eq!(ctl.store().get_gamestate(USER).unwrap(), None);
    }

    #[test]
    fn test_invalid_value_rejects_whole_batch() {
        let mut ctl = controller(store_with_videos(3));
        let err = ctl
            .process_events(USER, &[Event::of(EventType::SetTargetWorkPercentage, "150")], false)
            .unwrap_err();
        assert!(err.is_client_error());
        assert!(ctl.store().events().is_empty());
    }

    #[test]
    fn test_correct_answer_increments_solved() {
        let mut store = store_with_videos(3);
        let pid = seed(&mut store, "2+3", "5", 2, 10);
        let mut ctl = controller(store);

        ctl.process_events(
            USER,
            &[Event::of(EventType::AnsweredProblem, "5"), Event::of(EventType::LoggedIn, "")],
            false,
        )
        .unwrap();

        let gs = gamestate(&ctl);
        assert_eq!(gs.solved, 3);
        assert_ne!(gs.problem_id, Some(pid));
        // Follow-on event sits between its input and the next input
        assert_eq!(
            event_types(ctl.store()),
            vec!["answered_problem", "selected_problem", "logged_in"]
        );
        assert_eq!(ctl.store().events()[1].value, gs.problem_id.unwrap().to_string());
    }

    #[test]
    fn test_incorrect_answer_changes_nothing() {
        let mut store = store_with_videos(3);
        let pid = seed(&mut store, "2+3", "5", 2, 10);
        let mut ctl = controller(store);

        ctl.process_events(USER, &[Event::of(EventType::AnsweredProblem, "6")], false).unwrap();

        let gs = gamestate(&ctl);
        assert_eq!(gs.solved, 2);
        assert_eq!(gs.problem_id, Some(pid));
        assert_eq!(event_types(ctl.store()), vec!["answered_problem"]);
    }

    #[test]
    fn test_solved_never_exceeds_target() {
        let mut store = store_with_videos(3);
        seed(&mut store, "2+3", "5", 5, 5);
        let mut ctl = controller(store);

        ctl.process_events(USER, &[Event::of(EventType::AnsweredProblem, "5")], false).unwrap();
        assert_eq!(gamestate(&ctl).solved, 5);
    }

    #[test]
    fn test_answer_without_current_problem_is_ignored() {
        let mut ctl = controller(store_with_videos(2));
        let mut state = CallState {
            user: USER,
            gamestate: Gamestate::new(USER, 10),
            settings: ctl.config().default_settings(USER),
            gamestate_changed: false,
            settings_changed: false,
            pending: Vec::new(),
        };

        assert!(!ctl.check_answer(&mut state, "5").unwrap());
        assert_eq!(state.gamestate.solved, 0);
        assert!(!state.gamestate_changed);
    }

    #[test]
    fn test_equivalent_answer_policy() {
        let mut store = store_with_videos(3);
        seed(&mut store, "1+1/2", "3/2", 0, 10);
        let mut ctl = controller(store);

        ctl.process_events(USER, &[Event::of(EventType::AnsweredProblem, "1 1/2")], false)
            .unwrap();
        assert_eq!(gamestate(&ctl).solved, 1);
    }

    #[test]
    fn test_exact_match_answer_policy() {
        let mut store = store_with_videos(3);
        seed(&mut store, "1+1/2", "3/2", 0, 10);
        let config = ControllerConfig {
            answer_policy: AnswerPolicy::ExactMatch,
            ..Default::default()
        };
        let mut ctl = controller_with(store, config);

        ctl.process_events(USER, &[Event::of(EventType::AnsweredProblem, "1.5")], false)
            .unwrap();
        assert_eq!(gamestate(&ctl).solved, 0);

        ctl.process_events(USER, &[Event::of(EventType::AnsweredProblem, "3/2")], false)
            .unwrap();
        assert_eq!(gamestate(&ctl).solved, 1);
    }

    #[test]
    fn test_missing_problem_is_an_error() {
        let mut store = store_with_videos(3);
        seed(&mut store, "2+3", "5", 0, 10);
        store
            .update_gamestate(&Gamestate { problem_id: Some(7), ..Gamestate::new(USER, 10) })
            .unwrap();
        let mut ctl = controller(store);

        let err = ctl
            .process_events(USER, &[Event::of(EventType::AnsweredProblem, "5")], false)
            .unwrap_err();
        assert!(matches!(err, ControllerError::ProblemMissing(7)));
        assert!(ctl.store().events().is_empty());
    }

    #[test]
    fn test_done_watching_with_heavy_work_halves_target() {
        let mut store = store_with_videos(2);
        seed(&mut store, "2+3", "5", 20, 20);
        let earlier = Event {
            user_id: USER,
            timestamp: fixed_clock() - chrono::Duration::minutes(5),
            ..Event::of(EventType::WorkingOnProblem, "90")
        };
        store.append_event(&earlier).unwrap();
        let latest = Event {
            user_id: USER,
            timestamp: fixed_clock(),
            ..Event::of(EventType::WatchingVideo, "10")
        };
        store.append_event(&latest).unwrap();
        let mut ctl = controller(store);

        // 90% working against a 50% target means less work
        ctl.process_events(USER, &[Event::of(EventType::DoneWatchingVideo, "1")], false)
            .unwrap();

        let gs = gamestate(&ctl);
        assert_eq!(gs.target, 10);
        assert_eq!(gs.solved, 0);
        // The video just watched is excluded
        assert_eq!(gs.video_id, Some(2));
        assert_eq!(settings(&ctl).target_difficulty, 4.0);

        assert_eq!(
            logged(ctl.store())[2..],
            [("done_watching_video", "1"), ("set_gamestate_target", "10")]
        );
    }

    #[test]
    fn test_done_watching_needing_more_work_at_cap_raises_difficulty() {
        let mut store = store_with_videos(3);
        seed(&mut store, "2+3", "5", 20, 20);
        let mut ctl = controller(store);

        // In-call durations count toward the window: 10% working against 50%
        ctl.process_events(
            USER,
            &[
                Event::of(EventType::WorkingOnProblem, "10"),
                Event::of(EventType::WatchingVideo, "90"),
                Event::of(EventType::DoneWatchingVideo, "1"),
            ],
            false,
        )
        .unwrap();

        assert_eq!(gamestate(&ctl).target, 10);
        // 4.0 + max(1, 0.05 * 4.0)
        assert_eq!(settings(&ctl).target_difficulty, 5.0);
        assert_eq!(
            event_types(ctl.store()),
            vec![
                "working_on_problem",
                "watching_video",
                "done_watching_video",
                "set_gamestate_target",
                "set_target_difficulty",
            ]
        );
    }

    #[test]
    fn test_done_watching_without_durations_skips_adjustment() {
        let mut store = store_with_videos(3);
        seed(&mut store, "2+3", "5", 3, 10);
        let mut ctl = controller(store);

        ctl.process_events(USER, &[Event::of(EventType::DoneWatchingVideo, "1")], false)
            .unwrap();

        let gs = gamestate(&ctl);
        assert_eq!(gs.target, 10);
        assert_eq!(gs.solved, 0);
        assert_eq!(event_types(ctl.store()), vec!["done_watching_video"]);
    }

    #[test]
    fn test_error_playing_video_disables_and_replaces() {
        let mut store = store_with_videos(2);
        seed(&mut store, "2+3", "5", 0, 10);
        let mut ctl = controller(store);

        ctl.process_events(USER, &[Event::of(EventType::ErrorPlayingVideo, "1")], false)
            .unwrap();

        assert!(ctl.store().get_video(1).unwrap().unwrap().disabled);
        assert_eq!(gamestate(&ctl).video_id, Some(2));
    }

    #[test]
    fn test_error_playing_video_without_current_video() {
        let mut store = store_with_videos(2);
        seed(&mut store, "2+3", "5", 0, 10);
        let gs = store.get_gamestate(USER).unwrap().unwrap();
        store.update_gamestate(&Gamestate { video_id: None, ..gs }).unwrap();
        let mut ctl = controller(store);

        ctl.process_events(USER, &[Event::of(EventType::ErrorPlayingVideo, "")], false)
            .unwrap();

        // Nothing to disable, any enabled video may be chosen
        assert!(!ctl.store().get_video(1).unwrap().unwrap().disabled);
        assert!(!ctl.store().get_video(2).unwrap().unwrap().disabled);
        assert!(matches!(gamestate(&ctl).video_id, Some(1) | Some(2)));
    }

    #[test]
    fn test_no_eligible_video_aborts_call() {
        let mut store = store_with_videos(1);
        seed(&mut store, "2+3", "5", 0, 10);
        let mut ctl = controller(store);

        let err = ctl
            .process_events(USER, &[Event::of(EventType::ErrorPlayingVideo, "1")], false)
            .unwrap_err();
        assert!(matches!(err, ControllerError::NoEligibleVideo(USER)));
        assert!(!err.is_client_error());
        assert!(ctl.store().events().is_empty());
        assert_eq!(gamestate(&ctl).video_id, Some(1));
    }

    #[test]
    fn test_settings_events_clamp_and_regenerate() {
        let mut store = store_with_videos(3);
        let pid = seed(&mut store, "2+3", "5", 8, 10);
        let mut ctl = controller(store);

        ctl.process_events(
            USER,
            &[
                Event::of(EventType::SetTargetDifficulty, "1"),
                Event::of(EventType::SetGamestateTarget, "2"),
                Event::of(EventType::SetTargetWorkPercentage, "60"),
            ],
            false,
        )
        .unwrap();

        let settings = settings(&ctl);
        assert_eq!(settings.target_difficulty, 3.0);
        assert_eq!(settings.target_work_percentage, 60);
        let gs = gamestate(&ctl);
        assert_eq!(gs.target, 5);
        assert_eq!(gs.solved, 5);
        assert_ne!(gs.problem_id, Some(pid));
        assert_eq!(
            event_types(ctl.store()),
            vec![
                "set_target_difficulty",
                "selected_problem",
                "set_gamestate_target",
                "set_target_work_percentage",
            ]
        );
    }

    #[test]
    fn test_settings_events_log_applied_values() {
        let mut store = store_with_videos(3);
        seed(&mut store, "2+3", "5", 0, 10);
        let mut ctl = controller(store);

        ctl.process_events(
            USER,
            &[
                Event::of(EventType::SetTargetDifficulty, "1"),
                Event::of(EventType::SetGamestateTarget, "99"),
                Event::of(EventType::SetTargetWorkPercentage, "62.6"),
            ],
            false,
        )
        .unwrap();

        let settings = settings(&ctl);
        let gs = gamestate(&ctl);
        let events = ctl.store().events();
        assert_eq!(events[0].event_type, "set_target_difficulty");
        assert_eq!(events[0].value.parse::<f64>().unwrap(), settings.target_difficulty);
        assert_eq!(events[2].event_type, "set_gamestate_target");
        assert_eq!(events[2].value.parse::<u32>().unwrap(), gs.target);
        assert_eq!(events[3].event_type, "set_target_work_percentage");
        assert_eq!(events[3].value.parse::<u8>().unwrap(), settings.target_work_percentage);

        assert_eq!(
            logged(ctl.store())[2..],
            [("set_gamestate_target", "20"), ("set_target_work_percentage", "63")]
        );
    }

    #[test]
    fn test_in_range_settings_keep_their_value() {
        let mut store = store_with_videos(3);
        seed(&mut store, "2+3", "5", 0, 10);
        let mut ctl = controller(store);

        ctl.process_events(USER, &[Event::of(EventType::SetTargetDifficulty, "4.5")], false)
            .unwrap();

        assert_eq!(settings(&ctl).target_difficulty, 4.5);
        assert_eq!(logged(ctl.store())[0], ("set_target_difficulty", "4.5"));
    }

    #[test]
    fn test_problem_type_bitmap_change_regenerates_with_new_operators() {
        let mut store = store_with_videos(3);
        seed(&mut store, "2+3", "5", 0, 10);
        let mut ctl = controller(store);

        ctl.process_events(USER, &[Event::of(EventType::SetProblemTypeBitmap, "2")], false)
            .unwrap();

        let gs = gamestate(&ctl);
        let problem = ctl.store().get_problem(gs.problem_id.unwrap()).unwrap().unwrap();
        assert!(!problem.expression.contains('+'));
        assert_eq!(settings(&ctl).problem_type_bitmap, ProblemType::SUBTRACTION);
    }

    #[test]
    fn test_stored_empty_bitmap_cannot_generate() {
        let mut store = store_with_videos(3);
        store
            .update_settings(&Settings {
                user_id: USER,
                problem_type_bitmap: ProblemType::NEGATIVES,
                target_difficulty: 3.0,
                target_work_percentage: 70,
            })
            .unwrap();
        let mut ctl = controller(store);

        let err = ctl
            .process_events(USER, &[Event::of(EventType::LoggedIn, "")], false)
            .unwrap_err();
        assert!(matches!(err, ControllerError::NoProblemTypes(8)));
        assert!(ctl.store().events().is_empty());
    }

    #[test]
    fn test_huge_problem_lookback_saturates() {
        let config = ControllerConfig {
            problem_lookback: chrono::Duration::days(100_000_000),
            ..Default::default()
        };
        let mut ctl = controller_with(store_with_videos(2), config);

        ctl.process_events(USER, &[Event::of(EventType::LoggedIn, "")], false).unwrap();
        assert!(gamestate(&ctl).problem_id.is_some());
    }

    #[test]
    fn test_partial_commit_keeps_earlier_writes() {
        let mut store = store_with_videos(3);
        seed(&mut store, "2+3", "5", 0, 10);
        store.fail_at(FailPoint::UpdateGamestate, 0);
        let mut ctl = controller(store);

        let events = [
            Event::of(EventType::SetGamestateTarget, "12"),
            Event::of(EventType::SetTargetWorkPercentage, "60"),
        ];
        let err = ctl.process_events(USER, &events, false).unwrap_err();

        assert!(matches!(err, ControllerError::Store(StoreError::Backend(_))));
        // Events and settings landed, gamestate did not
        assert_eq!(ctl.store().events().len(), 2);
        assert_eq!(settings(&ctl).target_work_percentage, 60);
        assert_eq!(gamestate(&ctl).target, 10);
    }

    #[test]
    fn test_failed_event_append_writes_nothing_else() {
        let mut store = store_with_videos(3);
        seed(&mut store, "2+3", "5", 0, 10);
        store.fail_at(FailPoint::AppendEvent, 1);
        let mut ctl = controller(store);

        let events = [
            Event::of(EventType::SetTargetWorkPercentage, "60"),
            Event::of(EventType::LoggedIn, ""),
        ];
        let err = ctl.process_events(USER, &events, false).unwrap_err();

        assert!(matches!(err, ControllerError::Store(_)));
        assert_eq!(event_types(ctl.store()), vec!["set_target_work_percentage"]);
        assert_eq!(settings(&ctl).target_work_percentage, 50);
    }

    #[test]
    fn test_response_resolves_problem_and_video() {
        let mut store = store_with_videos(3);
        let pid = seed(&mut store, "2+3", "5", 0, 10);
        let mut ctl = controller(store);

        let data = ctl
            .process_events(USER, &[Event::of(EventType::DisplayedProblem, pid.to_string())], true)
            .unwrap()
            .unwrap();

        assert_eq!(data.gamestate.problem_id, Some(pid));
        assert_eq!(data.problem.unwrap().answer, "5");
        assert_eq!(data.video.unwrap().id, 1);

        let none = ctl.process_events(USER, &[Event::of(EventType::LoggedIn, "")], false).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_response_serializes() {
        let mut ctl = controller(store_with_videos(3));
        let data = ctl
            .process_events(USER, &[Event::of(EventType::LoggedIn, "")], true)
            .unwrap()
            .unwrap();
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["gamestate"]["target"], 10);
        assert!(json["video"].is_null());
        assert!(json["problem"]["expression"].is_string());
    }

    #[test]
    fn test_events_are_stamped() {
        let mut ctl = controller(store_with_videos(3));
        ctl.process_events(USER, &[Event::of(EventType::LoggedIn, "")], false).unwrap();
        for (i, event) in ctl.store().events().iter().enumerate() {
            assert_eq!(event.user_id, USER);
            assert_eq!(event.timestamp, fixed_clock());
            assert_eq!(event.id, i as u64 + 1);
        }
    }

    #[test]
    fn test_same_expression_same_problem_row() {
        let mut store = store_with_videos(3);
        seed(&mut store, "2+3", "5", 0, 10);
        let found = store.find_problem_by_expression("2 + 3").unwrap().unwrap();
        assert_eq!(found.id, problem_id("2+3"));
        assert_eq!(problem_id("2+3"), problem_id("2+3"));
    }
}
