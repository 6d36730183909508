//! Mathgame Server Demo
//!
//! Drives one scripted play session against the in-memory backend and
//! prints the play data after each batch.

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mathgame::{
    VERSION,
    game::{
        ControllerConfig, Event, EventType, GamestateController, MemoryStore, PlayData, Video,
        store::ProblemStore,
    },
};

const DEMO_USER: u32 = 1;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Mathgame Server v{}", VERSION);

    let config = ControllerConfig::from_env();
    info!("Answer policy: {:?}", config.answer_policy);

    let mut store = MemoryStore::new(config.rng_seed.unwrap_or(7));
    for id in 1..=3 {
        store.add_video(
            DEMO_USER,
            Video {
                id,
                title: format!("Reward video {}", id),
                url: format!("https://videos.example/{}", id),
                disabled: false,
            },
        );
    }

    let mut controller = GamestateController::new(store, config);
    demo_session(&mut controller)
}

/// Log in, solve a round of problems, watch the reward.
fn demo_session(controller: &mut GamestateController<MemoryStore>) -> Result<()> {
    info!("=== Starting Demo Session ===");

    let mut data = send(controller, vec![Event::of(EventType::LoggedIn, "")])?;
    // First video pick happens on the first video error or reward
    data = send(controller, vec![Event::of(EventType::ErrorPlayingVideo, "")])?;

    while data.gamestate.solved < data.gamestate.target {
        let problem = data.problem.clone().context("gamestate has no problem")?;
        info!("Solving {} = {}", problem.expression, problem.answer);
        data = send(
            controller,
            vec![
                Event::of(EventType::DisplayedProblem, problem.id.to_string()),
                Event::of(EventType::WorkingOnProblem, "20"),
                Event::of(EventType::AnsweredProblem, problem.answer),
            ],
        )?;
    }

    info!("Target reached, watching reward video");
    send(
        controller,
        vec![
            Event::of(EventType::WatchingVideo, "120"),
            Event::of(
                EventType::DoneWatchingVideo,
                data.gamestate.video_id.unwrap_or_default().to_string(),
            ),
        ],
    )?;

    info!(
        "=== Demo Complete: {} events, {} problems stored ===",
        controller.store().events().len(),
        controller.store().problem_count()
    );
    if let Some(id) = data.gamestate.problem_id {
        if let Some(problem) = controller.store().get_problem(id)? {
            info!("Last problem: {} (difficulty {:.2})", problem.expression, problem.difficulty);
        }
    }
    Ok(())
}

fn send(controller: &mut GamestateController<MemoryStore>, events: Vec<Event>) -> Result<PlayData> {
    let data = controller
        .process_events(DEMO_USER, &events, true)?
        .context("response requested but not returned")?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(data)
}
