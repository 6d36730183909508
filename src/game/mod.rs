//! Gamestate Controller
//!
//! Event-driven state machine over per-user progression state. Everything
//! here is synchronous; storage is reached through the traits in `store`.
//!
//! ## Module Structure
//!
//! - `events`: event log rows, event types, parsed actions
//! - `state`: Gamestate, Settings, Problem, Video, PlayData
//! - `store`: collaborator traits and StoreError
//! - `memory`: in-memory backend
//! - `adaptive`: work-ratio driven difficulty step
//! - `config`: ControllerConfig
//! - `controller`: process_events

pub mod events;
pub mod state;
pub mod store;
pub mod memory;
pub mod adaptive;
pub mod config;
pub mod controller;

// Re-export key types
pub use events::{Event, EventAction, EventError, EventType};
pub use state::{Gamestate, PlayData, Problem, ProblemType, Settings, UserId, Video, VideoId};
pub use store::{Backend, StoreError, WorkTotals};
pub use memory::MemoryStore;
pub use adaptive::{adjust, AdaptiveLimits, Adjustment};
pub use config::ControllerConfig;
pub use controller::{ControllerError, GamestateController};
