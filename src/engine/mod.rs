//! Workout session engine: lifecycle, state machine, completion gate and the
//! handle that ties them to storage.

pub mod gate;
pub mod host;
pub mod lifecycle;
pub mod machine;

pub use gate::{BlockReason, CompletionVerdict};
pub use host::{
    CompletionOutcome, EngineContext, EngineSettings, Notice, RestView, SharedEngine, TickHandle,
    WorkoutEngine, spawn_ticker,
};
pub use lifecycle::{Initialized, LifecycleManager};
pub use machine::{Effect, EngineState, Event, RestPolicy};
