//! Orchestration loop: model turns, tool rounds and their event stream.

pub mod context;
pub mod engine;
pub mod events;
pub mod executor;

pub use context::OrchestrationContext;
pub use engine::{LoopSettings, Orchestrator, RunOutcome};
pub use events::{EventSink, OrchestratorEvent};
pub use executor::ToolExecutor;
