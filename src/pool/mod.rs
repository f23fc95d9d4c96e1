/// Executor, dispatcher and worker loop
pub mod executor;
/// Per-run failure counter and cancellation signal
pub mod state;
/// Task, configuration and report types
pub mod types;

pub use executor::*;
pub use state::RunState;
pub use types::*;
