pub mod progress_counter;
pub mod stage_gate;
pub mod unit_ctx;
pub mod unit_worker;

pub use progress_counter::ProgressCounter;
pub use stage_gate::{StageGate, TransitionDecision};
pub use unit_ctx::UnitCtx;
pub use unit_worker::{CompletionCallback, UnitCompute, UnitWorker, WorkerOutcome};
