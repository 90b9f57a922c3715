//! Script runs: launch, output queue, registry and cancellation.

pub mod cancel;
pub mod launcher;
pub mod manager;
pub mod queue;
pub mod record;
pub mod registry;
pub mod resolver;

pub use cancel::StopOutcome;
pub use manager::{RunManager, RunSettings, StartRun};
pub use queue::Received;
pub use record::{ProcessState, RunRecord, RunSnapshot};
pub use registry::RunRegistry;
pub use resolver::ScriptResolver;
