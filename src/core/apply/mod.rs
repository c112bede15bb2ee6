pub mod confirm;
pub mod fs;
pub mod orchestrator;

pub use confirm::{AutoConfirm, Confirm, TerminalConfirm};
pub use orchestrator::{ApplyOrchestrator, ApplyReport, ApplySettings};
