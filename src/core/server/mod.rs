pub mod backup;
pub mod control;
pub mod lifecycle;

pub use control::{ControlChannel, ScreenChannel, ServerCommand};
pub use lifecycle::{
    BackupOutcome, LifecycleSettings, LifecycleState, ServerController, STOP_POLL_INTERVAL,
    STOP_POLL_TICKS,
};
