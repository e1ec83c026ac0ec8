pub mod mode;

pub use mode::{
    resolve_requested_mode, should_commit, CommitDecision, CommitReason, DisplayMode,
    DisplayModeConfig, DisplayModeController, ModeTrigger,
};
