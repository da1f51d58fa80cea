mod control;
mod state;

pub use control::{AutoConnect, ControlError, ControlPanel, StartOutcome};
pub(crate) use state::{AppState, initialize_state};
