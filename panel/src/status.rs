//! Single status value for the presentation layer.

use serde::Serialize;

use crate::{container::ContainerState, session::SessionStatus};

/// Combined connection and container status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Overview {
    pub connection: SessionStatus,
    pub container: ContainerState,
}

impl Overview {
    #[must_use]
    pub const fn new(connection: SessionStatus, container: ContainerState) -> Self {
        Self {
            connection,
            container,
        }
    }

    /// The session is connected but the managed container is known to be down,
    /// so the next query will most likely fail.
    #[must_use]
    pub const fn stale(&self) -> bool {
        matches!(self.connection, SessionStatus::Connected)
            && matches!(
                self.container,
                ContainerState::Absent | ContainerState::Stopped
            )
    }
}
