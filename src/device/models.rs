use serde::{Deserialize, Serialize};

/// Link state as seen by the polling loop
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// What one call to [`super::ReconnectController::tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A values report with `count` numbers was applied.
    Updated { count: usize },
    /// The pad did not answer within the read timeout.
    Silent,
    /// The link failed during this tick.
    Disconnected,
    /// The port was reopened and thresholds resynchronized.
    Reconnected,
    /// The reopen attempt failed; try again next tick.
    StillDisconnected,
}

impl TickOutcome {
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            TickOutcome::Updated { .. } | TickOutcome::Silent | TickOutcome::Reconnected
        )
    }
}
