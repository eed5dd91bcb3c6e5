/*
[INPUT]:  Transport events applied by the connection manager
[OUTPUT]: Lifecycle state and the status string shown to the user
[POS]:    State layer - connection state machine (no I/O)
[UPDATE]: When adding states or changing status wording
*/

use std::fmt;

/// Lifecycle of the current connection handle.
///
/// `Disconnected` and `Failed` are absorbing for the handle: only
/// `deactivate` (to `Idle`) or a fresh `activate` leaves them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

impl ConnectionState {
    /// A handle exists and may still reach or hold `Connected`.
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Failed)
    }
}

/// Status text derived from the most recent transport event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
    Error(String),
    Closed(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => f.write_str("Disconnected"),
            ConnectionStatus::Connected => f.write_str("Connected"),
            ConnectionStatus::Error(reason) => write!(f, "Error: {reason}"),
            ConnectionStatus::Closed(reason) => write!(f, "Disconnected: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ConnectionStatus::Disconnected, "Disconnected")]
    #[case(ConnectionStatus::Connected, "Connected")]
    #[case(ConnectionStatus::Error("timeout".to_string()), "Error: timeout")]
    #[case(
        ConnectionStatus::Closed("transport close".to_string()),
        "Disconnected: transport close"
    )]
    fn test_status_display(#[case] status: ConnectionStatus, #[case] expected: &str) {
        assert_eq!(status.to_string(), expected);
    }

    #[test]
    fn test_state_classification() {
        assert!(!ConnectionState::Idle.is_live());
        assert!(ConnectionState::Connecting.is_live());
        assert!(ConnectionState::Connected.is_live());
        assert!(ConnectionState::Disconnected.is_terminal());
        assert!(ConnectionState::Failed.is_terminal());
        assert!(!ConnectionState::Connected.is_terminal());
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
    }
}
