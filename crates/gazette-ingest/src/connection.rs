//! Connection lifecycle and reconnect policy

use std::fmt;
use std::time::Duration;

/// `Disconnected -> Connecting -> Subscribed -> Disconnected -> ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Subscribed,
}

impl ConnectionState {
    /// Whether moving to `next` is a legal transition
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Subscribed)
                | (Connecting, Disconnected)
                | (Subscribed, Disconnected)
        )
    }

    pub fn is_subscribed(self) -> bool {
        self == ConnectionState::Subscribed
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Subscribed => "subscribed",
        };
        f.write_str(s)
    }
}

/// Fixed-delay, unbounded retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// Delay before the given retry; the same for every attempt
    pub fn delay_for(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn test_lifecycle_transitions() {
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Subscribed));
        assert!(Connecting.can_transition_to(Disconnected));
        assert!(Subscribed.can_transition_to(Disconnected));

        assert!(!Disconnected.can_transition_to(Subscribed));
        assert!(!Subscribed.can_transition_to(Connecting));
        assert!(!Subscribed.can_transition_to(Subscribed));
    }

    #[test]
    fn test_default_state() {
        assert_eq!(ConnectionState::default(), Disconnected);
        assert_eq!(Subscribed.to_string(), "subscribed");
        assert!(Subscribed.is_subscribed());
    }

    #[test]
    fn test_fixed_delay() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for(1000), Duration::from_secs(5));
    }
}
