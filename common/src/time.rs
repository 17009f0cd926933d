//! Time utilities and timing defaults for Folio.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Timing defaults.
pub mod constants {
    use super::Duration;

    /// Exchange-rate snapshot time-to-live (5 minutes).
    pub const RATE_TTL: Duration = Duration::from_secs(5 * 60);

    /// Idle time before automatic logout (30 minutes).
    pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

    /// Timeout applied to each exchange-rate HTTP request (10 seconds).
    pub const RATE_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
}

/// A wall-clock timestamp (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Parse a duration given in whole seconds, as used by `FOLIO_*` variables.
pub fn parse_secs(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_secs() {
        assert_eq!(parse_secs("300"), Some(Duration::from_secs(300)));
        assert_eq!(parse_secs(" 20 "), Some(Duration::from_secs(20)));
        assert_eq!(parse_secs("five"), None);
        assert_eq!(parse_secs("-1"), None);
    }
}
