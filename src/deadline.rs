//! Cooperative per-entry time limit.

use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("conversion exceeded the time limit of {}ms", .limit.as_millis())]
pub struct DeadlineExceeded {
    pub limit: Duration,
}

/// Checked by long-running stages between units of work. A deadline without a
/// limit never expires.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    limit: Option<(Instant, Duration)>,
}

impl Deadline {
    pub fn start(limit: Option<Duration>) -> Self {
        Self {
            limit: limit.map(|limit| (Instant::now(), limit)),
        }
    }

    pub fn unlimited() -> Self {
        Self { limit: None }
    }

    pub fn check(&self) -> Result<(), DeadlineExceeded> {
        match self.limit {
            Some((started, limit)) if started.elapsed() >= limit => {
                Err(DeadlineExceeded { limit })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limit_expires_immediately() {
        assert!(Deadline::start(Some(Duration::ZERO)).check().is_err());
        assert!(Deadline::unlimited().check().is_ok());
        assert!(Deadline::start(Some(Duration::from_secs(3600))).check().is_ok());
    }
}
