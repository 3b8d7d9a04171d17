//! Client-side token expiry polling.
//!
//! The monitor never asks the server whether the token is still accepted; it
//! only re-reads the token's own `exp` claim on a fixed interval. Its single
//! timer lives in `next_check` and disappears with the monitor.

use std::time::{Duration, Instant};

use crate::session::Session;
use crate::token::decode_claims;

/// How often the token's expiry is re-checked.
pub const EXPIRY_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorVerdict {
    /// Nothing due, or the token is still valid.
    Valid,
    /// The token expired or stopped decoding. Reported once; the monitor is
    /// cancelled afterwards.
    Expired,
}

#[derive(Debug, Clone)]
pub struct ExpiryMonitor {
    next_check: Option<Instant>,
}

impl ExpiryMonitor {
    /// Start polling for `session`. Returns `None` when its token does not
    /// decode, in which case the caller must log out instead.
    pub fn start(session: &Session, now: Instant) -> Option<Self> {
        decode_claims(session.token())?;
        Some(Self {
            next_check: Some(now + EXPIRY_POLL_INTERVAL),
        })
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_check
    }

    pub fn is_cancelled(&self) -> bool {
        self.next_check.is_none()
    }

    pub fn cancel(&mut self) {
        self.next_check = None;
    }

    /// Run the check if it is due.
    pub fn poll(&mut self, token: &str, now: Instant, unix_now: i64) -> MonitorVerdict {
        let Some(due) = self.next_check else {
            return MonitorVerdict::Valid;
        };
        if now < due {
            return MonitorVerdict::Valid;
        }

        let expired = decode_claims(token).map_or(true, |claims| claims.is_expired_at(unix_now));
        if expired {
            tracing::debug!(unix_now, "session token expired");
            self.cancel();
            return MonitorVerdict::Expired;
        }

        // Skip ticks missed while the host was asleep.
        let mut next = due + EXPIRY_POLL_INTERVAL;
        while next <= now {
            next += EXPIRY_POLL_INTERVAL;
        }
        self.next_check = Some(next);
        MonitorVerdict::Valid
    }
}
