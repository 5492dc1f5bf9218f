//! Quota arithmetic shared by the ledger implementations.
//!
//! An account has a monthly call limit (`None` = unlimited), a count of
//! calls already committed this cycle, and a count of calls reserved by
//! renders that are still in flight. A new render is admitted only while
//! `used + reserved < limit`.

use serde::Serialize;

use crate::error::CoreError;

/// Current consumption reported back to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub used: i64,
    pub limit: Option<i64>,
}

impl Usage {
    pub fn new(used: i64, limit: Option<i64>) -> Self {
        Self { used, limit }
    }

    /// Calls left in the cycle, `None` when unlimited.
    pub fn remaining(&self) -> Option<i64> {
        self.limit.map(|limit| (limit - self.used).max(0))
    }

    /// The error returned to a caller denied by this usage while
    /// `in_flight` reserved calls are still rendering.
    pub fn to_rate_limited(self, in_flight: i64) -> CoreError {
        CoreError::RateLimited {
            used: self.used,
            limit: self.limit,
            in_flight,
        }
    }
}

/// Whether one more call may be reserved.
pub fn has_capacity(used: i64, reserved: i64, limit: Option<i64>) -> bool {
    match limit {
        None => true,
        Some(limit) => used.saturating_add(reserved) < limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_always_has_capacity() {
        assert!(has_capacity(1_000_000, 50, None));
    }

    #[test]
    fn reservations_count_against_the_limit() {
        assert!(has_capacity(9, 0, Some(10)));
        assert!(!has_capacity(9, 1, Some(10)));
        assert!(!has_capacity(10, 0, Some(10)));
    }

    #[test]
    fn zero_limit_denies_everything() {
        assert!(!has_capacity(0, 0, Some(0)));
    }

    #[test]
    fn rate_limited_carries_in_flight_calls() {
        let err = Usage::new(0, Some(1)).to_rate_limited(1);
        assert!(matches!(
            err,
            CoreError::RateLimited { used: 0, limit: Some(1), in_flight: 1 }
        ));
    }

    #[test]
    fn remaining_never_negative() {
        assert_eq!(Usage::new(12, Some(10)).remaining(), Some(0));
        assert_eq!(Usage::new(3, Some(10)).remaining(), Some(7));
        assert_eq!(Usage::new(3, None).remaining(), None);
    }
}
