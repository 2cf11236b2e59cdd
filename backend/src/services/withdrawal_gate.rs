//! # Withdrawal Gate
//!
//! Decides whether a withdrawal may be requested right now, before any
//! balance is looked at.
//!
//! ```text
//! config for today's weekday missing or inactive -> "day not active"
//! user level not in allowed_levels               -> "level not allowed"
//! local time outside [start_time, end_time]      -> "outside withdrawal window"
//! ```
//!
//! Both ends of the window are inclusive at minute resolution: with
//! `08:30-17:00`, 08:29 is denied, 08:30 and 17:00 are allowed, 17:01 is
//! denied.

use chrono::{DateTime, FixedOffset};

use crate::db::WithdrawalConfigRecord;
use crate::utils::{minutes_since_midnight, parse_hhmm};

pub const REASON_DAY_NOT_ACTIVE: &str = "day not active";
pub const REASON_LEVEL_NOT_ALLOWED: &str = "level not allowed";
pub const REASON_OUTSIDE_WINDOW: &str = "outside withdrawal window";

/// Gate outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Denied(&'static str),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed)
    }

    pub fn reason(&self) -> Option<&'static str> {
        match self {
            GateDecision::Allowed => None,
            GateDecision::Denied(reason) => Some(reason),
        }
    }
}

/// Evaluate the gate for a user at business-local time `local_now`.
///
/// `config` is the row for `local_now`'s weekday. A config whose times do
/// not parse is treated as inactive.
pub fn evaluate(
    config: Option<&WithdrawalConfigRecord>,
    level_number: Option<i32>,
    local_now: &DateTime<FixedOffset>,
) -> GateDecision {
    let Some(config) = config.filter(|c| c.is_active) else {
        return GateDecision::Denied(REASON_DAY_NOT_ACTIVE);
    };

    let level_allowed = level_number
        .map(|level| config.allowed_levels.contains(&level))
        .unwrap_or(false);
    if !level_allowed {
        return GateDecision::Denied(REASON_LEVEL_NOT_ALLOWED);
    }

    let (Some(start), Some(end)) = (parse_hhmm(&config.start_time), parse_hhmm(&config.end_time)) else {
        return GateDecision::Denied(REASON_DAY_NOT_ACTIVE);
    };

    let current = minutes_since_midnight(local_now);
    if current < start || current > end {
        return GateDecision::Denied(REASON_OUTSIDE_WINDOW);
    }

    GateDecision::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn config(active: bool, levels: Vec<i32>) -> WithdrawalConfigRecord {
        WithdrawalConfigRecord {
            day_of_week: 1,
            allowed_levels: levels,
            is_active: active,
            start_time: "08:30".to_string(),
            end_time: "17:00".to_string(),
            updated_at: Utc::now(),
        }
    }

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(19_800)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 10, hour, minute, second)
            .unwrap()
    }

    #[test]
    fn test_window_boundaries() {
        let cfg = config(true, vec![1, 2]);
        assert_eq!(evaluate(Some(&cfg), Some(1), &at(8, 29, 59)), GateDecision::Denied(REASON_OUTSIDE_WINDOW));
        assert_eq!(evaluate(Some(&cfg), Some(1), &at(8, 30, 0)), GateDecision::Allowed);
        assert_eq!(evaluate(Some(&cfg), Some(1), &at(17, 0, 59)), GateDecision::Allowed);
        assert_eq!(evaluate(Some(&cfg), Some(1), &at(17, 1, 0)), GateDecision::Denied(REASON_OUTSIDE_WINDOW));
    }

    #[test]
    fn test_missing_or_inactive_day() {
        assert_eq!(evaluate(None, Some(1), &at(12, 0, 0)).reason(), Some(REASON_DAY_NOT_ACTIVE));
        let inactive = config(false, vec![1]);
        assert_eq!(evaluate(Some(&inactive), Some(1), &at(12, 0, 0)).reason(), Some(REASON_DAY_NOT_ACTIVE));
    }

    #[test]
    fn test_level_allowlist() {
        let cfg = config(true, vec![2, 3]);
        assert_eq!(evaluate(Some(&cfg), Some(1), &at(12, 0, 0)).reason(), Some(REASON_LEVEL_NOT_ALLOWED));
        assert_eq!(evaluate(Some(&cfg), None, &at(12, 0, 0)).reason(), Some(REASON_LEVEL_NOT_ALLOWED));
        assert!(evaluate(Some(&cfg), Some(3), &at(12, 0, 0)).is_allowed());
    }

    #[test]
    fn test_unparseable_times_deny() {
        let mut cfg = config(true, vec![1]);
        cfg.end_time = "5pm".to_string();
        assert!(!evaluate(Some(&cfg), Some(1), &at(12, 0, 0)).is_allowed());
    }
}
