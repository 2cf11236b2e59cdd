//! # Utilities Module
//!
//! Helpers for money rounding, business-local time and referral codes.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};

/// Length of generated referral codes.
pub const REFERRAL_CODE_LEN: usize = 8;

/// Round a money amount to 2 decimal places, midpoint away from zero.
///
/// ## Examples
///
/// ```rust,ignore
/// assert_eq!(round_money(dec!(12.345)), dec!(12.35));
/// ```
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an INR amount for logs and descriptions, e.g. "₹1234.50".
pub fn format_inr(amount: Decimal) -> String {
    format!("₹{:.2}", amount)
}

/// Parse a UTC offset like `+05:30`, `-04:00` or `Z`.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, String> {
    let raw = match raw.trim() {
        "Z" | "UTC" => "+00:00",
        other => other,
    };
    raw.parse::<FixedOffset>()
        .map_err(|e| format!("Invalid UTC offset {}: {}", raw, e))
}

/// Parse an `HH:MM` wall-clock time into minutes since midnight.
pub fn parse_hhmm(raw: &str) -> Option<u32> {
    let (hours, minutes) = raw.trim().split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Minutes since local midnight, seconds truncated.
pub fn minutes_since_midnight(local: &DateTime<FixedOffset>) -> u32 {
    local.hour() * 60 + local.minute()
}

/// Day of week with Sunday = 0 .. Saturday = 6.
pub fn day_of_week(local: &DateTime<FixedOffset>) -> i32 {
    local.weekday().num_days_from_sunday() as i32
}

/// Convert a UTC instant to business-local time.
pub fn to_local(instant: DateTime<Utc>, offset: FixedOffset) -> DateTime<FixedOffset> {
    instant.with_timezone(&offset)
}

/// Generate a random uppercase alphanumeric referral code.
pub fn generate_referral_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFERRAL_CODE_LEN)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money() {
        assert_eq!(round_money(dec!(12.345)), dec!(12.35));
        assert_eq!(round_money(dec!(12.344)), dec!(12.34));
        assert_eq!(round_money(dec!(0.005)), dec!(0.01));
        assert_eq!(round_money(dec!(100)), dec!(100));
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("+05:30").unwrap().local_minus_utc(), 19_800);
        assert_eq!(parse_utc_offset("-04:00").unwrap().local_minus_utc(), -14_400);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("05:30").is_err());
        assert!(parse_utc_offset("+25:00").is_err());
        assert!(parse_utc_offset("IST").is_err());
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("08:30"), Some(510));
        assert_eq!(parse_hhmm("00:00"), Some(0));
        assert_eq!(parse_hhmm("23:59"), Some(1439));
        assert_eq!(parse_hhmm("24:00"), None);
        assert_eq!(parse_hhmm("8:30"), None);
        assert_eq!(parse_hhmm("08-30"), None);
    }

    #[test]
    fn test_local_calendar_helpers() {
        let offset = parse_utc_offset("+05:30").unwrap();
        // Saturday 2024-06-01 20:00 UTC is Sunday 01:30 in IST
        let instant = Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap();
        let local = to_local(instant, offset);
        assert_eq!(day_of_week(&local), 0);
        assert_eq!(minutes_since_midnight(&local), 90);
    }

    #[test]
    fn test_generate_referral_code() {
        let code = generate_referral_code();
        assert_eq!(code.len(), REFERRAL_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
