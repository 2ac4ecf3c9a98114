//! Normalizes raw driver output into the canonical field set.
//!
//! The one non-obvious step lives here: the driver's `open` window is
//! cumulative (the platform resolver runs again inside the connect call),
//! so the isolated `handshake` figure is `open - dns`. That subtraction is
//! applied exactly once, in this module, and nowhere in the driver.

use std::time::Duration;

use crate::http::handler::RawTrace;
use crate::result::res::TraceResult;

/// Whole milliseconds, rounded to nearest.
pub(crate) fn round_ms(d: Duration) -> i64 {
    (d.as_secs_f64() * 1000.0).round() as i64
}

/// Pure and idempotent: identical raw input yields an identical result.
///
/// A negative `handshake` is possible when the in-connect lookup was
/// answered faster than the measured one (resolver caching); it is kept
/// as-is unless `floor_negative_handshake` is set.
pub(crate) fn aggregate(raw: &RawTrace, floor_negative_handshake: bool) -> TraceResult {
    let t = &raw.timings;

    let dns = t.dns_duration().map(round_ms).unwrap_or(0);
    let mut handshake = t.open_duration().map(|open| round_ms(open) - dns).unwrap_or(0);
    if floor_negative_handshake && handshake < 0 {
        handshake = 0;
    }

    TraceResult {
        status_code: raw.status_code,
        dns,
        handshake,
        connect: t.tcp_connect_duration().map(round_ms).unwrap_or(0),
        first_byte: t.first_byte_duration().map(round_ms).unwrap_or(0),
        total: t.total_duration().map(round_ms).unwrap_or(0),
        body_length: raw.body_length,
        headers_length: raw.headers_length,
        ip: raw.ip.clone(),
        redirects: round_ms(t.redirects),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::PhaseTimings;
    use std::time::Instant;

    fn raw_with_windows(dns_ms: u64, open_ms: u64) -> RawTrace {
        let base = Instant::now();
        let mut timings = PhaseTimings::new();
        timings.dns_start = Some(base);
        timings.dns_end = Some(base + Duration::from_millis(dns_ms));
        timings.open_start = Some(base);
        timings.open_end = Some(base + Duration::from_millis(open_ms));
        RawTrace {
            timings,
            status_code: 200,
            ..Default::default()
        }
    }

    #[test]
    fn dns_share_is_subtracted_from_the_open_window() {
        let raw = raw_with_windows(30, 100);
        let result = aggregate(&raw, false);
        assert_eq!(result.dns(), 30);
        assert_eq!(result.handshake(), 70);
    }

    #[test]
    fn negative_handshake_is_kept_by_default() {
        let raw = raw_with_windows(50, 20);
        assert_eq!(aggregate(&raw, false).handshake(), -30);
    }

    #[test]
    fn negative_handshake_floors_at_zero_when_asked() {
        let raw = raw_with_windows(50, 20);
        assert_eq!(aggregate(&raw, true).handshake(), 0);
    }

    #[test]
    fn aggregate_is_idempotent() {
        let mut raw = raw_with_windows(10, 45);
        raw.ip = Some("10.0.0.1".to_string());
        raw.body_length = 1024;
        raw.headers_length = 200;
        assert_eq!(aggregate(&raw, false), aggregate(&raw, false));
    }

    #[test]
    fn missing_windows_default_to_zero() {
        let raw = RawTrace::default();
        let result = aggregate(&raw, false);
        assert_eq!(result.dns(), 0);
        assert_eq!(result.handshake(), 0);
        assert_eq!(result.connect(), 0);
        assert_eq!(result.first_byte(), 0);
        assert_eq!(result.total(), 0);
        assert_eq!(result.redirects(), 0);
        assert_eq!(result.status_code(), 0);
        assert!(result.ip().is_none());
    }

    #[test]
    fn durations_round_to_nearest_millisecond() {
        assert_eq!(round_ms(Duration::from_micros(1499)), 1);
        assert_eq!(round_ms(Duration::from_micros(1500)), 2);
        assert_eq!(round_ms(Duration::ZERO), 0);
    }
}
