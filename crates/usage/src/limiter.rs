//! Single sliding-window-fixed counter and the nine-dimension key space.

use serde::Serialize;

/// One of the nine `(resource, window)` combinations a provider can be
/// limited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimiterKind {
    RequestsPerMinute,
    RequestsPerHour,
    RequestsPerDay,
    TokensPerMinute,
    TokensPerHour,
    TokensPerDay,
    CostPerMinute,
    CostPerHour,
    CostPerDay,
}

impl LimiterKind {
    pub const ALL: [LimiterKind; 9] = [
        LimiterKind::RequestsPerMinute,
        LimiterKind::RequestsPerHour,
        LimiterKind::RequestsPerDay,
        LimiterKind::TokensPerMinute,
        LimiterKind::TokensPerHour,
        LimiterKind::TokensPerDay,
        LimiterKind::CostPerMinute,
        LimiterKind::CostPerHour,
        LimiterKind::CostPerDay,
    ];

    pub fn duration_secs(&self) -> u64 {
        match self {
            LimiterKind::RequestsPerMinute
            | LimiterKind::TokensPerMinute
            | LimiterKind::CostPerMinute => 60,
            LimiterKind::RequestsPerHour | LimiterKind::TokensPerHour | LimiterKind::CostPerHour => {
                3_600
            }
            LimiterKind::RequestsPerDay | LimiterKind::TokensPerDay | LimiterKind::CostPerDay => {
                86_400
            }
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(
            self,
            LimiterKind::RequestsPerMinute | LimiterKind::RequestsPerHour | LimiterKind::RequestsPerDay
        )
    }

    pub fn is_token(&self) -> bool {
        matches!(
            self,
            LimiterKind::TokensPerMinute | LimiterKind::TokensPerHour | LimiterKind::TokensPerDay
        )
    }

    pub fn is_cost(&self) -> bool {
        matches!(
            self,
            LimiterKind::CostPerMinute | LimiterKind::CostPerHour | LimiterKind::CostPerDay
        )
    }

    /// Pull the configured points (capacity) for this dimension out of a
    /// `Limits` record, if the dimension is configured at all.
    pub fn points_from(&self, limits: &gw_domain::config::Limits) -> Option<u64> {
        match self {
            LimiterKind::RequestsPerMinute => limits.requests_per_minute,
            LimiterKind::RequestsPerHour => limits.requests_per_hour,
            LimiterKind::RequestsPerDay => limits.requests_per_day,
            LimiterKind::TokensPerMinute => limits.tokens_per_minute,
            LimiterKind::TokensPerHour => limits.tokens_per_hour,
            LimiterKind::TokensPerDay => limits.tokens_per_day,
            // Cost limits are configured in USD; stored capacity is in
            // integer points, 1 USD = 10_000 points.
            LimiterKind::CostPerMinute => limits.cost_per_minute.map(usd_to_points),
            LimiterKind::CostPerHour => limits.cost_per_hour.map(usd_to_points),
            LimiterKind::CostPerDay => limits.cost_per_day.map(usd_to_points),
        }
    }
}

/// `1 USD = 10_000 points`, preserving four decimal places.
pub fn usd_to_points(usd: f64) -> u64 {
    (usd * 10_000.0).round().max(0.0) as u64
}

/// `(points, duration, consumed, windowStart)` — a single counter.
#[derive(Debug, Clone, Copy)]
pub struct LimiterState {
    pub points: u64,
    pub duration_secs: u64,
    pub consumed: u64,
    pub window_start_epoch: i64,
}

impl LimiterState {
    pub fn new(points: u64, duration_secs: u64, now: i64) -> Self {
        Self {
            points,
            duration_secs,
            consumed: 0,
            window_start_epoch: now,
        }
    }

    /// Advance the window if it has expired. Step 1 of the window
    /// semantics shared by `is_under` and `consume`.
    fn roll_window(&mut self, now: i64) {
        if now - self.window_start_epoch >= self.duration_secs as i64 {
            self.consumed = 0;
            self.window_start_epoch = now;
        }
    }

    /// Peek: rolls the window, then reports whether capacity remains.
    pub fn is_under(&mut self, now: i64) -> bool {
        self.roll_window(now);
        self.consumed < self.points
    }

    /// Atomically increment by `n`. Always succeeds (post-hoc enforcement);
    /// returns `true` if this increment pushed `consumed` past `points` so
    /// the caller can log an overshoot.
    pub fn consume(&mut self, now: i64, n: u64) -> bool {
        self.roll_window(now);
        self.consumed += n;
        self.consumed > self.points
    }

    /// Same `(points, duration)` identity — used by reload reconciliation
    /// to decide whether to preserve a limiter's running counters.
    pub fn same_identity(&self, points: u64, duration_secs: u64) -> bool {
        self.points == points && self.duration_secs == duration_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_limiter_is_under() {
        let mut l = LimiterState::new(10, 60, 1_000);
        assert!(l.is_under(1_000));
    }

    #[test]
    fn consume_to_capacity_then_over() {
        let mut l = LimiterState::new(2, 60, 1_000);
        assert!(!l.consume(1_000, 1));
        assert!(!l.consume(1_000, 1));
        assert!(!l.is_under(1_000));
        assert!(l.consume(1_000, 1)); // overshoot, still recorded
        assert_eq!(l.consumed, 3);
    }

    #[test]
    fn window_rolls_over_after_duration() {
        let mut l = LimiterState::new(1, 60, 1_000);
        l.consume(1_000, 1);
        assert!(!l.is_under(1_000));
        assert!(l.is_under(1_060)); // window rolled, reset to 0 consumed
    }

    #[test]
    fn usd_to_points_preserves_four_decimals() {
        assert_eq!(usd_to_points(1.0), 10_000);
        assert_eq!(usd_to_points(0.1234), 1_234);
    }

    #[test]
    fn same_identity_checks_points_and_duration() {
        let l = LimiterState::new(10, 60, 0);
        assert!(l.same_identity(10, 60));
        assert!(!l.same_identity(10, 3_600));
        assert!(!l.same_identity(20, 60));
    }
}
