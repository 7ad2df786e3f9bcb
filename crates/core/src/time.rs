use chrono::{DateTime, Duration, Utc};

/// Wall clock used for submission timestamps.
///
/// Countdown ticking never reads this clock; it only stamps `submitted_at`.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn system() -> Self {
        Self::System
    }

    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Moves a fixed clock forward. Has no effect on the system clock.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Converts an exam time limit to seconds, saturating on overflow.
#[must_use]
pub fn minutes_to_seconds(minutes: u32) -> u32 {
    minutes.saturating_mul(60)
}

/// Formats a countdown for display: `H:MM:SS` from one hour up, `M:SS` below.
///
/// ```
/// use exam_core::time::format_display;
///
/// assert_eq!(format_display(3_599), "59:59");
/// assert_eq!(format_display(3_600), "1:00:00");
/// ```
#[must_use]
pub fn format_display(seconds: u32) -> String {
    let hours = seconds / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Deterministic timestamp for tests (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_short_and_long_durations() {
        assert_eq!(format_display(0), "0:00");
        assert_eq!(format_display(59), "0:59");
        assert_eq!(format_display(61), "1:01");
        assert_eq!(format_display(3_661), "1:01:01");
        assert_eq!(format_display(36_000), "10:00:00");
    }

    #[test]
    fn minutes_saturate() {
        assert_eq!(minutes_to_seconds(60), 3_600);
        assert_eq!(minutes_to_seconds(u32::MAX), u32::MAX);
    }

    #[test]
    fn fixed_clock_advances() {
        let mut clock = Clock::fixed(fixed_now());
        clock.advance(Duration::seconds(5));
        assert_eq!(clock.now(), fixed_now() + Duration::seconds(5));
    }
}
