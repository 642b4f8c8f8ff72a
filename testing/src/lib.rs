//! # Naviera Testing
//!
//! Helpers for testing reducers without a running store:
//!
//! - [`FixedClock`] / [`test_clock`]: deterministic time
//! - [`ReducerTest`]: Given-When-Then builder for a single reduction
//! - [`drain`] / [`settle`]: execute effects in-process and collect what they produce
//!
//! ```ignore
//! let actions = settle(&reducer, &mut state, Action::Confirm { .. }, &env).await;
//! assert!(matches!(actions.last(), Some(Action::Confirmed { .. })));
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use naviera_core::environment::Clock;

mod effects;

pub use effects::{drain, settle};
pub use reducer_test::{assertions, ReducerTest};

/// Mock implementations of environment traits
pub mod mocks {
    use super::{Clock, DateTime, NaiveDate, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// ```
    /// use naviera_testing::mocks::FixedClock;
    /// use naviera_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }

        /// A clock fixed at midnight UTC of `date`
        #[must_use]
        pub fn at_date(date: NaiveDate) -> Self {
            Self::new(date.and_time(chrono::NaiveTime::MIN).and_utc())
        }

        /// A copy of this clock moved forward by `by`
        #[must_use]
        pub fn advanced(&self, by: chrono::Duration) -> Self {
            Self::new(self.time + by)
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot happen.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

pub use mocks::{test_clock, FixedClock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_stable() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.today().to_string(), "2025-01-01");
    }

    #[test]
    fn advanced_clock_moves_forward() {
        let clock = test_clock().advanced(chrono::Duration::days(2));
        assert_eq!(clock.today().to_string(), "2025-01-03");
    }
}
