//! Choosing which levels to export.

use std::ops::RangeInclusive;

use tracing::debug;

use super::FetchError;
use crate::api::User;

/// Levels `1..=max` whose vocabulary is exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRange {
    max: u32,
}

impl LevelRange {
    /// Levels one through `max`. Returns `None` when `max` is zero.
    #[must_use]
    pub fn up_to(max: u32) -> Option<Self> {
        (max > 0).then_some(Self { max })
    }

    /// Highest exported level.
    #[must_use]
    pub fn max(self) -> u32 {
        self.max
    }

    #[must_use]
    pub fn levels(self) -> RangeInclusive<u32> {
        1..=self.max
    }

    /// Comma-separated list for the `levels` query parameter.
    ///
    /// ```
    /// use wanikani_deck_core::fetch::LevelRange;
    ///
    /// let range = LevelRange::up_to(3).unwrap();
    /// assert_eq!(range.to_query_value(), "1,2,3");
    /// ```
    #[must_use]
    pub fn to_query_value(self) -> String {
        self.levels()
            .map(|level| level.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Works out the export range for `user`.
///
/// Only completed levels (below the current one) are exported unless
/// `include_in_progress` is set. Either way the range never exceeds what the
/// subscription grants.
///
/// # Errors
///
/// Returns `FetchError::NoCompletedLevels` when nothing is completed and the
/// in-progress level was not opted into, and `FetchError::NoLevelsGranted`
/// when the subscription grants no levels.
pub fn export_levels(user: &User, include_in_progress: bool) -> Result<LevelRange, FetchError> {
    let granted = user.subscription.max_level_granted;

    let wanted = if include_in_progress {
        user.level
    } else {
        let completed = user.level.saturating_sub(1);
        if completed == 0 {
            return Err(FetchError::NoCompletedLevels {
                current_level: user.level,
            });
        }
        completed
    };

    let max = wanted.min(granted);
    debug!(
        current_level = user.level,
        granted, include_in_progress, max, "resolved export levels"
    );
    LevelRange::up_to(max).ok_or(FetchError::NoLevelsGranted)
}
