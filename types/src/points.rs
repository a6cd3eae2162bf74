//! Point amounts and balances.
//!
//! [`Points`] is a strictly positive amount (habit values, reward costs);
//! [`Score`] is a non-negative balance. Keeping them separate makes "a
//! reward that costs zero" and "a negative balance" unrepresentable rather
//! than merely validated.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("point amount must be a positive integer")]
pub struct PointsError;

/// A strictly positive point amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Points(NonZeroU32);

impl Points {
    pub fn new(value: u32) -> Result<Self, PointsError> {
        NonZeroU32::new(value).map(Self).ok_or(PointsError)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<u32> for Points {
    type Error = PointsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::fmt::Display for Points {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A non-negative point balance.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Score(u32);

impl Score {
    pub const ZERO: Score = Score(0);

    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Add `amount` to the balance.
    #[must_use]
    pub fn credit(self, amount: Points) -> Self {
        Self(self.0.saturating_add(amount.get()))
    }

    /// Subtract `amount`, or `None` when the balance cannot cover it.
    ///
    /// The caller decides what insufficiency means; the balance itself
    /// never goes negative or wraps.
    #[must_use]
    pub fn checked_debit(self, amount: Points) -> Option<Self> {
        self.0.checked_sub(amount.get()).map(Self)
    }

    #[must_use]
    pub fn covers(self, amount: Points) -> bool {
        self.0 >= amount.get()
    }

    /// Apply a signed manual adjustment, clamping at zero.
    #[must_use]
    pub fn saturating_adjust(self, delta: i64) -> Self {
        let next = i64::from(self.0).saturating_add(delta).max(0);
        Self(u32::try_from(next).unwrap_or(u32::MAX))
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_rejects_zero() {
        assert!(Points::new(0).is_err());
        assert_eq!(Points::new(30).unwrap().get(), 30);
    }

    #[test]
    fn points_deserialize_rejects_zero() {
        let parsed: Result<Points, _> = serde_json::from_str("0");
        assert!(parsed.is_err());
        let parsed: Points = serde_json::from_str("75").unwrap();
        assert_eq!(parsed.get(), 75);
    }

    #[test]
    fn debit_fails_instead_of_underflowing() {
        let score = Score::new(50);
        assert_eq!(score.checked_debit(Points::new(75).unwrap()), None);
        assert_eq!(
            score.checked_debit(Points::new(50).unwrap()),
            Some(Score::ZERO)
        );
    }

    #[test]
    fn adjust_clamps_at_zero() {
        let score = Score::new(10);
        assert_eq!(score.saturating_adjust(-25), Score::ZERO);
        assert_eq!(score.saturating_adjust(5).value(), 15);
    }
}
