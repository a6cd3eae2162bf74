//! The form boundary.
//!
//! Creation input is validated here, before any state mutation or network
//! call: required text must be non-empty after trimming, numeric fields
//! must be positive whole numbers. Passing validation constructs the
//! entity with a fresh client-generated id.

use std::num::NonZeroU32;

use thiserror::Error;

use pact_types::{Habit, NonEmptyString, Points, Punishment, Reward, Role};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{field} must not be empty")]
    EmptyText { field: &'static str },

    #[error("{field} must be a positive whole number")]
    NotPositive { field: &'static str },
}

fn required_text(field: &'static str, value: &str) -> Result<NonEmptyString, FormError> {
    NonEmptyString::new(value.trim()).map_err(|_| FormError::EmptyText { field })
}

fn positive_points(field: &'static str, value: i64) -> Result<Points, FormError> {
    u32::try_from(value)
        .ok()
        .and_then(|v| Points::new(v).ok())
        .ok_or(FormError::NotPositive { field })
}

/// Input for a new habit.
#[derive(Debug, Clone)]
pub struct HabitForm {
    pub description: String,
    pub points: i64,
    pub times_per_cycle: i64,
    pub assignee: Role,
}

impl HabitForm {
    pub fn validate(self) -> Result<Habit, FormError> {
        let description = required_text("description", &self.description)?;
        let value = positive_points("points", self.points)?;
        let target = u32::try_from(self.times_per_cycle)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or(FormError::NotPositive {
                field: "times per cycle",
            })?;
        Ok(Habit::new(description, value, target, self.assignee))
    }
}

/// Input for a new reward.
#[derive(Debug, Clone)]
pub struct RewardForm {
    pub title: String,
    pub description: String,
    pub cost: i64,
}

impl RewardForm {
    pub fn validate(self) -> Result<Reward, FormError> {
        let title = required_text("title", &self.title)?;
        let description = required_text("description", &self.description)?;
        let cost = positive_points("cost", self.cost)?;
        Ok(Reward::new(title, description, cost))
    }
}

/// Input for a new punishment.
#[derive(Debug, Clone)]
pub struct PunishmentForm {
    pub title: String,
    pub description: String,
}

impl PunishmentForm {
    pub fn validate(self) -> Result<Punishment, FormError> {
        let title = required_text("title", &self.title)?;
        let description = required_text("description", &self.description)?;
        Ok(Punishment::new(title, description))
    }
}
