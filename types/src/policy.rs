use serde::{Deserialize, Serialize};

use crate::Role;

/// Default number of history entries retained.
pub const DEFAULT_HISTORY_CAP: usize = 200;

/// Which role's score a habit completion credits.
///
/// The original product intent is that finishing your habit earns points
/// for the other participant; some pairs prefer crediting the assignee.
/// Both are valid, so the direction is policy rather than hard-coded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditPolicy {
    /// The habit's assignee earns the points.
    Assignee,
    /// The opposite role earns the points.
    #[default]
    Opposite,
}

impl CreditPolicy {
    /// The role credited when a habit assigned to `assignee` is completed.
    #[must_use]
    pub const fn recipient(self, assignee: Role) -> Role {
        match self {
            CreditPolicy::Assignee => assignee,
            CreditPolicy::Opposite => assignee.opposite(),
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assignee" => Some(CreditPolicy::Assignee),
            "opposite" => Some(CreditPolicy::Opposite),
            _ => None,
        }
    }
}

/// Product-policy knobs for one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPolicy {
    #[serde(default)]
    pub credit: CreditPolicy,
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

fn default_history_cap() -> usize {
    DEFAULT_HISTORY_CAP
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            credit: CreditPolicy::default(),
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_credit_goes_to_the_opposite_role() {
        let policy = LedgerPolicy::default();
        assert_eq!(policy.credit.recipient(Role::A), Role::B);
        assert_eq!(
            CreditPolicy::Assignee.recipient(Role::A),
            Role::A
        );
    }

    #[test]
    fn credit_policy_parses_case_insensitively() {
        assert_eq!(CreditPolicy::parse("Opposite"), Some(CreditPolicy::Opposite));
        assert_eq!(CreditPolicy::parse("ASSIGNEE"), Some(CreditPolicy::Assignee));
        assert_eq!(CreditPolicy::parse("both"), None);
    }
}
