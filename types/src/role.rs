//! The two participant roles of a ledger.
//!
//! A ledger always has exactly two slots. The role is an enumerated type;
//! display names ("Keeper", "Nightingale", whatever a pair picks) live in
//! [`crate::LedgerState::players`] as a mapping layered on top, so identity
//! never depends on the label.

use serde::{Deserialize, Serialize};

/// One of the two participant identities in a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    A,
    B,
}

impl Role {
    /// The other role.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Role::A => Role::B,
            Role::B => Role::A,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::A => "a",
            Role::B => "b",
        }
    }

    /// Parse a role from its wire key.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Some(Role::A),
            "b" => Some(Role::B),
            _ => None,
        }
    }

    #[must_use]
    pub const fn all() -> [Role; 2] {
        [Role::A, Role::B]
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A total mapping from [`Role`] to `T`.
///
/// Two fields instead of a map type: both roles always have a value, and
/// lookups cannot miss.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMap<T> {
    pub a: T,
    pub b: T,
}

impl<T> RoleMap<T> {
    pub fn new(a: T, b: T) -> Self {
        Self { a, b }
    }

    /// Build a map by evaluating `f` for each role.
    pub fn from_fn(mut f: impl FnMut(Role) -> T) -> Self {
        Self {
            a: f(Role::A),
            b: f(Role::B),
        }
    }

    #[must_use]
    pub fn get(&self, role: Role) -> &T {
        match role {
            Role::A => &self.a,
            Role::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, role: Role) -> &mut T {
        match role {
            Role::A => &mut self.a,
            Role::B => &mut self.b,
        }
    }

    pub fn set(&mut self, role: Role, value: T) {
        *self.get_mut(role) = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &T)> {
        [(Role::A, &self.a), (Role::B, &self.b)].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_is_an_involution() {
        for role in Role::all() {
            assert_eq!(role.opposite().opposite(), role);
        }
        assert_eq!(Role::A.opposite(), Role::B);
    }

    #[test]
    fn parse_accepts_wire_keys_only() {
        assert_eq!(Role::parse("a"), Some(Role::A));
        assert_eq!(Role::parse(" B "), Some(Role::B));
        assert_eq!(Role::parse("keeper"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn role_map_lookup_is_total() {
        let mut map = RoleMap::new(1, 2);
        assert_eq!(*map.get(Role::A), 1);
        map.set(Role::B, 5);
        assert_eq!(*map.get(Role::B), 5);
        assert_eq!(map.iter().count(), 2);
    }

    #[test]
    fn role_serializes_to_lowercase_key() {
        assert_eq!(serde_json::to_string(&Role::A).unwrap(), "\"a\"");
        let parsed: Role = serde_json::from_str("\"b\"").unwrap();
        assert_eq!(parsed, Role::B);
    }
}
