//! Document paths and room codes.

use pact_types::LedgerId;

/// Room-code alphabet: uppercase alphanumerics minus the characters that
/// read ambiguously when copied by hand (I, L, O, 0, 1).
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const ROOM_CODE_LEN: usize = 6;

/// A fresh 6-character room code.
#[must_use]
pub fn generate_room_code() -> LedgerId {
    let code: String = (0..ROOM_CODE_LEN)
        .map(|_| {
            let index = rand::random::<u32>() as usize % ROOM_CODE_ALPHABET.len();
            char::from(ROOM_CODE_ALPHABET[index])
        })
        .collect();
    LedgerId::new(code).expect("room-code alphabet is always a valid ledger id")
}

/// The hierarchical key of one ledger document:
/// application id, visibility scope, collection, document id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath(String);

impl DocumentPath {
    /// The path of a ledger document under `app_id`.
    #[must_use]
    pub fn ledger(app_id: &str, ledger: &LedgerId) -> Self {
        Self(format!("apps/{app_id}/public/ledgers/{ledger}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
