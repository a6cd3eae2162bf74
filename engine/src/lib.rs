//! Session controller and orchestration for Pact.
//!
//! A [`Session`] owns the one explicit state container for a client: the
//! latest versioned snapshot of the selected ledger, the caller's identity
//! and claimed role, and the single-level undo buffer. Mutations flow
//! through the pure reducer in `pact-core`, then through the store's
//! retrying writer; remote changes arrive on a watch whose lifetime is
//! scoped to the active selection. Every user-visible failure funnels into
//! one [`Notice`] shape.

mod errors;
mod forms;
mod session;
pub mod suggest;


pub use errors::{EngineError, Notice};
pub use forms::{FormError, HabitForm, PunishmentForm, RewardForm};
pub use session::{Participation, Session};
