//! The reducer: `(state, policy, action, now) -> new state + receipt`.

use chrono::{DateTime, Utc};

use pact_types::{Collection, Entry, EntryId, HistoryEntry, LedgerPolicy, LedgerState, Role};

use crate::action::{Action, Applied, Receipt, Tombstone};
use crate::errors::DomainError;

/// Apply one action to the ledger.
///
/// Returns the successor state and a receipt, or a [`DomainError`] that
/// guarantees nothing changed. The clock is an argument so replaying the
/// same actions always yields the same history.
pub fn apply(
    state: &LedgerState,
    policy: &LedgerPolicy,
    action: Action,
    now: DateTime<Utc>,
) -> Result<Applied, DomainError> {
    let mut next = state.clone();

    let receipt = match action {
        Action::AddHabit(habit) => {
            ensure_fresh(next.habits.iter().map(|h| &h.id), Collection::Habits, &habit.id)?;
            let id = habit.id.clone();
            next.habits.push(habit);
            Receipt::Added {
                collection: Collection::Habits,
                id,
            }
        }

        Action::AddReward(reward) => {
            ensure_fresh(next.rewards.iter().map(|r| &r.id), Collection::Rewards, &reward.id)?;
            let id = reward.id.clone();
            next.rewards.push(reward);
            Receipt::Added {
                collection: Collection::Rewards,
                id,
            }
        }

        Action::AddPunishment(punishment) => {
            ensure_fresh(
                next.punishments.iter().map(|p| &p.id),
                Collection::Punishments,
                &punishment.id,
            )?;
            let id = punishment.id.clone();
            next.punishments.push(punishment);
            Receipt::Added {
                collection: Collection::Punishments,
                id,
            }
        }

        Action::CompleteHabit { id } => complete_habit(&mut next, policy, id, now)?,

        Action::RedeemReward { id, payer } => redeem_reward(&mut next, policy, id, payer, now)?,

        Action::AssignPunishment { id, target } => {
            let punishment = next
                .punishments
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| DomainError::NotFound {
                    collection: Collection::Punishments,
                    id: id.clone(),
                })?;
            punishment.assigned_to = Some(target);
            let title = punishment.title.clone();
            let player = next.players.get(target).clone();
            record(
                &mut next,
                policy,
                format!("\"{title}\" assigned to {player}"),
                0,
                now,
            );
            Receipt::PunishmentAssigned { id, target }
        }

        Action::DeleteEntry { collection, id } => {
            let tombstone = remove_entry(&mut next, collection, &id)?;
            Receipt::Deleted(tombstone)
        }

        Action::Restore(tombstone) => restore_entry(&mut next, tombstone)?,

        Action::AdjustScore { role, delta } => {
            let new_score = next.scores.get(role).saturating_adjust(delta);
            next.scores.set(role, new_score);
            let player = next.players.get(role).clone();
            record(
                &mut next,
                policy,
                format!("Score adjustment for {player}"),
                delta,
                now,
            );
            Receipt::ScoreAdjusted { role, new_score }
        }

        Action::RenamePlayer { role, name } => {
            next.players.set(role, name.into_inner());
            Receipt::PlayerRenamed { role }
        }
    };

    Ok(Applied {
        state: next,
        receipt,
    })
}

fn complete_habit(
    next: &mut LedgerState,
    policy: &LedgerPolicy,
    id: EntryId,
    now: DateTime<Utc>,
) -> Result<Receipt, DomainError> {
    let (award, credited, fulfilled, description) = {
        let habit = next
            .habits
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or_else(|| DomainError::NotFound {
                collection: Collection::Habits,
                id: id.clone(),
            })?;
        if habit.is_fulfilled() {
            return Err(DomainError::HabitFulfilled { id });
        }
        habit.completions += 1;
        (
            habit.value,
            policy.credit.recipient(habit.assignee),
            habit.is_fulfilled(),
            habit.description.clone(),
        )
    };

    let new_score = next.scores.get(credited).credit(award);
    next.scores.set(credited, new_score);

    let player = next.players.get(credited).clone();
    record(
        next,
        policy,
        format!("{player} earned {award} for \"{description}\""),
        i64::from(award.get()),
        now,
    );

    Ok(Receipt::HabitCompleted {
        id,
        credited,
        award,
        fulfilled,
    })
}

fn redeem_reward(
    next: &mut LedgerState,
    policy: &LedgerPolicy,
    id: EntryId,
    payer: Role,
    now: DateTime<Utc>,
) -> Result<Receipt, DomainError> {
    let position = next
        .rewards
        .iter()
        .position(|r| r.id == id)
        .ok_or_else(|| DomainError::NotFound {
            collection: Collection::Rewards,
            id: id.clone(),
        })?;

    let cost = next.rewards[position].cost;
    let available = *next.scores.get(payer);
    let remaining = available
        .checked_debit(cost)
        .ok_or(DomainError::InsufficientPoints {
            needed: cost,
            available,
        })?;

    // Nothing can fail past this point; the debit and the removal commit
    // together or not at all.
    let reward = next.rewards.remove(position);
    next.scores.set(payer, remaining);

    let player = next.players.get(payer).clone();
    record(
        next,
        policy,
        format!("{player} redeemed \"{}\"", reward.title),
        -i64::from(cost.get()),
        now,
    );

    Ok(Receipt::RewardRedeemed { id, payer, cost })
}

fn remove_entry(
    next: &mut LedgerState,
    collection: Collection,
    id: &EntryId,
) -> Result<Tombstone, DomainError> {
    let not_found = || DomainError::NotFound {
        collection,
        id: id.clone(),
    };

    let (index, entry) = match collection {
        Collection::Habits => {
            let index = next
                .habits
                .iter()
                .position(|h| &h.id == id)
                .ok_or_else(not_found)?;
            (index, Entry::Habit(next.habits.remove(index)))
        }
        Collection::Rewards => {
            let index = next
                .rewards
                .iter()
                .position(|r| &r.id == id)
                .ok_or_else(not_found)?;
            (index, Entry::Reward(next.rewards.remove(index)))
        }
        Collection::Punishments => {
            let index = next
                .punishments
                .iter()
                .position(|p| &p.id == id)
                .ok_or_else(not_found)?;
            (index, Entry::Punishment(next.punishments.remove(index)))
        }
    };

    Ok(Tombstone { index, entry })
}

fn restore_entry(next: &mut LedgerState, tombstone: Tombstone) -> Result<Receipt, DomainError> {
    let Tombstone { index, entry } = tombstone;
    let collection = entry.collection();
    let id = entry.id().clone();

    match entry {
        Entry::Habit(habit) => {
            ensure_fresh(next.habits.iter().map(|h| &h.id), collection, &habit.id)?;
            let index = index.min(next.habits.len());
            next.habits.insert(index, habit);
        }
        Entry::Reward(reward) => {
            ensure_fresh(next.rewards.iter().map(|r| &r.id), collection, &reward.id)?;
            let index = index.min(next.rewards.len());
            next.rewards.insert(index, reward);
        }
        Entry::Punishment(punishment) => {
            ensure_fresh(
                next.punishments.iter().map(|p| &p.id),
                collection,
                &punishment.id,
            )?;
            let index = index.min(next.punishments.len());
            next.punishments.insert(index, punishment);
        }
    }

    Ok(Receipt::Restored { collection, id })
}

fn ensure_fresh<'a>(
    mut existing: impl Iterator<Item = &'a EntryId>,
    collection: Collection,
    id: &EntryId,
) -> Result<(), DomainError> {
    if existing.any(|known| known == id) {
        Err(DomainError::AlreadyPresent {
            collection,
            id: id.clone(),
        })
    } else {
        Ok(())
    }
}

/// Append an audit entry and prune to the policy cap, oldest first.
fn record(
    state: &mut LedgerState,
    policy: &LedgerPolicy,
    message: String,
    delta: i64,
    now: DateTime<Utc>,
) {
    state.history.push(HistoryEntry {
        message,
        delta,
        timestamp: now,
    });
    if state.history.len() > policy.history_cap {
        let excess = state.history.len() - policy.history_cap;
        state.history.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use chrono::DateTime;

    use pact_types::{
        CreditPolicy, Habit, LedgerPolicy, LedgerState, NonEmptyString, Points, Punishment,
        Reward, Score,
    };

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::UNIX_EPOCH
    }

    fn non_empty(value: &str) -> NonEmptyString {
        NonEmptyString::new(value).expect("test fixture must be non-empty")
    }

    fn points(value: u32) -> Points {
        Points::new(value).expect("test fixture must use positive points")
    }

    fn habit(description: &str, value: u32, target: u32, assignee: Role) -> Habit {
        Habit::new(
            non_empty(description),
            points(value),
            NonZeroU32::new(target).expect("test fixture must use positive target"),
            assignee,
        )
    }

    fn reward(title: &str, cost: u32) -> Reward {
        Reward::new(non_empty(title), non_empty("as agreed"), points(cost))
    }

    fn assignee_policy() -> LedgerPolicy {
        LedgerPolicy {
            credit: CreditPolicy::Assignee,
            ..LedgerPolicy::default()
        }
    }

    fn apply_ok(state: &LedgerState, policy: &LedgerPolicy, action: Action) -> Applied {
        apply(state, policy, action, now()).expect("action must be accepted")
    }

    #[test]
    fn complete_habit_credits_opposite_role_by_default() {
        let policy = LedgerPolicy::default();
        let h = habit("dishes", 30, 3, Role::A);
        let id = h.id.clone();
        let state = apply_ok(&LedgerState::new(), &policy, Action::AddHabit(h)).state;

        let applied = apply_ok(&state, &policy, Action::CompleteHabit { id });

        assert_eq!(applied.state.scores.get(Role::B).value(), 30);
        assert_eq!(applied.state.scores.get(Role::A).value(), 0);
        assert_eq!(applied.state.history.len(), 1);
        assert_eq!(applied.state.history[0].delta, 30);
    }

    #[test]
    fn complete_habit_credits_assignee_when_policy_says_so() {
        let policy = assignee_policy();
        let h = habit("dishes", 10, 1, Role::A);
        let id = h.id.clone();
        let state = apply_ok(&LedgerState::new(), &policy, Action::AddHabit(h)).state;

        let applied = apply_ok(&state, &policy, Action::CompleteHabit { id });

        assert_eq!(applied.state.scores.get(Role::A).value(), 10);
        assert_eq!(applied.state.scores.get(Role::B).value(), 0);
    }

    #[test]
    fn completing_a_missing_habit_mutates_nothing() {
        let policy = LedgerPolicy::default();
        let state = LedgerState::new();

        let err = apply(
            &state,
            &policy,
            Action::CompleteHabit {
                id: EntryId::generate(),
            },
            now(),
        )
        .unwrap_err();

        assert!(matches!(err, DomainError::NotFound { collection, .. }
            if collection == Collection::Habits));
    }

    #[test]
    fn single_target_habit_fulfills_on_first_completion() {
        // The one-shot shape: worth 30, target 1. The first completion
        // credits 30 and closes the habit; further completions are refused.
        let policy = assignee_policy();
        let h = habit("deep clean", 30, 1, Role::A);
        let id = h.id.clone();
        let state = apply_ok(&LedgerState::new(), &policy, Action::AddHabit(h)).state;

        let applied = apply_ok(&state, &policy, Action::CompleteHabit { id: id.clone() });
        assert_eq!(applied.state.scores.get(Role::A).value(), 30);
        assert!(applied.state.habit(&id).unwrap().is_fulfilled());
        assert!(matches!(
            applied.receipt,
            Receipt::HabitCompleted { fulfilled: true, .. }
        ));

        let err = apply(
            &applied.state,
            &policy,
            Action::CompleteHabit { id: id.clone() },
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::HabitFulfilled { .. }));
        assert_eq!(applied.state.scores.get(Role::A).value(), 30);
    }

    #[test]
    fn recurring_habit_counts_to_its_target() {
        let policy = assignee_policy();
        let h = habit("stretch", 5, 3, Role::B);
        let id = h.id.clone();
        let mut state = apply_ok(&LedgerState::new(), &policy, Action::AddHabit(h)).state;

        for expected in 1..=3_u32 {
            let applied = apply_ok(&state, &policy, Action::CompleteHabit { id: id.clone() });
            state = applied.state;
            assert_eq!(state.habit(&id).unwrap().completions, expected);
        }

        assert_eq!(state.scores.get(Role::B).value(), 15);
        assert!(state.habit(&id).unwrap().is_fulfilled());
        assert_eq!(state.history.len(), 3);
    }

    #[test]
    fn redeem_with_insufficient_points_changes_nothing() {
        let policy = LedgerPolicy::default();
        let r = reward("movie night", 75);
        let id = r.id.clone();
        let mut state = apply_ok(&LedgerState::new(), &policy, Action::AddReward(r)).state;
        state.scores.set(Role::B, Score::new(50));

        let err = apply(
            &state,
            &policy,
            Action::RedeemReward {
                id: id.clone(),
                payer: Role::B,
            },
            now(),
        )
        .unwrap_err();

        assert!(matches!(err, DomainError::InsufficientPoints { .. }));
        assert_eq!(state.scores.get(Role::B).value(), 50);
        assert!(state.reward(&id).is_some());
    }

    #[test]
    fn redeem_debits_exactly_the_cost_and_consumes_the_reward() {
        let policy = LedgerPolicy::default();
        let r = reward("movie night", 75);
        let id = r.id.clone();
        let mut state = apply_ok(&LedgerState::new(), &policy, Action::AddReward(r)).state;
        state.scores.set(Role::B, Score::new(100));

        let applied = apply_ok(
            &state,
            &policy,
            Action::RedeemReward {
                id: id.clone(),
                payer: Role::B,
            },
        );

        assert_eq!(applied.state.scores.get(Role::B).value(), 25);
        assert!(applied.state.reward(&id).is_none());
        assert_eq!(applied.state.history.len(), 1);
        assert_eq!(applied.state.history[0].delta, -75);
    }

    #[test]
    fn assign_punishment_labels_without_touching_scores() {
        let policy = LedgerPolicy::default();
        let p = Punishment::new(non_empty("cold shower"), non_empty("you know why"));
        let id = p.id.clone();
        let mut state = apply_ok(&LedgerState::new(), &policy, Action::AddPunishment(p)).state;
        state.scores.set(Role::A, Score::new(40));

        let applied = apply_ok(
            &state,
            &policy,
            Action::AssignPunishment {
                id: id.clone(),
                target: Role::A,
            },
        );

        assert_eq!(applied.state.punishment(&id).unwrap().assigned_to, Some(Role::A));
        assert_eq!(applied.state.scores.get(Role::A).value(), 40);
        assert_eq!(applied.state.history.len(), 1);
        assert_eq!(applied.state.history[0].delta, 0);
    }

    #[test]
    fn delete_then_restore_round_trips_at_the_original_index() {
        let policy = LedgerPolicy::default();
        let mut state = LedgerState::new();
        for title in ["first", "second", "third"] {
            state = apply_ok(&state, &policy, Action::AddReward(reward(title, 10))).state;
        }
        let target = state.rewards[1].clone();

        let deleted = apply_ok(
            &state,
            &policy,
            Action::DeleteEntry {
                collection: Collection::Rewards,
                id: target.id.clone(),
            },
        );
        let Receipt::Deleted(tombstone) = deleted.receipt.clone() else {
            panic!("expected a deletion receipt");
        };
        assert_eq!(tombstone.index, 1);
        assert_eq!(deleted.state.rewards.len(), 2);

        let restored = apply_ok(&deleted.state, &policy, Action::Restore(tombstone));
        assert_eq!(restored.state.rewards[1], target);
        assert_eq!(restored.state, state);
    }

    #[test]
    fn deleting_an_already_removed_id_reports_not_found() {
        let policy = LedgerPolicy::default();
        let r = reward("one", 10);
        let id = r.id.clone();
        let state = apply_ok(&LedgerState::new(), &policy, Action::AddReward(r)).state;

        let delete = Action::DeleteEntry {
            collection: Collection::Rewards,
            id: id.clone(),
        };
        let after = apply_ok(&state, &policy, delete.clone()).state;

        let err = apply(&after, &policy, delete, now()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert!(after.rewards.is_empty());
    }

    #[test]
    fn restore_refuses_a_duplicate_id() {
        let policy = LedgerPolicy::default();
        let r = reward("one", 10);
        let state = apply_ok(&LedgerState::new(), &policy, Action::AddReward(r.clone())).state;

        let err = apply(
            &state,
            &policy,
            Action::Restore(Tombstone {
                index: 0,
                entry: Entry::Reward(r),
            }),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyPresent { .. }));
    }

    #[test]
    fn restore_clamps_a_stale_index() {
        let policy = LedgerPolicy::default();
        let r = reward("orphan", 10);
        let applied = apply_ok(
            &LedgerState::new(),
            &policy,
            Action::Restore(Tombstone {
                index: 7,
                entry: Entry::Reward(r.clone()),
            }),
        );
        assert_eq!(applied.state.rewards[0], r);
    }

    #[test]
    fn history_prunes_oldest_entries_past_the_cap() {
        let policy = LedgerPolicy {
            history_cap: 3,
            ..LedgerPolicy::default()
        };
        let mut state = LedgerState::new();

        for delta in 1..=5_i64 {
            state = apply_ok(
                &state,
                &policy,
                Action::AdjustScore {
                    role: Role::A,
                    delta,
                },
            )
            .state;
        }

        assert_eq!(state.history.len(), 3);
        let deltas: Vec<i64> = state.history.iter().map(|e| e.delta).collect();
        assert_eq!(deltas, vec![3, 4, 5]);
    }

    #[test]
    fn adjust_score_clamps_at_zero() {
        let policy = LedgerPolicy::default();
        let mut state = LedgerState::new();
        state.scores.set(Role::A, Score::new(10));

        let applied = apply_ok(
            &state,
            &policy,
            Action::AdjustScore {
                role: Role::A,
                delta: -25,
            },
        );
        assert_eq!(applied.state.scores.get(Role::A).value(), 0);
    }

    #[test]
    fn adding_a_duplicate_id_is_refused() {
        let policy = LedgerPolicy::default();
        let h = habit("dishes", 5, 1, Role::A);
        let state = apply_ok(&LedgerState::new(), &policy, Action::AddHabit(h.clone())).state;

        let err = apply(&state, &policy, Action::AddHabit(h), now()).unwrap_err();
        assert!(matches!(err, DomainError::AlreadyPresent { .. }));
    }

    #[test]
    fn rename_player_changes_the_label_not_the_ledger() {
        let policy = LedgerPolicy::default();
        let state = LedgerState::new();

        let applied = apply_ok(
            &state,
            &policy,
            Action::RenamePlayer {
                role: Role::A,
                name: non_empty("Keeper"),
            },
        );
        assert_eq!(applied.state.players.get(Role::A), "Keeper");
        assert!(applied.state.history.is_empty());
        assert_eq!(applied.state.scores, state.scores);
    }
}
