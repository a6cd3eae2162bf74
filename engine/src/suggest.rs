//! Built-in suggestions for the creation forms.
//!
//! A pair staring at an empty ledger gets a starting point: each call
//! returns a pre-filled form, ready to validate and submit like any
//! hand-typed one.

use pact_types::Role;

use crate::forms::{HabitForm, PunishmentForm, RewardForm};

const HABITS: &[(&str, i64)] = &[
    ("Finish the day's deep-work block before lunch", 30),
    ("Cook dinner from the meal plan, no takeout", 25),
    ("A 45-minute workout, logged", 15),
    ("Dishes washed, dried, and put away after dinner", 15),
    ("Read a paper book for 20 minutes before bed", 10),
    ("Plan tomorrow's schedule before turning in", 10),
    ("Reset the living room in five minutes", 5),
    ("Fifteen minutes of phones-down conversation", 10),
];

const REWARDS: &[(&str, &str, i64)] = &[
    (
        "A planned date night",
        "Three hours, organized and paid for by the other half",
        450,
    ),
    (
        "A quiet day alone",
        "The house to yourself for six uninterrupted hours",
        600,
    ),
    (
        "Chore amnesty",
        "One month off the chore you hate most",
        300,
    ),
    (
        "Movie marathon pick",
        "Three films of your choosing, no complaints allowed",
        120,
    ),
    (
        "Dessert on demand",
        "A requested dessert, made from scratch",
        90,
    ),
    (
        "Dinner veto",
        "Absolute say over tonight's menu",
        50,
    ),
];

const PUNISHMENTS: &[(&str, &str)] = &[
    (
        "Floor detail",
        "Sweep and mop every hard floor in the house",
    ),
    (
        "Refrigerator purge",
        "Empty, clean, and reorganize the fridge and freezer",
    ),
    (
        "Digital blackout",
        "Hand over the phone and tablet for twelve hours",
    ),
    (
        "Written apology",
        "A sincere 250 words, by hand",
    ),
    (
        "Early-morning detail",
        "All the morning chores, solo, starting half an hour early",
    ),
    (
        "Errand run",
        "One spontaneous errand, whenever it is asked",
    ),
];

fn pick<T>(items: &[T]) -> &T {
    let index = rand::random::<u32>() as usize % items.len();
    &items[index]
}

/// A suggested habit for `assignee`.
#[must_use]
pub fn suggest_habit(assignee: Role) -> HabitForm {
    let (description, points) = pick(HABITS);
    HabitForm {
        description: (*description).to_owned(),
        points: *points,
        times_per_cycle: 1,
        assignee,
    }
}

#[must_use]
pub fn suggest_reward() -> RewardForm {
    let (title, description, cost) = pick(REWARDS);
    RewardForm {
        title: (*title).to_owned(),
        description: (*description).to_owned(),
        cost: *cost,
    }
}

#[must_use]
pub fn suggest_punishment() -> PunishmentForm {
    let (title, description) = pick(PUNISHMENTS);
    PunishmentForm {
        title: (*title).to_owned(),
        description: (*description).to_owned(),
    }
}
