//! Pact CLI - binary entry point.
//!
//! Wires validated configuration into an [`HttpStore`]-backed
//! [`Session`] and maps subcommands onto session operations. Fatal
//! configuration problems (no backend endpoint) surface once at startup;
//! everything else funnels through the engine's notice shape.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use pact_config::{PactConfig, Settings};
use pact_core::Receipt;
use pact_engine::{
    EngineError, HabitForm, Participation, PunishmentForm, RewardForm, Session, suggest,
};
use pact_store::{HttpStore, RetryConfig};
use pact_types::{Collection, EntryId, IdentityId, LedgerId, LedgerState, Role};

#[derive(Parser)]
#[command(name = "pact", about = "Shared habit ledger for two people")]
struct Cli {
    /// Ledger room code (overrides the configured default)
    #[arg(long, global = true)]
    ledger: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new ledger and print its room code
    Init {
        /// Display name for your role slot
        #[arg(long)]
        name: Option<String>,
    },
    /// Join an existing ledger by room code
    Join { code: String },
    /// Show scores, habits, rewards, and punishments
    Status,
    /// Manage habits
    #[command(subcommand)]
    Habit(HabitCommand),
    /// Manage rewards
    #[command(subcommand)]
    Reward(RewardCommand),
    /// Manage punishments
    #[command(subcommand)]
    Punish(PunishCommand),
    /// Undo the most recent deletion
    Undo,
    /// Show the audit history
    History,
    /// Follow remote changes as they land
    Watch,
}

#[derive(Subcommand)]
enum HabitCommand {
    /// Add a habit
    Add {
        description: String,
        #[arg(long)]
        points: i64,
        /// Completions per cycle before the habit is fulfilled
        #[arg(long, default_value_t = 1)]
        times: i64,
        /// Role the habit belongs to: "a" or "b" (defaults to yours)
        #[arg(long)]
        assignee: Option<String>,
    },
    /// Record a completion
    Done { id: String },
    /// Delete a habit
    Rm { id: String },
    /// Print a suggested habit
    Suggest,
}

#[derive(Subcommand)]
enum RewardCommand {
    /// Add a reward
    Add {
        title: String,
        #[arg(long)]
        cost: i64,
        #[arg(long)]
        description: String,
    },
    /// Redeem a reward, paying from your own score
    Redeem { id: String },
    /// Delete a reward
    Rm { id: String },
    /// Print a suggested reward
    Suggest,
}

#[derive(Subcommand)]
enum PunishCommand {
    /// Add a punishment
    Add {
        title: String,
        #[arg(long)]
        description: String,
    },
    /// Pin a punishment on a role: "a" or "b"
    Assign { id: String, target: String },
    /// Delete a punishment
    Rm { id: String },
    /// Print a suggested punishment
    Suggest,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let settings = PactConfig::load()
        .unwrap_or_default()
        .resolve()
        .context("configuration error")?;

    tracing::debug!(app_id = %settings.app_id, "configuration loaded");

    let identity = load_or_create_identity(&settings)?;
    let retry = RetryConfig {
        max_retries: settings.retry.max_retries,
        initial_delay: settings.retry.initial_delay,
        max_delay: settings.retry.max_delay,
        ..RetryConfig::default()
    };
    let store = HttpStore::new(&settings.base_url, settings.token.clone()).with_retry(retry);
    let mut session = Session::new(store, settings.app_id.clone(), identity, settings.policy);

    match run(&mut session, &settings, cli).await {
        Ok(()) => Ok(()),
        Err(RunFailure::Engine(error)) => {
            let notice = error.notice();
            if let EngineError::Store(store_error) = &error
                && store_error.is_transient()
            {
                eprintln!("The store may just be unreachable; try again in a moment.");
            }
            Err(anyhow!("{}: {}", notice.title, notice.body))
        }
        Err(RunFailure::Other(error)) => Err(error),
    }
}

enum RunFailure {
    Engine(EngineError),
    Other(anyhow::Error),
}

impl From<EngineError> for RunFailure {
    fn from(error: EngineError) -> Self {
        RunFailure::Engine(error)
    }
}

impl From<anyhow::Error> for RunFailure {
    fn from(error: anyhow::Error) -> Self {
        RunFailure::Other(error)
    }
}

async fn run(
    session: &mut Session<HttpStore>,
    settings: &Settings,
    cli: Cli,
) -> Result<(), RunFailure> {
    let command = match cli.command {
        Command::Init { name } => {
            let code = session.create_ledger(name).await?;
            println!("Created ledger {code}.");
            println!("Share this code with your partner; they join with: pact join {code}");
            return Ok(());
        }
        other => other,
    };

    let code = match &command {
        Command::Join { code } => LedgerId::new(code.as_str())
            .map_err(|error| anyhow!("invalid ledger code: {error}"))?,
        _ => selected_ledger(settings, cli.ledger.as_deref())?,
    };
    let participation = session.join(code).await?;
    if participation == Participation::Observer {
        println!("Both role slots are taken; you are observing this ledger.");
    }

    match command {
        Command::Init { .. } => unreachable!("handled before joining"),
        Command::Join { .. } => {
            let ledger = session.ledger_id().expect("just joined");
            match participation {
                Participation::Member(role) => {
                    println!("Joined ledger {ledger} as role {role}.");
                }
                Participation::Observer => println!("Joined ledger {ledger} as an observer."),
            }
        }
        Command::Status => print_status(session),
        Command::Habit(command) => run_habit(session, command).await?,
        Command::Reward(command) => run_reward(session, command).await?,
        Command::Punish(command) => run_punish(session, command).await?,
        Command::Undo => {
            let receipt = session.undo().await?;
            if let Receipt::Restored { collection, .. } = receipt {
                println!("Restored the deleted entry to {collection}.");
            }
        }
        Command::History => print_history(session.state()?),
        Command::Watch => watch(session).await?,
    }

    Ok(())
}

async fn run_habit(
    session: &mut Session<HttpStore>,
    command: HabitCommand,
) -> Result<(), RunFailure> {
    match command {
        HabitCommand::Add {
            description,
            points,
            times,
            assignee,
        } => {
            let assignee = match assignee {
                Some(raw) => parse_role(&raw)?,
                None => session
                    .role()
                    .ok_or(EngineError::Observer)?,
            };
            let id = session
                .add_habit(HabitForm {
                    description,
                    points,
                    times_per_cycle: times,
                    assignee,
                })
                .await?;
            println!("Added habit {}.", short(&id));
        }
        HabitCommand::Done { id } => {
            let state = session.state()?;
            let id = find_entry(state.habits.iter().map(|h| &h.id), &id)?;
            let receipt = session.complete_habit(id).await?;
            if let Receipt::HabitCompleted {
                credited,
                award,
                fulfilled,
                ..
            } = receipt
            {
                let name = session.state()?.players.get(credited).clone();
                println!("+{award} points to {name}.");
                if fulfilled {
                    println!("Habit fulfilled for this cycle.");
                }
            }
        }
        HabitCommand::Rm { id } => {
            let state = session.state()?;
            let id = find_entry(state.habits.iter().map(|h| &h.id), &id)?;
            delete(session, Collection::Habits, id).await?;
        }
        HabitCommand::Suggest => {
            let assignee = session.role().unwrap_or(Role::A);
            let form = suggest::suggest_habit(assignee);
            println!("{} ({} pts)", form.description, form.points);
            println!(
                "  pact habit add \"{}\" --points {}",
                form.description, form.points
            );
        }
    }
    Ok(())
}

async fn run_reward(
    session: &mut Session<HttpStore>,
    command: RewardCommand,
) -> Result<(), RunFailure> {
    match command {
        RewardCommand::Add {
            title,
            cost,
            description,
        } => {
            let id = session
                .add_reward(RewardForm {
                    title,
                    description,
                    cost,
                })
                .await?;
            println!("Added reward {}.", short(&id));
        }
        RewardCommand::Redeem { id } => {
            let state = session.state()?;
            let id = find_entry(state.rewards.iter().map(|r| &r.id), &id)?;
            let receipt = session.redeem_reward(id).await?;
            if let Receipt::RewardRedeemed { cost, payer, .. } = receipt {
                let remaining = session.state()?.scores.get(payer).value();
                println!("Redeemed for {cost} points; {remaining} left.");
            }
        }
        RewardCommand::Rm { id } => {
            let state = session.state()?;
            let id = find_entry(state.rewards.iter().map(|r| &r.id), &id)?;
            delete(session, Collection::Rewards, id).await?;
        }
        RewardCommand::Suggest => {
            let form = suggest::suggest_reward();
            println!("{} ({} pts) - {}", form.title, form.cost, form.description);
            println!(
                "  pact reward add \"{}\" --cost {} --description \"{}\"",
                form.title, form.cost, form.description
            );
        }
    }
    Ok(())
}

async fn run_punish(
    session: &mut Session<HttpStore>,
    command: PunishCommand,
) -> Result<(), RunFailure> {
    match command {
        PunishCommand::Add { title, description } => {
            let id = session
                .add_punishment(PunishmentForm { title, description })
                .await?;
            println!("Added punishment {}.", short(&id));
        }
        PunishCommand::Assign { id, target } => {
            let target = parse_role(&target)?;
            let state = session.state()?;
            let id = find_entry(state.punishments.iter().map(|p| &p.id), &id)?;
            session.assign_punishment(id, target).await?;
            let name = session.state()?.players.get(target).clone();
            println!("Assigned to {name}.");
        }
        PunishCommand::Rm { id } => {
            let state = session.state()?;
            let id = find_entry(state.punishments.iter().map(|p| &p.id), &id)?;
            delete(session, Collection::Punishments, id).await?;
        }
        PunishCommand::Suggest => {
            let form = suggest::suggest_punishment();
            println!("{} - {}", form.title, form.description);
            println!(
                "  pact punish add \"{}\" --description \"{}\"",
                form.title, form.description
            );
        }
    }
    Ok(())
}

async fn delete(
    session: &mut Session<HttpStore>,
    collection: Collection,
    id: EntryId,
) -> Result<(), RunFailure> {
    if session.delete_entry(collection, id).await? {
        println!("Deleted. Run `pact undo` to bring it back.");
    } else {
        println!("Already gone.");
    }
    Ok(())
}

async fn watch(session: &mut Session<HttpStore>) -> Result<(), RunFailure> {
    println!("Watching for changes (ctrl-c to stop)...");
    loop {
        let snapshot = tokio::select! {
            changed = session.next_change() => changed?,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };
        let state = &snapshot.state;
        println!(
            "v{}: {} {} | {} {}",
            snapshot.version,
            state.players.get(Role::A),
            state.scores.get(Role::A),
            state.players.get(Role::B),
            state.scores.get(Role::B),
        );
        if let Some(entry) = state.history.last() {
            println!("  {}", entry.message);
        }
    }
}

fn print_status(session: &Session<HttpStore>) {
    let Ok(state) = session.state() else {
        return;
    };
    if let (Some(ledger), Some(role)) = (session.ledger_id(), session.role()) {
        println!(
            "Ledger {ledger} - you are {} ({role})",
            state.players.get(role)
        );
    }
    println!(
        "Scores: {} {} | {} {}",
        state.players.get(Role::A),
        state.scores.get(Role::A),
        state.players.get(Role::B),
        state.scores.get(Role::B),
    );
    for role in Role::all() {
        if state.members.holder(role).is_none() {
            println!("Slot {role} is still unclaimed.");
        }
    }

    println!("\nHabits:");
    if state.habits.is_empty() {
        println!("  (none yet)");
    }
    for habit in &state.habits {
        let status = if habit.is_fulfilled() {
            " - fulfilled".to_owned()
        } else {
            format!(" - {}/{} this cycle", habit.completions, habit.target)
        };
        println!(
            "  [{}] {} - {} pts, assignee {}{status}",
            short(&habit.id),
            habit.description,
            habit.value,
            habit.assignee,
        );
    }

    println!("\nRewards:");
    if state.rewards.is_empty() {
        println!("  (none yet)");
    }
    for reward in &state.rewards {
        println!(
            "  [{}] {} - {} pts - {}",
            short(&reward.id),
            reward.title,
            reward.cost,
            reward.description,
        );
    }

    println!("\nPunishments:");
    if state.punishments.is_empty() {
        println!("  (none yet)");
    }
    for punishment in &state.punishments {
        let assigned = match punishment.assigned_to {
            Some(role) => format!(" - assigned to {}", state.players.get(role)),
            None => String::new(),
        };
        println!(
            "  [{}] {} - {}{assigned}",
            short(&punishment.id),
            punishment.title,
            punishment.description,
        );
    }
}

fn print_history(state: &LedgerState) {
    if state.history.is_empty() {
        println!("No history yet.");
        return;
    }
    for entry in &state.history {
        let sign = if entry.delta > 0 { "+" } else { "" };
        println!(
            "{}  {}{}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            sign,
            entry.delta,
            entry.message,
        );
    }
}

fn selected_ledger(
    settings: &Settings,
    flag: Option<&str>,
) -> Result<LedgerId, RunFailure> {
    if let Some(raw) = flag {
        return LedgerId::new(raw)
            .map_err(|error| anyhow!("invalid --ledger value: {error}").into());
    }
    settings.default_ledger.clone().ok_or_else(|| {
        anyhow!(
            "no ledger selected; pass --ledger CODE or set app.ledger in the config file"
        )
        .into()
    })
}

fn parse_role(raw: &str) -> Result<Role, RunFailure> {
    Role::parse(raw)
        .ok_or_else(|| anyhow!("role must be \"a\" or \"b\" (got {raw:?})").into())
}

/// Resolve a (possibly shortened) id against one collection.
fn find_entry<'a>(
    ids: impl Iterator<Item = &'a EntryId>,
    needle: &str,
) -> Result<EntryId, RunFailure> {
    let matches: Vec<&EntryId> = ids
        .filter(|id| id.as_str() == needle || id.as_str().starts_with(needle))
        .collect();
    match matches.as_slice() {
        [only] => Ok((*only).clone()),
        [] => Err(anyhow!("no entry matches id {needle:?}").into()),
        _ => Err(anyhow!("id {needle:?} is ambiguous; give more characters").into()),
    }
}

fn short(id: &EntryId) -> &str {
    let raw = id.as_str();
    &raw[..raw.len().min(8)]
}

/// The opaque identity this machine acts as.
///
/// Config wins when set; otherwise a generated id is persisted next to the
/// config file so the same machine keeps the same role slot across runs.
fn load_or_create_identity(settings: &Settings) -> Result<IdentityId> {
    if let Some(identity) = &settings.identity {
        return Ok(identity.clone());
    }

    let path = identity_path().context("could not determine a home directory")?;
    if let Ok(content) = std::fs::read_to_string(&path)
        && let Ok(identity) = IdentityId::new(content.trim())
    {
        return Ok(identity);
    }

    let identity = IdentityId::generate();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("could not create {}", parent.display()))?;
    }
    std::fs::write(&path, identity.as_str())
        .with_context(|| format!("could not persist identity to {}", path.display()))?;
    Ok(identity)
}

fn identity_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pact").join("identity"))
}
