use std::error::Error;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use engine::{BalanceSummary, CreateExpenseCmd, Currency, Engine, GroupRole, MoneyCents};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "splitia_admin")]
#[command(about = "Admin utilities for Splitia (bootstrap users/groups, inspect balances)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./splitia.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Group(Group),
    Expense(Expense),
    /// Print balances of a user, in one group or across all of them.
    Balances(BalancesArgs),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    display_name: Option<String>,
}

#[derive(Args, Debug)]
struct Group {
    #[command(subcommand)]
    command: GroupCommand,
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    Create(GroupCreateArgs),
    AddMember(GroupAddMemberArgs),
}

#[derive(Args, Debug)]
struct GroupCreateArgs {
    #[arg(long)]
    admin: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    currency: String,
}

#[derive(Args, Debug)]
struct GroupAddMemberArgs {
    #[arg(long)]
    group: Uuid,
    /// Acting admin.
    #[arg(long)]
    admin: String,
    #[arg(long)]
    user: String,
    /// MEMBER, GUEST or ASSISTANT.
    #[arg(long, default_value = "MEMBER")]
    role: String,
}

#[derive(Args, Debug)]
struct Expense {
    #[command(subcommand)]
    command: ExpenseCommand,
}

#[derive(Subcommand, Debug)]
enum ExpenseCommand {
    /// Record an expense split equally between every financial member.
    Add(ExpenseAddArgs),
}

#[derive(Args, Debug)]
struct ExpenseAddArgs {
    #[arg(long)]
    group: Uuid,
    /// Payer, also recorded as creator.
    #[arg(long)]
    user: String,
    /// Decimal amount, e.g. `12.50` or `12,5`.
    #[arg(long)]
    amount: String,
    #[arg(long)]
    currency: String,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
struct BalancesArgs {
    #[arg(long)]
    user: String,
    #[arg(long)]
    group: Option<Uuid>,
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn print_balances(summaries: &[BalanceSummary]) {
    if summaries.is_empty() {
        println!("no balances");
        return;
    }
    for summary in summaries {
        let currency = summary.currency;
        println!(
            "{currency}: net {} (owed {}, owing {})",
            summary.net_balance.display_with(currency),
            summary.total_owed.display_with(currency),
            summary.total_owing.display_with(currency),
        );
        for balance in &summary.balances {
            println!(
                "  {:<20} {:>14}",
                balance.user_id,
                balance.amount.display_with(currency)
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            let display_name = args.display_name.as_deref().unwrap_or(&args.id);
            engine.create_user(&args.id, display_name).await?;
            println!("created user: {}", args.id);
        }
        Command::Group(Group {
            command: GroupCommand::Create(args),
        }) => {
            let currency = Currency::try_from(args.currency.as_str())?;
            let group = engine.create_group(&args.name, currency, &args.admin).await?;
            println!("created group: {} ({})", group.name, group.id);
        }
        Command::Group(Group {
            command: GroupCommand::AddMember(args),
        }) => {
            let role = GroupRole::try_from(args.role.to_ascii_uppercase().as_str())?;
            engine
                .add_member(args.group, &args.user, role, &args.admin)
                .await?;
            println!("added {} as {}", args.user, role.as_str());
        }
        Command::Expense(Expense {
            command: ExpenseCommand::Add(args),
        }) => {
            let amount: MoneyCents = args.amount.parse()?;
            let currency = Currency::try_from(args.currency.as_str())?;
            let mut cmd =
                CreateExpenseCmd::new(args.group, &args.user, amount, currency, Utc::now());
            cmd.description = args.description;
            let expense = engine.create_expense(cmd).await?;
            println!(
                "created expense: {} ({})",
                expense.amount.display_with(currency),
                expense.id
            );
        }
        Command::Balances(args) => {
            let summaries = match args.group {
                Some(group_id) => engine.group_balances(group_id, &args.user).await?,
                None => engine.user_balances(&args.user).await?,
            };
            print_balances(&summaries);
        }
    }

    Ok(())
}
