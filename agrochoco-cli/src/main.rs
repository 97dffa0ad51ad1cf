use std::sync::Arc;

use agrochoco::{
    Error, Record,
    account::{PasswordChange, change_password},
    error::GatewayError,
    field::{FieldInput, display_value},
    form::{FormController, SubmitOutcome},
    gateway::Gateway,
    list::{ListController, fetch_record},
    schema::{self, FieldKind, ID_KEY, TableSchema},
    session::{DbStore, Session},
};
use agrochoco_config::Config;
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Local session database
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// List the manageable tables
    Tables,
    /// Show one page of a table
    List {
        table: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Show a single record
    Show { table: String, id: String },
    /// Create a record from key=value pairs
    Create {
        table: String,
        #[arg(value_parser = parse_assignment)]
        values: Vec<(String, String)>,
    },
    /// Update a record from key=value pairs
    Update {
        table: String,
        id: String,
        #[arg(value_parser = parse_assignment)]
        values: Vec<(String, String)>,
    },
    /// Delete a record
    Delete {
        table: String,
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Change a password through the backend
    Password {
        table: String,
        id: String,
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
    /// Stored login
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Create the session database
    Create,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Store a token and the logged-in user
    Login {
        #[arg(long)]
        token: String,
        /// User record as JSON
        #[arg(long, default_value = "{}")]
        user: String,
    },
    /// Forget the stored session
    Logout,
    /// Print the stored user
    Show,
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

fn parse_bool(label: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "si" | "sí" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => bail!("{label}: '{other}' is not a yes/no value"),
    }
}

fn apply_values(
    form: &mut FormController<'_>,
    table: &TableSchema,
    values: Vec<(String, String)>,
) -> anyhow::Result<()> {
    for (key, raw) in values {
        let Some(field) = table.field(&key) else {
            bail!("{} has no field '{key}'", table.id);
        };
        match &field.kind {
            FieldKind::Boolean => {
                let value = parse_bool(&field.label, &raw)?;
                form.set_field(&key, Value::Bool(value))?;
            }
            FieldKind::Select { .. } => {
                form.change(&key, FieldInput::Choose(raw))?;
            }
            _ => {
                form.change(&key, FieldInput::Text(raw))?;
            }
        }
    }
    Ok(())
}

fn print_record(table: &TableSchema, record: &Record) {
    for field in &table.fields {
        println!("{:>24}: {}", field.label, display_value(table, record, field));
    }
}

fn print_outcome(outcome: SubmitOutcome) {
    match outcome {
        SubmitOutcome::Saved(Value::Null) => println!("Saved."),
        SubmitOutcome::Saved(saved) => println!("Saved. {saved}"),
        SubmitOutcome::Ignored | SubmitOutcome::Stale => println!("Nothing was saved."),
    }
}

async fn open_session(config: &Config) -> anyhow::Result<Session> {
    let store = DbStore::connect(&config.session.db_url).await?;
    Ok(Session::new(Arc::new(store)))
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Db { command } => match command {
            DbCommands::Create => {
                println!("Creating database at {}...", config.session.db_url);
                open_session(&config).await?;
                println!("Done.");
            }
        },
        Commands::Tables => {
            for table in schema::registry().tables() {
                let access = if table.read_only { "read-only" } else { "editable" };
                println!("{:<22} {:<26} {access}", table.id, table.display_name);
            }
        }
        Commands::Session { command } => {
            let session = open_session(&config).await?;
            match command {
                SessionCommands::Login { token, user } => {
                    let user: Value = serde_json::from_str(&user).context("--user must be JSON")?;
                    session.login(&token, &user).await?;
                    println!("Session stored.");
                }
                SessionCommands::Logout => {
                    session.logout().await?;
                    println!("Logged out.");
                }
                SessionCommands::Show => match session.user().await? {
                    Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
                    None => println!("Not logged in."),
                },
            }
        }
        command => {
            let gateway = Gateway::from_config(&config, open_session(&config).await?)?;
            run_table_command(command, &gateway).await?;
        }
    }
    Ok(())
}

async fn run_table_command(command: Commands, gateway: &Gateway) -> anyhow::Result<()> {
    match command {
        Commands::List { table, page } => {
            let table = schema::lookup(&table)?;
            let mut list = ListController::new(table);
            list.load(gateway).await?;
            list.set_page(page);
            for record in list.page_records() {
                println!("---");
                print_record(table, record);
            }
            println!(
                "Page {} of {} ({} records)",
                list.page(),
                list.total_pages(),
                list.records().len()
            );
        }
        Commands::Show { table, id } => {
            let table = schema::lookup(&table)?;
            let record = fetch_record(gateway, table, &id).await?;
            print_record(table, &record);
        }
        Commands::Create { table, values } => {
            let table = schema::lookup(&table)?;
            let mut form = FormController::new();
            form.open_create(table)?;
            apply_values(&mut form, table, values)?;
            print_outcome(form.submit(gateway).await?);
        }
        Commands::Update { table, id, values } => {
            let table = schema::lookup(&table)?;
            let record = fetch_record(gateway, table, &id).await?;
            let mut form = FormController::new();
            form.open_edit(table, &record)?;
            apply_values(&mut form, table, values)?;
            print_outcome(form.submit(gateway).await?);
        }
        Commands::Delete { table, id, yes } => {
            let table = schema::lookup(&table)?;
            let mut list = ListController::new(table);
            let mut target = Record::new();
            target.insert(ID_KEY.to_string(), Value::String(id));
            let pending = list.request_delete(&target)?;
            let question = format!("Delete {} {}?", table.display_name, pending.id());
            let confirmed = yes
                || inquire::Confirm::new(&question)
                    .with_default(false)
                    .prompt()?;
            if !confirmed {
                println!("Cancelled.");
                return Ok(());
            }
            list.confirm_delete(gateway, pending).await?;
            println!("Deleted. {} records remain.", list.records().len());
        }
        Commands::Password {
            table,
            id,
            current,
            new,
            confirm,
        } => {
            let table = schema::lookup(&table)?;
            let change = PasswordChange {
                current: &current,
                new: &new,
                confirmation: &confirm,
            };
            change_password(gateway, table, &id, &change).await?;
            println!("Password changed.");
        }
        Commands::Db { .. } | Commands::Tables | Commands::Session { .. } => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::WARN)
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Using default configuration: {e:#}");
        Config::default()
    });
    let result = run(cli, config).await;
    if let Err(e) = &result {
        if let Some(Error::Gateway(GatewayError::Auth { .. })) = e.downcast_ref::<Error>() {
            eprintln!("Session expired or not authorized; run `agrochoco-cli session login`.");
        }
    }
    result
}
