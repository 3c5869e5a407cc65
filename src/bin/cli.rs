use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use taskgram::authz::roles::invalid_role_combination;
use taskgram::config::parse_ttl;
use taskgram::jwt::SessionTokens;
use taskgram::models::event::NewEvent;
use taskgram::models::user::UserProfile;
use taskgram::store::{EventStore, SqliteStore, UserStore};

#[derive(Parser, Debug)]
#[command(author, version, about = "taskgram maintenance tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Insert or replace a directory user so they can log in
    SeedUser {
        #[arg(long)]
        telegram_id: i64,
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        full_name: String,
        #[arg(long, default_value = "")]
        role: String,
    },
    /// Add an entry to the team event feed
    AddEvent {
        #[arg(long)]
        title: String,
        /// Free-form date such as `01.10.2025`
        #[arg(long, default_value = "")]
        date: String,
        #[arg(long, default_value = "")]
        time_range: String,
        #[arg(long, default_value = "")]
        created_by: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Print a session token for a stored user
    IssueToken {
        #[arg(long)]
        telegram_id: i64,
        /// Token lifetime such as `1h` or `7d`; defaults to JWT_TTL
        #[arg(long)]
        ttl: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::SeedUser {
            telegram_id,
            username,
            full_name,
            role,
        } => {
            if invalid_role_combination(&role) {
                anyhow::bail!("developer role cannot be combined with an administrator role");
            }

            let store = SqliteStore::new(get_pool().await?);
            let username = username.trim().trim_start_matches('@').to_string();
            let user = store
                .upsert_user(&UserProfile {
                    telegram_id,
                    first_name: String::new(),
                    last_name: String::new(),
                    username,
                    photo_url: String::new(),
                    full_name,
                    date_of_birthday: String::new(),
                    phone_number: String::new(),
                    role,
                    may_to_open: false,
                })
                .await?;
            println!("Seeded user {} (@{}) role={:?}", user.telegram_id, user.username, user.role);
        }
        Commands::AddEvent {
            title,
            date,
            time_range,
            created_by,
            description,
        } => {
            if title.trim().is_empty() {
                anyhow::bail!("event title must not be empty");
            }

            let store = SqliteStore::new(get_pool().await?);
            let event = store
                .create_event(&NewEvent {
                    title: title.trim().to_string(),
                    date,
                    time_range,
                    created_by,
                    description,
                })
                .await?;
            println!("Added event {} ({})", event.id, event.title);
        }
        Commands::IssueToken { telegram_id, ttl } => {
            let secret = std::env::var("JWT_SECRET").context("JWT_SECRET not set")?;
            let ttl = parse_ttl(&ttl.or_else(|| std::env::var("JWT_TTL").ok()).unwrap_or_default());

            let store = SqliteStore::new(get_pool().await?);
            let user = store
                .user_by_telegram_id(telegram_id)
                .await?
                .with_context(|| format!("user {telegram_id} not found"))?;

            let token = SessionTokens::new(secret, ttl).issue(user.telegram_id, &user.role)?;
            println!("{token}");
        }
    }

    Ok(())
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let filename = format!("{}_{}.sql", timestamp, sanitize_name(name));
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let options: SqliteConnectOptions = database_url
        .parse()
        .with_context(|| format!("invalid DATABASE_URL: {database_url}"))?;

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options.create_if_missing(true).foreign_keys(true))
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let tracked = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'")
        .fetch_optional(pool)
        .await?;

    let applied_versions: HashSet<i64> = if tracked.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter()
            .filter_map(|row| row.try_get::<i64, _>("version").ok())
            .collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} Name", "Status", "Version");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) {
            "applied"
        } else {
            "pending"
        };
        let description = migration.description.trim();
        let name = if description.is_empty() { "unknown" } else { description };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {display}"))
}
