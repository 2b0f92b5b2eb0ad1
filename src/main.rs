use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use enrollment::auth::TokenGenerator;
use enrollment::config::{ServerConfig, ServerConfigFile};
use enrollment::server::{AppState, create_router};
use enrollment::store::{SqliteStore, Store};
use enrollment::types::{Token, User};

const NOT_INITIALIZED: &str =
    "Server not initialized. Run 'enrollment admin init' first to create the database and admin token.";

fn create_token(
    generator: &TokenGenerator,
    is_admin: bool,
    user_id: Option<String>,
) -> anyhow::Result<(Token, String)> {
    let (raw_token, lookup, hash) = generator.generate()?;
    let token = Token {
        id: Uuid::new_v4().to_string(),
        token_hash: hash,
        token_lookup: lookup,
        is_admin,
        user_id,
        created_at: Utc::now(),
        expires_at: None,
        last_used_at: None,
    };
    Ok((token, raw_token))
}

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "enrollment")]
#[command(about = "School enrollment server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML file with host, port and data_dir; flags override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind to [default: 127.0.0.1]
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to [default: 8080]
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database [default: ./data]
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database and admin token)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Create a parent account and print a token for it
    CreateUser {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Email address of the account
        #[arg(long)]
        email: String,

        /// Name shown in the dashboard
        #[arg(long)]
        display_name: Option<String>,
    },
}

fn open_initialized_store(config: &ServerConfig) -> anyhow::Result<SqliteStore> {
    let db_path = config.db_path();
    if !db_path.exists() {
        bail!(NOT_INITIALIZED);
    }

    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;
    if !store.has_admin_token()? {
        bail!(NOT_INITIALIZED);
    }
    Ok(store)
}

fn print_token_banner(heading: &str, raw_token: &str) {
    println!();
    println!("========================================");
    println!("{heading}");
    println!();
    println!("  {raw_token}");
    println!();
    println!("========================================");
    println!();
}

fn run_init(data_dir: PathBuf) -> anyhow::Result<()> {
    let config = ServerConfig {
        data_dir,
        ..ServerConfig::default()
    };
    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating {}", config.data_dir.display()))?;

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    let token_file = config.admin_token_path();

    if store.has_admin_token()? {
        bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    }

    let generator = TokenGenerator::new();
    let (token, raw_token) = create_token(&generator, true, None)?;

    store.create_token(&token)?;
    fs::write(&token_file, &raw_token)?;

    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    print_token_banner("Admin token (save this, it won't be shown again):", &raw_token);
    println!("Token also written to: {}", token_file.display());

    Ok(())
}

fn run_create_user(
    data_dir: PathBuf,
    email: String,
    display_name: Option<String>,
) -> anyhow::Result<()> {
    let config = ServerConfig {
        data_dir,
        ..ServerConfig::default()
    };
    let store = open_initialized_store(&config)?;

    let email = email.trim().to_lowercase();
    if store.get_user_by_email(&email)?.is_some() {
        bail!("A user with email '{email}' already exists");
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.clone(),
        display_name,
        created_at: now,
        updated_at: now,
    };
    store.create_user(&user)?;

    let (token, raw_token) = create_token(&TokenGenerator::new(), false, Some(user.id.clone()))?;
    store.create_token(&token)?;

    println!("Created user '{email}' ({})", user.id);
    print_token_banner("User token:", &raw_token);

    Ok(())
}

async fn run_serve(
    config_file: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let base = match config_file {
        Some(path) => ServerConfig::from_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ServerConfig::default(),
    };
    let config = base.merge(ServerConfigFile {
        host,
        port,
        data_dir,
    });

    let store = open_initialized_store(&config)?;
    info!(
        "Admin token available at {}",
        config.admin_token_path().display()
    );

    let state = Arc::new(AppState::new(Arc::new(store)));
    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("enrollment=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { data_dir } => run_init(data_dir)?,
            AdminCommands::CreateUser {
                data_dir,
                email,
                display_name,
            } => run_create_user(data_dir, email, display_name)?,
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
        } => run_serve(config, host, port, data_dir).await?,
    }

    Ok(())
}
