//! `garment`: operations CLI for a garmentd deployment.
//!
//! Works directly on the deployment's database, so it also runs while the
//! server is down. `init-config` is the only command without `-c`.

mod commands;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use garment_auth::model::CreateUser;
use garment_auth::AuthService;
use garment_sql::{SQLStore, SqliteStore};
use garmentd::ServerConfig;

use commands::init::InitOptions;

#[derive(Parser, Debug)]
#[command(name = "garment", about = "Garment ERP operations CLI")]
struct Cli {
    /// Context name or path to the server config file.
    #[arg(short = 'c', long = "config", env = "GARMENT_CONFIG", global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a new server config with a root password and a random JWT secret.
    InitConfig {
        /// Context name; the file becomes `<config-dir>/<name>.toml`.
        name: String,
        #[arg(long, default_value = garmentd::config::CONFIG_DIR)]
        config_dir: String,
        /// Default: /var/lib/garment/<name>.
        #[arg(long)]
        data_dir: Option<String>,
        #[arg(long, default_value = "0.0.0.0:8080")]
        listen: String,
        /// Root password (non-interactive, for CI/automation).
        #[arg(long)]
        password: Option<String>,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Apply pending migrations and list every applied one.
    Migrate,

    /// Run the integrity checks.
    Check {
        /// Rewrite stock balances from the movement ledger first.
        #[arg(long)]
        fix: bool,
        #[arg(long)]
        json: bool,
    },

    /// Delete transactional data.
    Reset {
        /// Required; there is no undo.
        #[arg(long)]
        yes: bool,
        /// Keep items, customers, vendors and users.
        #[arg(long)]
        keep_master_data: bool,
    },

    /// User accounts.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Grant a role to a user.
    Grant {
        username: String,
        role: String,
        /// RFC 3339 timestamp after which the grant stops counting.
        #[arg(long)]
        expires_at: Option<String>,
    },

    /// Revoke a role from a user.
    Revoke { username: String, role: String },

    /// List roles and their permissions.
    Roles,
}

#[derive(Subcommand, Debug)]
enum UserAction {
    Create {
        username: String,
        #[arg(long = "name")]
        display_name: String,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Non-interactive password.
        #[arg(long)]
        password: Option<String>,
    },
}

fn prompt_new_password(label: &str) -> anyhow::Result<String> {
    let pw = rpassword::prompt_password(format!("Enter {label} password: "))?;
    let confirm = rpassword::prompt_password(format!("Confirm {label} password: "))?;
    if pw != confirm {
        anyhow::bail!("Passwords do not match.");
    }
    if pw.is_empty() {
        anyhow::bail!("Password cannot be empty.");
    }
    Ok(pw)
}

struct Deployment {
    config: ServerConfig,
    db: Arc<dyn SQLStore>,
}

/// Load the config named by `-c` and open its database without migrating.
fn open(config: Option<&str>) -> anyhow::Result<Deployment> {
    let name = config.context("no config given; pass -c <name-or-path> or set GARMENT_CONFIG")?;
    let config = ServerConfig::load(&ServerConfig::resolve_path(name))?;
    std::fs::create_dir_all(&config.storage.data_dir)?;
    let path = config.sqlite_path();
    let db = SqliteStore::open(&path).with_context(|| format!("opening {}", path.display()))?;
    Ok(Deployment { config, db: Arc::new(db) })
}

/// Open and bring the schema up to date; every command but `migrate` wants this.
fn open_migrated(config: Option<&str>) -> anyhow::Result<Deployment> {
    let d = open(config)?;
    garmentd::registry::migrate_all(d.db.as_ref())?;
    Ok(d)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::InitConfig { name, config_dir, data_dir, listen, password, force } => {
            let data_dir = data_dir.unwrap_or_else(|| format!("/var/lib/garment/{name}"));
            let password = match password {
                Some(p) if p.is_empty() => anyhow::bail!("Password cannot be empty."),
                Some(p) => p,
                None => prompt_new_password("root")?,
            };
            commands::init::init_config(&InitOptions {
                name: &name,
                config_dir: &config_dir,
                data_dir: &data_dir,
                listen: &listen,
                root_password: &password,
                force,
            })?;
        }

        Commands::Migrate => {
            let d = open(config)?;
            commands::store::migrate(d.db.as_ref())?;
        }

        Commands::Check { fix, json } => {
            let d = open_migrated(config)?;
            let report = commands::store::check(d.db, fix, json)?;
            if report.errors > 0 {
                std::process::exit(1);
            }
        }

        Commands::Reset { yes, keep_master_data } => {
            if !yes {
                anyhow::bail!("reset deletes data; pass --yes to confirm");
            }
            let d = open_migrated(config)?;
            commands::store::reset(d.db.as_ref(), keep_master_data)?;
        }

        Commands::User { action } => match action {
            UserAction::Create { username, display_name, department, email, password } => {
                let d = open_migrated(config)?;
                let password = match password {
                    Some(p) => p,
                    None => prompt_new_password(&username)?,
                };
                let svc = AuthService::new(d.db, d.config.auth_config());
                commands::access::create_user(
                    &svc,
                    CreateUser { username, display_name, password, department, email },
                )?;
            }
        },

        Commands::Grant { username, role, expires_at } => {
            let d = open_migrated(config)?;
            let svc = AuthService::new(d.db, d.config.auth_config());
            commands::access::grant(&svc, &username, &role, expires_at)?;
        }

        Commands::Revoke { username, role } => {
            let d = open_migrated(config)?;
            let svc = AuthService::new(d.db, d.config.auth_config());
            commands::access::revoke(&svc, &username, &role)?;
        }

        Commands::Roles => {
            let d = open_migrated(config)?;
            let svc = AuthService::new(d.db, d.config.auth_config());
            commands::access::roles(&svc)?;
        }
    }

    Ok(())
}
