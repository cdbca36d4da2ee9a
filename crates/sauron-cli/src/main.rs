//! Sauron CLI - account and session management for the Sauron API.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use sauron_auth::AuthError;
use sauron_config_and_utils::{init_logging, Config, LogConfig, Paths};
use tracing::debug;

/// Sauron CLI - Sign in and talk to the Sauron API with automatic token refresh.
#[derive(Parser)]
#[command(name = "sauron")]
#[command(about = "Sauron CLI for authentication and API access")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true, env = "SAURON_LOG_LEVEL")]
    log_level: Option<String>,

    /// API base URL
    #[arg(long, global = true, env = "SAURON_API_URL")]
    api_url: Option<String>,

    /// Also write logs to stderr
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Signup {
        /// Account email
        #[arg(short, long)]
        email: Option<String>,
        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Login with email and password
    Login {
        /// Account email
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Logout and clear session
    Logout,

    /// Show local session state
    Status,

    /// Show the current user
    Me,

    /// Update the display name
    Profile {
        /// New display name
        #[arg(short, long)]
        name: String,
    },

    /// Change the account password
    ChangePassword,

    /// Create an administrator account (admins only)
    CreateAdmin {
        /// Admin email
        #[arg(short, long)]
        email: Option<String>,
        /// Admin display name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Send an authenticated request to an API path
    Request {
        /// HTTP method (GET, POST, PUT, DELETE, ...)
        method: String,
        /// Path under the API base URL, e.g. /api/auth/me
        path: String,
        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,
    },

    /// Keep the session refreshed in the foreground until Ctrl-C
    Watch,

    /// Browse and manage DSA problems
    Dsa {
        #[command(subcommand)]
        command: DsaCommands,
    },

    /// Track solved problems
    Progress {
        #[command(subcommand)]
        command: ProgressCommands,
    },

    /// Browse and manage tech products
    Products {
        #[command(subcommand)]
        command: ProductCommands,
    },

    /// Check that the API is reachable (no login needed)
    Health,
}

#[derive(Subcommand)]
enum DsaCommands {
    /// List problems
    List {
        /// Only problems of this level
        #[arg(short, long)]
        level: Option<String>,
    },
    /// Show one problem
    Show {
        /// Problem ID
        id: String,
    },
    /// Create a problem (admins only)
    Create {
        /// Problem as JSON
        #[arg(short, long)]
        body: String,
    },
    /// Update a problem (admins only)
    Update {
        /// Problem ID
        id: String,
        /// Fields to change as JSON
        #[arg(short, long)]
        body: String,
    },
    /// Delete a problem (admins only)
    Delete {
        /// Problem ID
        id: String,
    },
}

#[derive(Subcommand)]
enum ProgressCommands {
    /// Show your solved problems
    Show,
    /// Show your solve statistics
    Stats,
    /// Show the leaderboard
    Leaderboard,
    /// Mark a problem solved
    Solve {
        /// Problem ID
        problem_id: String,
        /// Problem level
        #[arg(short, long)]
        level: String,
    },
    /// Mark a problem unsolved
    Unsolve {
        /// Problem ID
        problem_id: String,
        /// Problem level
        #[arg(short, long)]
        level: String,
    },
}

#[derive(Subcommand)]
enum ProductCommands {
    /// List products
    List {
        /// Only products in this category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show one product
    Show {
        /// Product ID
        id: String,
    },
    /// Create a product (admins only)
    Create {
        /// Product as JSON
        #[arg(short, long)]
        body: String,
    },
    /// Update a product (admins only)
    Update {
        /// Product ID
        id: String,
        /// Fields to change as JSON
        #[arg(short, long)]
        body: String,
    },
    /// Delete a product (admins only)
    Delete {
        /// Product ID
        id: String,
    },
}

/// File logging at the flag's level, else the configured one.
fn log_config(paths: &Paths, config: &Config, cli: &Cli) -> LogConfig {
    LogConfig {
        service_name: "cli".into(),
        default_level: cli
            .log_level
            .clone()
            .unwrap_or_else(|| config.log_level.clone()),
        log_path: paths.log_file(),
        also_stderr: cli.verbose,
    }
}

/// Extra line printed under an error, if any applies.
fn error_hint(err: &anyhow::Error) -> Option<&'static str> {
    match err.downcast_ref::<AuthError>() {
        Some(e) if e.is_transient() => {
            Some("The API may be temporarily unavailable. Try again shortly.")
        }
        _ => None,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let paths = Paths::new()?;
    let mut config = Config::load(&paths)?;

    if let Err(e) = init_logging(&log_config(&paths, &config, &cli)) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    if let Some(url) = cli.api_url {
        config.api_base_url = url;
        config.validate()?;
    }
    debug!(api = %config.api_base(), "Configuration loaded");

    let client = commands::build_client(&paths, &config)?;
    let format = &cli.format;

    match cli.command {
        Commands::Signup { email, name } => commands::signup(&client, email, name, format).await,
        Commands::Login { email } => commands::login(&client, email, format).await,
        Commands::Logout => commands::logout(&client, format).await,
        Commands::Status => commands::status(&client, format).await,
        Commands::Me => commands::me(&client, format).await,
        Commands::Profile { name } => commands::profile(&client, &name, format).await,
        Commands::ChangePassword => commands::change_password(&client, format).await,
        Commands::CreateAdmin { email, name } => {
            commands::create_admin(&client, email, name, format).await
        }
        Commands::Request { method, path, body } => {
            commands::request(&client, &method, &path, body.as_deref(), format).await
        }
        Commands::Watch => commands::watch(&client, format).await,
        Commands::Dsa { command } => match command {
            DsaCommands::List { level } => {
                commands::dsa_list(&client, level.as_deref(), format).await
            }
            DsaCommands::Show { id } => commands::dsa_show(&client, &id, format).await,
            DsaCommands::Create { body } => commands::dsa_create(&client, &body, format).await,
            DsaCommands::Update { id, body } => {
                commands::dsa_update(&client, &id, &body, format).await
            }
            DsaCommands::Delete { id } => commands::dsa_delete(&client, &id, format).await,
        },
        Commands::Progress { command } => match command {
            ProgressCommands::Show => commands::progress_show(&client, format).await,
            ProgressCommands::Stats => commands::progress_stats(&client, format).await,
            ProgressCommands::Leaderboard => commands::progress_leaderboard(&client, format).await,
            ProgressCommands::Solve { problem_id, level } => {
                commands::progress_mark(&client, &problem_id, &level, true, format).await
            }
            ProgressCommands::Unsolve { problem_id, level } => {
                commands::progress_mark(&client, &problem_id, &level, false, format).await
            }
        },
        Commands::Products { command } => match command {
            ProductCommands::List { category } => {
                commands::products_list(&client, category.as_deref(), format).await
            }
            ProductCommands::Show { id } => commands::products_show(&client, &id, format).await,
            ProductCommands::Create { body } => {
                commands::products_create(&client, &body, format).await
            }
            ProductCommands::Update { id, body } => {
                commands::products_update(&client, &id, &body, format).await
            }
            ProductCommands::Delete { id } => commands::products_delete(&client, &id, format).await,
        },
        Commands::Health => commands::health(&client, format).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let format = cli.format;
    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e), &format);
        if let (Some(hint), output::OutputFormat::Text) = (error_hint(&e), format) {
            eprintln!("{}", hint);
        }
        std::process::exit(1);
    }
}
