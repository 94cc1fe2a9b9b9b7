use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
use commands::{
    config::load_config, handle_config_command, handle_token_command, handle_users_command,
    ConfigCommands, TokenCommands, UsersCommands,
};

#[derive(Parser)]
#[command(name = "warden-cli")]
#[command(about = "Warden CLI - user, token and configuration management for the Warden gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database URL (overrides DATABASE_URL and store.database_url)
    #[arg(long)]
    database: Option<String>,

    /// Path to config file
    #[arg(long, env = "WARDEN_CONFIG", default_value = "config/config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// User Management
    #[command(subcommand)]
    Users(UsersCommands),

    /// Bearer Token Tools
    #[command(subcommand)]
    Token(TokenCommands),

    /// Configuration Management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Users(cmd) => {
            let database_url = match cli.database.or_else(|| std::env::var("DATABASE_URL").ok()) {
                Some(url) => url,
                None => load_config(&cli.config)?.store.database_url,
            };
            handle_users_command(cmd, &database_url).await?;
        }
        Commands::Token(cmd) => handle_token_command(cmd, &cli.config)?,
        Commands::Config(cmd) => handle_config_command(cmd)?,
    }

    Ok(())
}
