use clap::Subcommand;
use std::path::Path;
use warden_core::config::AppConfig;

use super::utils::{mask_secret, print_error, print_info, print_success, CliError, CliResult};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to config file
        #[arg(short, long, default_value = "config/config.toml")]
        file: String,
    },

    /// Show the effective configuration (file + environment overrides)
    Show {
        /// Path to config file
        #[arg(short, long, default_value = "config/config.toml")]
        file: String,

        /// Show secrets in full
        #[arg(long)]
        show_sensitive: bool,
    },
}

pub fn handle_config_command(command: ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Validate { file } => validate_config(&file),
        ConfigCommands::Show { file, show_sensitive } => show_config(&file, show_sensitive),
    }
}

/// Loads `file` with environment overrides applied.
pub fn load_config(file: &str) -> CliResult<AppConfig> {
    AppConfig::from_file(file).map_err(|e| CliError::Config(e.to_string()))
}

fn validate_config(file: &str) -> CliResult<()> {
    if !Path::new(file).exists() {
        print_error(&format!("Configuration file not found: {file}"));
        return Err(CliError::Config(format!("File not found: {file}")));
    }

    print_info(&format!("Loading configuration from {file}..."));
    let config = load_config(file)?;

    print_info("Validating configuration...");
    config.validate().map_err(CliError::Config)?;

    print_success("Configuration is valid!");

    println!("Configuration Summary:");
    println!("  Server: {}:{}", config.server.bind_address, config.server.bind_port);
    println!(
        "  Rate limit: {}",
        if config.rate_limiter.enabled {
            format!(
                "{} requests / {}s",
                config.rate_limiter.requests_per_window, config.rate_limiter.window_seconds
            )
        } else {
            "disabled".to_string()
        }
    );
    println!(
        "  Cache: {}",
        if config.cache.enabled {
            format!("enabled (TTL {}s)", config.cache.ttl_seconds)
        } else {
            "disabled".to_string()
        }
    );
    println!("  Store: {}", config.store.database_url);

    Ok(())
}

fn show_config(file: &str, show_sensitive: bool) -> CliResult<()> {
    let config = load_config(file)?;
    let secret = |value: &str| if show_sensitive { value.to_string() } else { mask_secret(value) };

    println!("[General]");
    println!("  Environment: {}", config.environment);

    println!("\n[Server]");
    println!("  Bind: {}:{}", config.server.bind_address, config.server.bind_port);
    println!("  Max Concurrent Requests: {}", config.server.max_concurrent_requests);
    println!("  Request Timeout: {}s", config.server.request_timeout_seconds);

    println!("\n[Rate Limiter]");
    println!("  Enabled: {}", config.rate_limiter.enabled);
    println!("  Requests Per Window: {}", config.rate_limiter.requests_per_window);
    println!("  Window: {}s", config.rate_limiter.window_seconds);

    println!("\n[Authentication]");
    println!("  Token Issuer: {}", config.auth.token.issuer);
    println!("  Token Audience: {}", config.auth.token.audience());
    println!("  Token Expiry: {}s", config.auth.token.expiry_seconds);
    println!("  Token Secret: {}", secret(&config.auth.token.secret));
    println!("  Basic User: {}", config.auth.basic.user);
    println!("  Basic Password: {}", secret(&config.auth.basic.pass));

    println!("\n[Cache]");
    println!("  Enabled: {}", config.cache.enabled);
    println!("  TTL: {}s", config.cache.ttl_seconds);
    println!("  Max Entries: {}", config.cache.max_entries);

    println!("\n[Store]");
    println!("  Database URL: {}", config.store.database_url);
    println!("  Max Connections: {}", config.store.max_connections);

    println!("\n[Logging]");
    println!("  Level: {}", config.logging.level);
    println!("  Format: {}", config.logging.format);

    Ok(())
}
