use chrono::{DateTime, Utc};
use clap::Subcommand;
use prettytable::{row, Table};
use std::time::Duration;
use warden_core::auth::{Claims, TokenAuthenticator};

use super::{
    config::load_config,
    utils::{print_error, print_success, CliResult},
};

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a signed token for a user id
    Issue {
        #[arg(short, long)]
        user_id: i64,

        /// Lifetime in seconds (defaults to auth.token.expiry_seconds)
        #[arg(long)]
        ttl_seconds: Option<u64>,
    },

    /// Validate a token and print its claims
    Inspect { token: String },
}

pub fn handle_token_command(command: TokenCommands, config_file: &str) -> CliResult<()> {
    let config = load_config(config_file)?;
    let tokens = TokenAuthenticator::from_config(&config.auth.token)?;

    match command {
        TokenCommands::Issue { user_id, ttl_seconds } => {
            let ttl = ttl_seconds.map_or(tokens.expiry(), Duration::from_secs);
            let claims = Claims::new(
                user_id,
                Utc::now().timestamp(),
                ttl,
                tokens.issuer(),
                tokens.audience(),
            );
            let token = tokens.issue(&claims)?;

            print_success(&format!("Token issued for user {user_id}"));
            print_claims(&claims);
            println!("\n{token}");
        }

        TokenCommands::Inspect { token } => match tokens.validate(&token) {
            Ok(claims) => {
                print_success("Token is valid");
                print_claims(&claims);
            }
            Err(e) => {
                print_error(&format!("Token rejected ({}): {e}", e.kind()));
                return Err(e.into());
            }
        },
    }

    Ok(())
}

fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map_or_else(|| secs.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

fn print_claims(claims: &Claims) {
    let mut table = Table::new();
    table.add_row(row!["Claim", "Value"]);
    table.add_row(row!["sub", claims.sub]);
    table.add_row(row!["iss", claims.iss]);
    table.add_row(row!["aud", claims.aud]);
    table.add_row(row!["iat", format_timestamp(claims.iat)]);
    table.add_row(row!["nbf", format_timestamp(claims.nbf)]);
    table.add_row(row!["exp", format_timestamp(claims.exp)]);
    table.printstd();
}

