use chrono::{Duration, Utc};
use clap::Subcommand;
use prettytable::{row, Table};
use warden_core::{
    auth::{
        password::{generate_invitation_token, hash_password, sha256_hex},
        Role,
    },
    store::{NewUser, SqliteStore, Store},
};

use super::utils::{print_info, print_success, print_warning, CliError, CliResult};

#[derive(Subcommand)]
pub enum UsersCommands {
    /// Create a user account
    Create {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        /// Role: user, moderator or admin
        #[arg(short, long, default_value = "user")]
        role: String,

        /// Create the account inactive and print an activation token
        #[arg(long)]
        inactive: bool,

        /// Lifetime of the activation token in hours
        #[arg(long, default_value = "72")]
        invite_ttl_hours: i64,
    },

    /// Show a user by id
    Show {
        #[arg(short, long)]
        id: i64,
    },
}

pub async fn handle_users_command(command: UsersCommands, database_url: &str) -> CliResult<()> {
    let store = SqliteStore::connect(database_url, 1).await?;
    store.ensure_schema().await?;

    let result = match command {
        UsersCommands::Create { username, email, password, role, inactive, invite_ttl_hours } => {
            let role = Role::parse(&role).ok_or_else(|| {
                CliError::General(format!("Unknown role '{role}' (user, moderator or admin)"))
            })?;
            create_user(&store, username, email, &password, role, inactive, invite_ttl_hours).await
        }
        UsersCommands::Show { id } => show_user(&store, id).await,
    };

    store.close().await;
    result
}

async fn create_user(
    store: &SqliteStore,
    username: String,
    email: String,
    password: &str,
    role: Role,
    inactive: bool,
    invite_ttl_hours: i64,
) -> CliResult<()> {
    if password.len() < 8 {
        return Err(CliError::General("Password must be at least 8 characters".to_string()));
    }

    let password_hash = hash_password(password).map_err(|e| CliError::General(e.to_string()))?;
    let user = store
        .create_user(NewUser { username, email, password_hash, role, is_active: !inactive })
        .await?;

    print_success(&format!("Created user {} (id {})", user.username, user.id));

    let mut table = Table::new();
    table.add_row(row!["ID", "Username", "Email", "Role", "Active"]);
    table.add_row(row![user.id, user.username, user.email, user.role.as_str(), user.is_active]);
    table.printstd();

    if inactive {
        let token = generate_invitation_token().map_err(|e| CliError::General(e.to_string()))?;
        let expires_at = Utc::now() + Duration::hours(invite_ttl_hours);
        store.create_invitation(user.id, &sha256_hex(&token), expires_at).await?;

        print_info(&format!("Activation token (expires {}):", expires_at.to_rfc3339()));
        println!("{token}");
        print_warning("Save this token now. Only its digest is stored.");
    }

    Ok(())
}

async fn show_user(store: &SqliteStore, id: i64) -> CliResult<()> {
    let user = store.get_user_by_id(id).await?;

    let mut table = Table::new();
    table.add_row(row!["Field", "Value"]);
    table.add_row(row!["ID", user.id]);
    table.add_row(row!["Username", user.username]);
    table.add_row(row!["Email", user.email]);
    table.add_row(row!["Role", user.role.as_str()]);
    table.add_row(row!["Active", user.is_active]);
    table.add_row(row!["Created", user.created_at.format("%Y-%m-%d %H:%M:%S UTC")]);
    table.printstd();

    Ok(())
}
