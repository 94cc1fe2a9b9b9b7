pub mod config;
pub mod token;
pub mod users;
pub mod utils;

pub use config::{handle_config_command, ConfigCommands};
pub use token::{handle_token_command, TokenCommands};
pub use users::{handle_users_command, UsersCommands};
