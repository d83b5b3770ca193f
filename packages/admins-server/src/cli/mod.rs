mod accounts;

pub use accounts::AccountCommands;

use clap::{Parser, Subcommand};

/// Admin account and session service
#[derive(Parser)]
#[command(name = "admins-server")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the server (default)
    Serve,

    /// Administrator account commands
    #[command(subcommand)]
    Account(AccountCommands),
}
