//! `emberd`'s subcommands, grounded in the teacher's `clap`-derived
//! `Args`/`Command` shape (`neomind-cli::main`) — one `serve` subcommand
//! plus the administrative `user`/`rules` subcommands a running server
//! doesn't itself expose over RPC.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "emberd")]
#[command(author, version, about = "ember home automation server", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding ember.db and ember.toml.
    #[arg(long, global = true, default_value = "./ember-data")]
    pub data_dir: PathBuf,

    /// Emit structured JSON logs instead of the human-readable format.
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the JSON-RPC server and its transports.
    Serve {
        /// Address for the newline-delimited-JSON TCP transport.
        #[arg(long, default_value = "0.0.0.0:7890")]
        tcp_bind: SocketAddr,
        /// Address for the WebSocket transport (also serves /introspect and /metrics).
        #[arg(long, default_value = "0.0.0.0:7891")]
        ws_bind: SocketAddr,
    },
    /// User account administration.
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    /// Rule set import/export.
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Create a user account.
    Create { username: String, password: String },
    /// List registered usernames.
    List,
    /// Remove a user and revoke every token it owns.
    Remove { username: String },
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// Print every persisted rule as JSON.
    List,
    /// Write the full rule set (and its trigger history) to a JSON file.
    Export { path: PathBuf },
    /// Replace the persisted rule set with the contents of a JSON file.
    Import { path: PathBuf },
}
