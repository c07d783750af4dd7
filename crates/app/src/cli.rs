//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Keystone: session-aware client for bearer-token APIs.
#[derive(Parser, Debug)]
#[command(name = "keystone", version, about)]
pub struct Cli {
    /// Configuration file (defaults to `<config dir>/keystone/config.toml`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Default tracing filter directive.
    pub const fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start a session from a credential pair issued by the login endpoint.
    Login {
        /// Access credential.
        #[arg(long)]
        access: String,
        /// Refresh credential.
        #[arg(long)]
        refresh: String,
    },

    /// Show the identity of the current session.
    Whoami {
        /// Also report whether the session holds this role.
        #[arg(long)]
        role: Option<String>,
    },

    /// GET a path.
    Get {
        /// Path relative to the base URL.
        path: String,
        /// Query parameter as `name=value`; repeatable.
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// POST a JSON body to a path.
    Post {
        /// Path relative to the base URL.
        path: String,
        /// JSON body.
        #[arg(short, long, default_value = "{}")]
        data: String,
    },

    /// PUT a JSON body to a path.
    Put {
        /// Path relative to the base URL.
        path: String,
        /// JSON body.
        #[arg(short, long, default_value = "{}")]
        data: String,
    },

    /// DELETE a path.
    Delete {
        /// Path relative to the base URL.
        path: String,
    },

    /// End the session and delete the persisted credentials.
    Logout,

    /// Check whether navigation to a route would be allowed.
    Guard {
        /// Route path.
        path: String,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))
}
