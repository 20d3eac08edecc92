use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_EPILOG: &str = r#"Server options can also be provided via environment variables:
  CONFIG_PATH       (default: ./config.yaml)
  PORT              (default: 5151 or config.listen_port)
  DB_PATH           (sqlite backend, overrides backend.db_path)
  SUPABASE_URL      (supabase backend, overrides backend.url)
  SUPABASE_ANON_KEY (supabase backend, overrides backend.anon_key)
  RUST_LOG          (default: info)
"#;

#[derive(Debug, Parser)]
#[command(
    name = "donasiin-server",
    version,
    about = "donaSIIN donation tracking server",
    long_about = None,
    after_long_help = HELP_EPILOG,
)]
pub struct Cli {
    /// Optional subcommand. Without one, runs the server.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load and validate the config, then print a short summary
    CheckConfig {
        /// Config file to check (defaults to CONFIG_PATH or ./config.yaml)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print a bcrypt hash for a `users[].password_hash` entry
    HashPassword {
        /// Password to hash
        password: String,
        /// bcrypt cost factor
        #[arg(long, default_value_t = bcrypt::DEFAULT_COST)]
        cost: u32,
    },
}
