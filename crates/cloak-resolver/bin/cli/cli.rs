use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENCRYPTION_KEY_ENV: &str = "CLOAK_ENCRYPTION_KEY";
pub const STORAGE_BACKEND_ENV: &str = "CLOAK_STORAGE_BACKEND";
pub const SNAPSHOT_PATH_ENV: &str = "CLOAK_SNAPSHOT_PATH";
pub const DATABASE_URL_ENV: &str = "CLOAK_DATABASE_URL";
pub const DB_CONNECT_ATTEMPTS_ENV: &str = "CLOAK_DB_CONNECT_ATTEMPTS";
pub const DB_CONNECT_DELAY_ENV: &str = "CLOAK_DB_CONNECT_DELAY_SECS";
pub const DB_QUERY_TIMEOUT_ENV: &str = "CLOAK_DB_QUERY_TIMEOUT_SECS";
pub const BASE_URL_ENV: &str = "CLOAK_BASE_URL";
pub const LOG_FORMAT_ENV: &str = "CLOAK_LOG_FORMAT";

pub const DEFAULT_SNAPSHOT_PATH: &str = "cloak-urls.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "file")]
    File,
    #[value(name = "postgres")]
    Postgres,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::File => write!(f, "file"),
            StorageBackendArg::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store a URL and print its short code
    Shorten { url: String },
    /// Resolve a short code to its destination, counting the visit
    Redirect { code: String },
    /// Show a short code's destination, creation time and visit count
    Stats { code: String },
    /// Report how many records the store holds
    Health,
}

#[derive(Debug, Parser)]
#[command(name = "cloak", about = "Encrypted short-link vault")]
pub struct CLI {
    #[command(subcommand)]
    pub command: Command,

    /// 16, 24 or 32 byte key; prefix with `hex:` to pass hex
    #[arg(long, env = ENCRYPTION_KEY_ENV, hide_env_values = true, global = true)]
    pub encryption_key: Option<String>,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::File,
        global = true
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = SNAPSHOT_PATH_ENV, default_value = DEFAULT_SNAPSHOT_PATH, global = true)]
    pub snapshot_path: PathBuf,

    #[arg(long, env = DATABASE_URL_ENV, hide_env_values = true, global = true)]
    pub database_url: Option<String>,

    #[arg(long, env = DB_CONNECT_ATTEMPTS_ENV, default_value_t = 5, global = true)]
    pub db_connect_attempts: u32,

    #[arg(long, env = DB_CONNECT_DELAY_ENV, default_value_t = 5, global = true)]
    pub db_connect_delay_secs: u64,

    #[arg(long, env = DB_QUERY_TIMEOUT_ENV, default_value_t = 5, global = true)]
    pub db_query_timeout_secs: u64,

    /// Public base URL used to print full short links
    #[arg(long, env = BASE_URL_ENV, global = true)]
    pub base_url: Option<String>,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormat::Text,
        global = true
    )]
    pub log_format: LogFormat,
}
