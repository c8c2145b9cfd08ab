use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the snippetbox binary.
#[derive(Debug, Parser)]
#[command(name = "snippetbox", version, about = "Snippetbox server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "SNIPPETBOX_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Compile templates and run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Store a new snippet and print its id.
    Create(CreateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the template root directory.
    #[arg(
        long = "templates-directory",
        value_name = "PATH",
        value_hint = ValueHint::DirPath
    )]
    pub templates_directory: Option<PathBuf>,

    /// Override how many rendered bytes are buffered before the first flush.
    #[arg(long = "templates-flush-threshold-bytes", value_name = "BYTES")]
    pub templates_flush_threshold_bytes: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct CreateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Snippet title, at most 100 characters.
    #[arg(long, value_name = "TEXT")]
    pub title: String,

    /// Snippet body.
    #[arg(long, value_name = "TEXT")]
    pub content: String,

    /// Days until the snippet expires (1, 7 or 365).
    #[arg(long = "expires-days", value_name = "DAYS", default_value_t = 365)]
    pub expires_days: i64,
}
