use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "restbase")]
#[command(about = "restbase CLI: compile and run PostgREST-style queries")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ./restbase.toml when present)
    #[arg(short, long, global = true, env = "RESTBASE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level filter; RUST_LOG takes precedence
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a query string to SQL without touching the database
    Compile(CompileArgs),
    /// Run a query string inside a row-level-security transaction
    Query(QueryArgs),
    /// Check database connectivity
    Ping,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum StatementKind {
    #[default]
    Select,
    Count,
    Explain,
}

#[derive(clap::Args)]
pub struct CompileArgs {
    /// Table to query
    pub table: String,
    /// Query string, e.g. 'select=id,title&done=is.false&order=id.desc'
    #[arg(default_value = "")]
    pub query: String,
    /// Schema qualifying the table
    #[arg(long)]
    pub schema: Option<String>,
    /// Statement to compile
    #[arg(long, default_value = "select")]
    pub kind: StatementKind,
    /// Column type as NAME:TYPE, e.g. --column id:integer (repeatable)
    #[arg(long = "column", value_name = "NAME:TYPE")]
    pub columns: Vec<String>,
}

#[derive(clap::Args)]
pub struct QueryArgs {
    /// Table to query
    pub table: String,
    /// Query string, e.g. 'select=id,title&done=is.false&order=id.desc'
    #[arg(default_value = "")]
    pub query: String,
    /// Schema qualifying the table
    #[arg(long)]
    pub schema: Option<String>,
    /// Verified JWT claims as JSON; omitted means anonymous
    #[arg(long)]
    pub claims: Option<String>,
    /// Column type as NAME:TYPE, e.g. --column id:integer (repeatable)
    #[arg(long = "column", value_name = "NAME:TYPE")]
    pub columns: Vec<String>,
}
