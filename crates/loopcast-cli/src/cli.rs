//! Command-line surface for driving a Loopcast host.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use loopcast_core::OutputShape;
use reqwest::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliResult, parse_url};
use crate::commands::logs::handle_logs;
use crate::commands::playlist::handle_prepare;
use crate::commands::session::{handle_start, handle_status, handle_stop};

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_API_URL: &str = "http://127.0.0.1:7070";

/// Parses CLI arguments and executes the requested command. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let trace_id = Uuid::new_v4().to_string();
    let result = match AppContext::new(
        cli.api_url.clone(),
        Duration::from_secs(cli.timeout),
        &trace_id,
    ) {
        Ok(ctx) => dispatch(cli, &ctx).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli, ctx: &AppContext) -> CliResult<()> {
    match cli.command {
        Command::Status => handle_status(ctx, cli.output).await,
        Command::Start(args) => handle_start(ctx, args, cli.output).await,
        Command::Stop => handle_stop(ctx, cli.output).await,
        Command::Logs(args) => handle_logs(ctx, args, cli.output).await,
        Command::Prepare(args) => handle_prepare(ctx, args, cli.output).await,
    }
}

#[derive(Parser)]
#[command(name = "loopcast", about = "Administrative CLI for a Loopcast relay host")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "LOOPCAST_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    pub(crate) api_url: Url,
    #[arg(
        long,
        global = true,
        env = "LOOPCAST_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        help = "Request timeout; starts include source transfers"
    )]
    pub(crate) timeout: u64,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Show the current or most recent session.
    Status,
    /// Resolve sources and start streaming.
    Start(StartArgs),
    /// Stop the active session.
    Stop,
    /// Print recent relay output.
    Logs(LogsArgs),
    /// Resolve sources and write the playlist without streaming.
    Prepare(PrepareArgs),
}

#[derive(Args, Clone)]
pub(crate) struct StartArgs {
    #[arg(
        long = "source",
        required = true,
        help = "Share link or local path; repeat for multiple sources"
    )]
    pub(crate) sources: Vec<String>,
    #[arg(
        long,
        env = "LOOPCAST_STREAM_KEY",
        hide_env_values = true,
        help = "Ingest stream key; prompted for when omitted on a terminal"
    )]
    pub(crate) stream_key: Option<String>,
    #[arg(long, help = "Portrait 720x1280 output")]
    pub(crate) shorts: bool,
}

impl StartArgs {
    pub(crate) const fn shape(&self) -> OutputShape {
        if self.shorts {
            OutputShape::Shorts
        } else {
            OutputShape::Normal
        }
    }
}

#[derive(Args, Clone, Default)]
pub(crate) struct LogsArgs {
    #[arg(long, help = "Only print lines newer than this log id")]
    pub(crate) since: Option<u64>,
    #[arg(long, short = 'f', help = "Keep streaming new lines")]
    pub(crate) follow: bool,
    #[arg(long, default_value_t = 5, help = "Reconnect delay while following")]
    pub(crate) retry_secs: u64,
}

#[derive(Args, Clone)]
pub(crate) struct PrepareArgs {
    #[arg(
        long = "source",
        required = true,
        help = "Share link or local path; repeat for multiple sources"
    )]
    pub(crate) sources: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}
