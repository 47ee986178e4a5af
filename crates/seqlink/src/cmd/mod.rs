use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use seqlink_transport::Endpoint;

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a loopback device that echoes every frame back.
    Echo(EchoArgs),
    /// Send one request and print its reply.
    Send(SendArgs),
    /// Print pushes emitted by a device.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => block_on(echo::run(args)),
        Command::Send(args) => block_on(send::run(args, format)),
        Command::Listen(args) => block_on(listen::run(args, format)),
        Command::Version(args) => version::run(args),
    }
}

fn block_on<F>(future: F) -> CliResult<i32>
where
    F: Future<Output = CliResult<i32>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime startup failed", err))?;
    runtime.block_on(future)
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Endpoint to bind (`host:port` or `unix:/path`).
    pub endpoint: Endpoint,
    /// Also emit a push frame at this interval (e.g. 500ms, 2s).
    #[arg(long, value_name = "DURATION")]
    pub push_interval: Option<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Device endpoint (`host:port` or `unix:/path`).
    pub endpoint: Endpoint,
    /// Request body as hex (e.g. 0a0b0c).
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Request body as a UTF-8 string.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Read the request body from a file.
    #[arg(long, conflicts_with_all = ["hex", "data"])]
    pub file: Option<PathBuf>,
    /// Maximum time to wait for the reply (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Device endpoint (`host:port` or `unix:/path`).
    pub endpoint: Endpoint,
    /// Exit after receiving N pushes.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `2s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}
