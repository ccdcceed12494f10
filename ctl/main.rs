#![forbid(unsafe_code)]

//! `netcore-ctl`: poke a running netcore server.
//!
//! Connects to `<temp dir>/<program>.sock`, asks the server to echo a
//! greeting and to report its process id, prints both, then sends the server
//! `SIGTERM`.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use netcore_client::config::ClientConfig;
use netcore_client::paths::socket_path;
use netcore_client::{AppError, Client, Result};

/// Greeting sent with the echo request.
const GREETING: &str = "Hello!";

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "netcore-ctl",
    about = "Talk to a running netcore server over its local socket",
    version,
    long_about = None
)]
struct Cli {
    /// Name of the server program; the socket is `<temp dir>/<program>.sock`.
    program: Option<String>,

    /// Optional TOML client configuration (socket path, mode, timeouts).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Per-request deadline in milliseconds; overrides the config file.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    /// Resolve the client configuration from the arguments.
    ///
    /// The program name, when given, always decides the socket path.
    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match (&self.config, &self.program) {
            (Some(file), _) => ClientConfig::load_from_path(file)?,
            (None, Some(program)) => ClientConfig::new(socket_path(program)),
            (None, None) => return Err(AppError::Config("missing program name".into())),
        };

        if let Some(program) = &self.program {
            config.socket_path = socket_path(program);
        }
        if let Some(ms) = self.timeout_ms {
            config.timeouts.request_ms = ms;
        }
        Ok(config)
    }
}

fn main() {
    let args = Cli::parse();

    if args.program.is_none() && args.config.is_none() {
        eprintln!("missing program name");
        process::exit(1);
    }

    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("Error: {err}");
        process::exit(1);
    }

    let outcome = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))
        .and_then(|runtime| runtime.block_on(run(&args)));

    if let Err(err) = outcome {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

async fn run(args: &Cli) -> Result<()> {
    let config = args.client_config()?;
    println!("Connecting to: {}", config.socket_path.display());

    let client = Client::new(config);
    greet_and_stop(&client, &mut io::stdout(), terminate).await
}

/// Issue `echo` and `pid` concurrently and report each on its own.
///
/// A failed echo does not stop the pid branch: the server is still told to
/// terminate. The echo error is returned afterwards; when both fail the echo
/// error is printed and the pid error returned.
async fn greet_and_stop<W, F>(client: &Client, out: &mut W, terminate: F) -> Result<()>
where
    W: Write,
    F: FnOnce(i32) -> Result<()>,
{
    let (echo, pid) = tokio::join!(client.echo(GREETING), client.pid());

    let echoed = match echo {
        Ok(reply) => writeln!(out, "Echo: {reply}").map_err(AppError::from),
        Err(err) => Err(err),
    };

    let stopped = match pid {
        Ok(pid) => writeln!(out, "Server PID: {pid}")
            .map_err(AppError::from)
            .and_then(|()| terminate(pid)),
        Err(err) => Err(err),
    };

    match (echoed, stopped) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
        (Err(echo_err), Err(pid_err)) => {
            eprintln!("Error: {echo_err}");
            Err(pid_err)
        }
    }
}

#[cfg(unix)]
fn terminate(pid: i32) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid), Signal::SIGTERM)
        .map_err(|err| AppError::Io(format!("failed to signal process {pid}: {err}")))?;
    tracing::info!(pid, "sent SIGTERM to server");
    Ok(())
}

#[cfg(not(unix))]
fn terminate(pid: i32) -> Result<()> {
    tracing::warn!(pid, "process termination is only supported on unix");
    Ok(())
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
