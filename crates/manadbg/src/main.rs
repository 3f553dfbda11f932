use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use manadbg_core::prelude::{default_factory, NoSymbols, ProcessId, Session, SessionConfig};
use manadbg_protocol::{MiServer, MiWriter};
use manadbg_utils::{info, init_logging, DebuggerConfig, LogFormat, LogLevel};

/// A GDB/MI debugger backend for managed (.NET Core) processes.
#[derive(Parser, Debug)]
#[command(name = "manadbg")]
#[command(version)]
#[command(about = "A GDB/MI debugger backend for managed (.NET Core) processes", long_about = None)]
struct Cli
{
    /// Process ID (PID) of the managed process to attach to
    #[arg(long, value_name = "PID")]
    attach: u32,

    /// Front-end protocol spoken on stdin/stdout
    #[arg(long, value_enum, default_value_t = Interpreter::Mi)]
    interpreter: Interpreter,

    /// Abort function evaluations that run longer than this
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    eval_timeout_ms: Option<u64>,

    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Log format (pretty or json)
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Write logs to this file (or a dated file in this directory) instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Interpreter
{
    /// GDB machine interface
    Mi,
}

impl Cli
{
    /// Layer the command-line flags over `config`.
    fn apply(&self, mut config: DebuggerConfig) -> DebuggerConfig
    {
        if let Some(ms) = self.eval_timeout_ms {
            config.eval_timeout = Duration::from_millis(ms);
        }
        if self.log_level.is_some() {
            config.log_level = self.log_level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(file) = &self.log_file {
            config.log_file = Some(file.clone());
        }
        config
    }
}

fn session_config(config: &DebuggerConfig) -> SessionConfig
{
    SessionConfig {
        eval_timeout: config.eval_timeout,
        exit_poll_interval: config.exit_poll_interval,
        exit_wait_limit: config.exit_wait_limit,
    }
}

fn main()
{
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => process::exit(report_usage(&err)),
    };

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Print a parse failure (or help and version text) and pick the exit code.
fn report_usage(err: &clap::Error) -> i32
{
    if err.print().is_err() {
        eprintln!("{err}");
    }
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>>
{
    let config = cli.apply(DebuggerConfig::from_env()?);
    let _guard = init_logging(config.log_level, config.log_format, config.log_file.as_deref())?;

    info!("Attaching to process {} ({:?} interpreter)", cli.attach, cli.interpreter);
    let factory = default_factory()?;
    let output = Arc::new(MiWriter::new(io::stdout()));
    let mut session = Session::attach(
        factory.as_ref(),
        ProcessId::from(cli.attach),
        Box::new(NoSymbols),
        output.clone(),
        session_config(&config),
    )?;

    MiServer::new(io::stdin().lock(), output).run(&mut session)?;
    info!("Session ended");
    Ok(())
}
