//! # Command Loop
//!
//! Reads one request per line, executes it against the [`Session`] and writes
//! the reply. The loop is synchronous: a request is fully answered before the
//! next prompt. Asynchronous records are written concurrently by the
//! dispatcher thread through the same [`MiWriter`].
//!
//! ## Lifecycle
//!
//! - Per-command failures become `^error` replies and the loop continues.
//!   So do lines that are not valid UTF-8.
//! - `gdb-exit` terminates the debuggee and ends the loop.
//! - End of input ends the loop without terminating.
//! - An I/O error on the protocol streams ends the loop with that error.
//!
//! In every case the session is shut down (detaching if still attached).
//! `^exit` is written last unless the loop failed.

use std::io::{BufRead, Write};
use std::sync::Arc;

use manadbg_core::error::DebuggerError;
use manadbg_core::session::Session;
use tracing::{debug, info, warn};

use crate::command::{split_token, Command};
use crate::error::Result;
use crate::format;
use crate::output::MiWriter;
use crate::record::{Record, Results};

/// What the loop does after a request.
enum Flow
{
    Continue,
    Exit,
}

/// MI server over a line reader and a shared writer.
pub struct MiServer<R, W>
where
    R: BufRead,
    W: Write + Send,
{
    input: R,
    output: Arc<MiWriter<W>>,
}

impl<R, W> MiServer<R, W>
where
    R: BufRead,
    W: Write + Send,
{
    /// `output` must be the writer the session reports notifications to.
    pub fn new(input: R, output: Arc<MiWriter<W>>) -> Self
    {
        Self { input, output }
    }

    /// Serve requests until `gdb-exit` or end of input.
    ///
    /// The session is shut down however the loop ends.
    ///
    /// ## Errors
    ///
    /// Only I/O errors on the protocol streams end the loop with an error.
    pub fn run(&mut self, session: &mut Session) -> Result<()>
    {
        let served = self.serve(session);
        if let Err(err) = session.shutdown() {
            warn!("Failed to shut down session: {err}");
        }
        let token = served?;
        self.output.write_record(&Record::Exit { token })?;
        Ok(())
    }

    /// The request loop; returns the token to answer `^exit` with.
    fn serve(&mut self, session: &mut Session) -> Result<String>
    {
        let mut bytes = Vec::new();

        loop {
            self.output.prompt()?;
            bytes.clear();
            if self.input.read_until(b'\n', &mut bytes)? == 0 {
                info!("End of input");
                return Ok(String::new());
            }
            let line = match std::str::from_utf8(&bytes) {
                Ok(line) => line,
                Err(_) => {
                    let lossy = String::from_utf8_lossy(&bytes);
                    let (token, _) = split_token(lossy.trim_start());
                    self.error(token, "Command is not valid UTF-8")?;
                    continue;
                }
            };
            let request = line.trim_end_matches(['\r', '\n']);
            if request.trim().is_empty() {
                continue;
            }
            debug!(target: "manadbg_protocol::wire", "-> {request}");

            let (token, text) = split_token(request);
            let command = match text.parse::<Command>() {
                Ok(command) => command,
                Err(err) => {
                    self.error(token, &err.to_string())?;
                    continue;
                }
            };

            if let Flow::Exit = self.execute(token, command, session)? {
                return Ok(token.to_string());
            }
        }
    }

    fn execute(&self, token: &str, command: Command, session: &mut Session) -> Result<Flow>
    {
        if command == Command::GdbExit {
            match session.terminate() {
                Ok(true) => {}
                Ok(false) => warn!("Debuggee did not confirm exit"),
                Err(err) => warn!("Failed to terminate debuggee: {err}"),
            }
            return Ok(Flow::Exit);
        }

        match reply(&command, session) {
            Ok(results) => self.output.write_record(&Record::Done {
                token: token.to_string(),
                results,
            })?,
            Err(err) => {
                if err.is_fatal() {
                    warn!("{command:?} failed: {err}");
                } else {
                    debug!("{command:?} failed: {err}");
                }
                self.error(token, &err.to_string())?;
            }
        }
        Ok(Flow::Continue)
    }

    fn error(&self, token: &str, message: &str) -> Result<()>
    {
        self.output.write_record(&Record::Error {
            token: token.to_string(),
            message: message.to_string(),
        })?;
        Ok(())
    }
}

/// Run `command` and build the `^done` body.
fn reply(command: &Command, session: &Session) -> std::result::Result<Results, DebuggerError>
{
    let results = match command {
        Command::ThreadInfo => format::threads(&session.threads()?, session.current_thread()),
        Command::ExecContinue => {
            session.continue_execution()?;
            Results::new()
        }
        Command::ExecInterrupt => {
            session.interrupt()?;
            Results::new()
        }
        Command::Step(mode) => {
            let plan = session.step(*mode)?;
            debug!("Stepping {mode}: {plan:?}");
            Results::new()
        }
        Command::BreakInsert { file, line } => format::breakpoint_inserted(&session.insert_breakpoint(file, *line)?),
        Command::BreakDelete(ids) => {
            for id in ids {
                session.delete_breakpoint(*id)?;
            }
            Results::new()
        }
        Command::BreakList => format::breakpoint_table(&session.breakpoints()),
        Command::StackListFrames => format::stack(&session.list_frames()?),
        Command::StackListVariables { frame } => format::variables(&session.list_variables(*frame)?),
        Command::EvaluateExpression { expression, frame } => format::evaluation(&session.evaluate(expression, *frame)?),
        Command::ReadMemoryBytes { address, count } => format::memory(*address, &session.read_memory(*address, *count)?),
        Command::GdbExit => Results::new(),
    };
    Ok(results)
}
