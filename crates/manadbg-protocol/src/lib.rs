//! # manadbg-protocol
//!
//! GDB machine-interface (MI) front-end for the manadbg engine.
//!
//! Front-ends (IDEs) send one request per line and read replies and
//! asynchronous records back:
//!
//! ```text
//! (gdb)
//! 1-break-insert Program.cs:10
//! 1^done,bkpt={number="1",type="breakpoint",disp="keep",enabled="y",addr="<PENDING>",pending="Program.cs:10",times="0",original-location="Program.cs:10"}
//! (gdb)
//! 2-exec-continue
//! 2^done
//! *stopped,reason="breakpoint-hit",thread-id="101",stopped-threads="all",bkptno="1",line="10",fullname="/src/App/Program.cs"
//! ```
//!
//! ## Modules
//!
//! - [`command`]: request parsing
//! - [`record`]: MI values and output records
//! - [`format`]: engine types to records
//! - [`output`]: the serialized writer, also the session's notification sink
//! - [`server`]: the command loop

pub mod command;
pub mod error;
pub mod format;
pub mod output;
pub mod record;
pub mod server;

pub use command::Command;
pub use error::{ProtocolError, Result};
pub use output::MiWriter;
pub use server::MiServer;
