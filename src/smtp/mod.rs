//! SMTP-level mailbox probing.
//!
//! A probe walks the mail exchangers of a domain, stops after `RCPT TO`
//! and never transfers a message. Catch-all detection issues a second
//! `RCPT` for a random local part, either on a separate connection or in
//! the same session.

mod error;
mod options;
mod probe;
mod session;
mod transport;
mod types;
mod util;

pub use error::SmtpError;
pub use options::{CompiledPatterns, ReplyPatterns, SmtpProbeOptions};
pub use probe::{ProbeTarget, SmtpProber};
pub use transport::{BoxedIo, Connector, SmtpIo, TcpConnector};
pub use types::{
    AttemptStage, HostAttempt, HostOutcome, ProbeConclusion, SessionState, SmtpEvent,
    SmtpProbeOutcome, SmtpProbeReport, SmtpReply,
};
pub use util::random_local_part;
