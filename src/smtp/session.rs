use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::time::Instant;

use super::error::SmtpError;
use super::transport::{BoxedIo, Connector};
use super::types::{AttemptStage, SessionState, SmtpEvent, SmtpReply};

const MAX_LINE_BYTES: u64 = 4096;
const MAX_REPLY_LINES: usize = 128;

enum StreamState {
    Open(BufReader<BoxedIo>),
    Detached,
}

/// One SMTP dialogue with one host. Every exchange is bounded by the
/// smaller of the per-command timeout and what is left of the request
/// deadline.
pub(crate) struct SmtpSession {
    host: String,
    stream: StreamState,
    state: SessionState,
    events: Vec<SmtpEvent>,
    command_timeout: Duration,
    deadline: Instant,
}

impl SmtpSession {
    pub(crate) fn new(host: &str, command_timeout: Duration, deadline: Instant) -> Self {
        Self {
            host: host.to_string(),
            stream: StreamState::Detached,
            state: SessionState::Idle,
            events: Vec::new(),
            command_timeout,
            deadline,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: SessionState) {
        self.state = next;
    }

    pub(crate) fn take_events(&mut self) -> Vec<SmtpEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) async fn open(
        &mut self,
        connector: &dyn Connector,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<(), SmtpError> {
        let budget = match self.budget(connect_timeout) {
            Ok(budget) => budget,
            Err(err) => return Err(self.fail(AttemptStage::Connect, err)),
        };
        let connected = tokio::time::timeout(budget, connector.connect(&self.host, port)).await;
        let io = match connected {
            Ok(Ok(io)) => io,
            Ok(Err(err)) => return Err(self.fail(AttemptStage::Connect, err)),
            Err(_) => {
                let err = self.elapsed(AttemptStage::Connect);
                return Err(self.fail(AttemptStage::Connect, err));
            }
        };
        tracing::trace!(host = %self.host, port, "connected");
        self.stream = StreamState::Open(BufReader::new(io));
        self.advance(SessionState::Connected);
        Ok(())
    }

    pub(crate) async fn read_greeting(&mut self) -> Result<SmtpReply, SmtpError> {
        let budget = match self.budget(self.command_timeout) {
            Ok(budget) => budget,
            Err(err) => return Err(self.fail(AttemptStage::Greeting, err)),
        };
        self.exchange(AttemptStage::Greeting, None, budget).await
    }

    /// Sends one command and waits for its reply. Message transfer commands
    /// are refused outright.
    pub(crate) async fn command(
        &mut self,
        stage: AttemptStage,
        command: &str,
    ) -> Result<SmtpReply, SmtpError> {
        if is_message_transfer(command) {
            let err = SmtpError::protocol("refusing to transfer message content");
            return Err(self.fail(stage, err));
        }
        let budget = match self.budget(self.command_timeout) {
            Ok(budget) => budget,
            Err(err) => return Err(self.fail(stage, err)),
        };
        self.exchange(stage, Some(command), budget).await
    }

    pub(crate) async fn upgrade_tls(&mut self, connector: &dyn Connector) -> Result<(), SmtpError> {
        let budget = match self.budget(self.command_timeout) {
            Ok(budget) => budget,
            Err(err) => return Err(self.fail(AttemptStage::StartTls, err)),
        };
        let StreamState::Open(reader) = std::mem::replace(&mut self.stream, StreamState::Detached)
        else {
            let err = SmtpError::protocol("session is not connected");
            return Err(self.fail(AttemptStage::StartTls, err));
        };
        // Anything buffered past the 220 was sent in the clear.
        if !reader.buffer().is_empty() {
            let err = SmtpError::protocol("unexpected data after STARTTLS reply");
            return Err(self.fail(AttemptStage::StartTls, err));
        }

        let upgraded =
            tokio::time::timeout(budget, connector.upgrade_tls(reader.into_inner(), &self.host))
                .await;
        match upgraded {
            Ok(Ok(io)) => {
                self.stream = StreamState::Open(BufReader::new(io));
                Ok(())
            }
            Ok(Err(err)) => Err(self.fail(AttemptStage::StartTls, err)),
            Err(_) => {
                let err = self.elapsed(AttemptStage::StartTls);
                Err(self.fail(AttemptStage::StartTls, err))
            }
        }
    }

    /// Best-effort RSET/QUIT, capped at `cap` regardless of the request
    /// deadline, then drops the connection.
    pub(crate) async fn finish(&mut self, cap: Duration) {
        if matches!(self.stream, StreamState::Open(_)) {
            let reset = self.state >= SessionState::SenderAccepted;
            let _ = tokio::time::timeout(cap, async {
                if reset {
                    let _ = self.exchange(AttemptStage::Rset, Some("RSET"), cap).await;
                }
                let _ = self.exchange(AttemptStage::Quit, Some("QUIT"), cap).await;
            })
            .await;
        }
        self.stream = StreamState::Detached;
        self.state = SessionState::Closed;
        tracing::trace!(host = %self.host, "session closed");
    }

    async fn exchange(
        &mut self,
        stage: AttemptStage,
        command: Option<&str>,
        budget: Duration,
    ) -> Result<SmtpReply, SmtpError> {
        let StreamState::Open(reader) = &mut self.stream else {
            return Err(self.fail(stage, SmtpError::protocol("session is not connected")));
        };
        if let Some(command) = command {
            tracing::trace!(host = %self.host, command, "C");
            self.events.push(SmtpEvent::Sent {
                stage,
                command: command.to_string(),
            });
        }

        let io = async {
            if let Some(command) = command {
                write_command(reader, command).await?;
            }
            read_reply(reader).await
        };
        let outcome = tokio::time::timeout(budget, io).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(self.elapsed(stage)),
        };

        match result {
            Ok(reply) => {
                tracing::trace!(host = %self.host, code = reply.code, "S");
                self.events.push(SmtpEvent::Received {
                    stage,
                    reply: reply.clone(),
                });
                Ok(reply)
            }
            Err(err) => Err(self.fail(stage, err)),
        }
    }

    fn budget(&self, limit: Duration) -> Result<Duration, SmtpError> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(SmtpError::DeadlineExceeded);
        }
        Ok(remaining.min(limit))
    }

    fn elapsed(&self, stage: AttemptStage) -> SmtpError {
        if Instant::now() >= self.deadline {
            SmtpError::DeadlineExceeded
        } else {
            SmtpError::Timeout { stage }
        }
    }

    fn fail(&mut self, stage: AttemptStage, err: SmtpError) -> SmtpError {
        tracing::debug!(host = %self.host, ?stage, error = %err, "SMTP step failed");
        self.events.push(SmtpEvent::Error {
            stage,
            message: err.to_string(),
        });
        err
    }
}

pub(crate) fn is_message_transfer(command: &str) -> bool {
    let verb = command.split_whitespace().next().unwrap_or_default();
    verb.eq_ignore_ascii_case("DATA") || verb.eq_ignore_ascii_case("BDAT")
}

async fn write_command(reader: &mut BufReader<BoxedIo>, command: &str) -> Result<(), SmtpError> {
    let mut data = Vec::with_capacity(command.len() + 2);
    data.extend_from_slice(command.as_bytes());
    data.extend_from_slice(b"\r\n");
    let io = reader.get_mut();
    io.write_all(&data).await.map_err(SmtpError::io)?;
    io.flush().await.map_err(SmtpError::io)
}

pub(crate) async fn read_reply(reader: &mut BufReader<BoxedIo>) -> Result<SmtpReply, SmtpError> {
    let mut lines = Vec::new();
    let mut code: Option<u16> = None;
    loop {
        if lines.len() >= MAX_REPLY_LINES {
            return Err(SmtpError::protocol("reply has too many lines"));
        }
        let line = read_line(reader).await?;
        let parsed_code = line
            .get(..3)
            .and_then(|digits| digits.parse::<u16>().ok())
            .ok_or_else(|| SmtpError::protocol(format!("invalid reply: {line}")))?;
        if let Some(existing) = code {
            if existing != parsed_code {
                return Err(SmtpError::protocol(format!(
                    "inconsistent reply codes: {existing} vs {parsed_code}"
                )));
            }
        } else {
            code = Some(parsed_code);
        }
        let is_last = line.as_bytes().get(3) != Some(&b'-');
        lines.push(line.get(4..).unwrap_or_default().to_string());
        if is_last {
            break;
        }
    }
    Ok(SmtpReply {
        code: code.unwrap_or_default(),
        lines,
    })
}

async fn read_line(reader: &mut BufReader<BoxedIo>) -> Result<String, SmtpError> {
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(MAX_LINE_BYTES)
        .read_until(b'\n', &mut buf)
        .await
        .map_err(SmtpError::io)?;
    if read == 0 {
        return Err(SmtpError::io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed",
        )));
    }
    if !buf.ends_with(b"\n") && read as u64 >= MAX_LINE_BYTES {
        return Err(SmtpError::protocol("reply line too long"));
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
