//! A single synchronous STOMP connection.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::frame::{read_frame, Command, Frame};
use super::url::BrokerAddress;
use crate::bus::BusError;

/// Login and passcode sent on CONNECT.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub login: Option<String>,
    pub passcode: Option<String>,
}

impl Credentials {
    pub fn new(login: impl Into<String>, passcode: impl Into<String>) -> Self {
        Self {
            login: Some(login.into()),
            passcode: Some(passcode.into()),
        }
    }

    /// No credentials; the broker decides whether anonymous access is allowed.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("passcode", &self.passcode.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Socket behaviour of a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Limit for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Limit for any single wait on the broker (receipts, CONNECTED).
    pub io_timeout: Duration,
    /// Value of the CONNECT `host` header. Defaults to the broker host.
    pub virtual_host: Option<String>,
    /// How often the client offers to send heart-beats while idle.
    /// Zero disables them.
    pub heartbeat: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(10),
            virtual_host: None,
            heartbeat: Duration::from_secs(10),
        }
    }
}

/// An open, authenticated STOMP 1.2 connection.
///
/// Every command that changes broker state is sent with a `receipt` header
/// and blocks until the matching RECEIPT arrives. MESSAGE frames that show
/// up in the meantime are queued and handed out by [`receive`].
///
/// When the broker accepts client heart-beats, [`receive`] sends an EOL
/// whenever nothing else was written for the negotiated interval.
///
/// After an ERROR frame or a socket failure the connection is closed and
/// every further call returns [`BusError::Closed`].
///
/// [`receive`]: Connection::receive
pub struct Connection {
    address: BrokerAddress,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    pending: VecDeque<Frame>,
    io_timeout: Duration,
    next_receipt: u64,
    session: Option<String>,
    heartbeat: Option<Duration>,
    last_write: Instant,
    closed: bool,
}

impl Connection {
    /// Connect and perform the CONNECT/CONNECTED handshake.
    pub fn open(
        address: &BrokerAddress,
        credentials: &Credentials,
        options: &ConnectionOptions,
    ) -> Result<Self, BusError> {
        let stream = connect_tcp(address, options.connect_timeout)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(non_zero(options.io_timeout)))?;
        stream.set_write_timeout(Some(non_zero(options.io_timeout)))?;

        let writer = stream.try_clone()?;
        let mut connection = Self {
            address: address.clone(),
            reader: BufReader::new(stream),
            writer,
            pending: VecDeque::new(),
            io_timeout: non_zero(options.io_timeout),
            next_receipt: 0,
            session: None,
            heartbeat: None,
            last_write: Instant::now(),
            closed: false,
        };

        let host = options
            .virtual_host
            .clone()
            .unwrap_or_else(|| address.host.clone());
        let connect = Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header_opt("login", credentials.login.as_deref())
            .header_opt("passcode", credentials.passcode.as_deref())
            .header("heart-beat", format!("{},0", options.heartbeat.as_millis()));
        connection.write(&connect)?;

        match connection.read_until(Instant::now() + connection.io_timeout)? {
            Some(frame) if frame.command == Command::Connected => {
                connection.session = frame.get("session").map(str::to_string);
                connection.heartbeat = negotiate_heartbeat(options.heartbeat, frame.get("heart-beat"));
                debug!(
                    broker = %connection.address,
                    session = ?connection.session,
                    heartbeat = ?connection.heartbeat,
                    "STOMP connection established"
                );
                Ok(connection)
            }
            Some(frame) if frame.command == Command::Error => {
                connection.closed = true;
                Err(BusError::Authentication(frame.error_message()))
            }
            Some(frame) => {
                connection.closed = true;
                Err(BusError::Protocol(format!(
                    "expected CONNECTED, broker sent {}",
                    frame.command
                )))
            }
            None => {
                connection.closed = true;
                Err(BusError::ConnectionFailed(format!(
                    "{} closed the connection during the handshake",
                    address
                )))
            }
        }
    }

    /// The broker this connection talks to.
    pub fn address(&self) -> &BrokerAddress {
        &self.address
    }

    /// Session id assigned by the broker, if it sent one.
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Whether the connection can no longer be used.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Interval at which this client sends heart-beats, if the broker
    /// agreed to any.
    pub fn heartbeat(&self) -> Option<Duration> {
        self.heartbeat
    }

    /// Check, without blocking, that the broker has not dropped the
    /// connection while it sat idle.
    ///
    /// Nothing is expected from the broker between commands, so any
    /// buffered or pending input (usually an ERROR before the close) or end
    /// of stream counts as dead. A dead connection is marked closed.
    pub fn is_alive(&mut self) -> bool {
        if self.closed {
            return false;
        }
        if !self.reader.buffer().is_empty() || !self.pending.is_empty() {
            self.closed = true;
            return false;
        }

        let socket = self.reader.get_ref();
        if socket.set_nonblocking(true).is_err() {
            self.closed = true;
            return false;
        }
        let mut byte = [0_u8; 1];
        let alive = match socket.peek(&mut byte) {
            Err(e) => e.kind() == ErrorKind::WouldBlock,
            Ok(_) => false,
        };
        if socket.set_nonblocking(false).is_err() {
            self.closed = true;
            return false;
        }

        if !alive {
            self.closed = true;
        }
        alive
    }

    /// Send a persistent message to an anycast queue.
    pub fn send(
        &mut self,
        destination: &str,
        body: &str,
        transaction: Option<&str>,
    ) -> Result<(), BusError> {
        let frame = Frame::new(Command::Send)
            .header("destination", destination)
            .header("destination-type", "ANYCAST")
            .header("persistent", "true")
            .header("content-type", "text/plain;charset=utf-8")
            .header_opt("transaction", transaction)
            .with_body(body);
        self.request(frame)
    }

    pub fn begin(&mut self, transaction: &str) -> Result<(), BusError> {
        self.request(Frame::new(Command::Begin).header("transaction", transaction))
    }

    pub fn commit(&mut self, transaction: &str) -> Result<(), BusError> {
        self.request(Frame::new(Command::Commit).header("transaction", transaction))
    }

    pub fn abort(&mut self, transaction: &str) -> Result<(), BusError> {
        self.request(Frame::new(Command::Abort).header("transaction", transaction))
    }

    /// Subscribe to an anycast queue with per-message acknowledgement.
    pub fn subscribe(&mut self, id: &str, destination: &str) -> Result<(), BusError> {
        let frame = Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("subscription-type", "ANYCAST")
            .header("ack", "client-individual");
        self.request(frame)
    }

    pub fn unsubscribe(&mut self, id: &str) -> Result<(), BusError> {
        self.request(Frame::new(Command::Unsubscribe).header("id", id))
    }

    /// Acknowledge one message by the value of its `ack` header.
    pub fn ack(&mut self, ack_id: &str) -> Result<(), BusError> {
        self.request(Frame::new(Command::Ack).header("id", ack_id))
    }

    /// Reject one message by the value of its `ack` header.
    pub fn nack(&mut self, ack_id: &str) -> Result<(), BusError> {
        self.request(Frame::new(Command::Nack).header("id", ack_id))
    }

    /// Wait up to `timeout` for the next MESSAGE frame.
    pub fn receive(&mut self, timeout: Duration) -> Result<Option<Frame>, BusError> {
        if let Some(frame) = self.pending.pop_front() {
            return Ok(Some(frame));
        }
        self.ensure_open()?;

        let deadline = Instant::now() + timeout;
        loop {
            self.beat_if_due()?;
            let wake = match self.heartbeat {
                Some(interval) => deadline.min(self.last_write + interval),
                None => deadline,
            };
            if !self.wait_readable(wake)? {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                continue;
            }

            // A frame has started; give it the full I/O timeout to finish.
            let frame = match self.read_until(Instant::now() + self.io_timeout)? {
                Some(frame) => frame,
                None => {
                    self.closed = true;
                    return Err(BusError::Closed);
                }
            };

            match frame.command {
                Command::Message => return Ok(Some(frame)),
                Command::Error => return Err(self.broker_error(&frame)),
                other => trace!(command = %other, "ignoring frame while receiving"),
            }
        }
    }

    /// Send DISCONNECT, wait for its receipt and close the socket.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn disconnect(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.request(Frame::new(Command::Disconnect)) {
            debug!(broker = %self.address, error = %e, "DISCONNECT was not confirmed");
        }
        self.closed = true;
        let _ = self.writer.shutdown(Shutdown::Both);
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed {
            Err(BusError::Closed)
        } else {
            Ok(())
        }
    }

    /// Send a frame with a fresh receipt id and wait for the receipt.
    fn request(&mut self, frame: Frame) -> Result<(), BusError> {
        self.ensure_open()?;

        self.next_receipt += 1;
        let receipt = format!("rcpt-{}", self.next_receipt);
        let frame = frame.header("receipt", receipt.as_str());
        self.write(&frame)?;

        let deadline = Instant::now() + self.io_timeout;
        loop {
            let reply = match self.read_until(deadline)? {
                Some(reply) => reply,
                None => {
                    self.closed = true;
                    return Err(BusError::Closed);
                }
            };

            match reply.command {
                Command::Receipt if reply.get("receipt-id") == Some(receipt.as_str()) => {
                    return Ok(());
                }
                Command::Message => self.pending.push_back(reply),
                Command::Error => return Err(self.broker_error(&reply)),
                other => trace!(command = %other, "ignoring frame while awaiting receipt"),
            }
        }
    }

    fn broker_error(&mut self, frame: &Frame) -> BusError {
        self.closed = true;
        let message = frame.error_message();
        warn!(broker = %self.address, error = %message, "broker sent ERROR frame");
        BusError::Rejected(message)
    }

    fn write(&mut self, frame: &Frame) -> Result<(), BusError> {
        trace!(command = %frame.command, "sending frame");
        frame.write_to(&mut self.writer).map_err(|e| {
            self.closed = true;
            io_to_bus(e)
        })?;
        self.last_write = Instant::now();
        Ok(())
    }

    /// Send a heart-beat EOL if nothing was written for the interval.
    fn beat_if_due(&mut self) -> Result<(), BusError> {
        let Some(interval) = self.heartbeat else {
            return Ok(());
        };
        if self.last_write.elapsed() < interval {
            return Ok(());
        }

        trace!(broker = %self.address, "sending heart-beat");
        let written = self.writer.write_all(b"\n").and_then(|()| self.writer.flush());
        if let Err(e) = written {
            self.closed = true;
            return Err(io_to_bus(e));
        }
        self.last_write = Instant::now();
        Ok(())
    }

    /// Read one frame, failing once `deadline` has passed.
    fn read_until(&mut self, deadline: Instant) -> Result<Option<Frame>, BusError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.reader
            .get_ref()
            .set_read_timeout(Some(non_zero(remaining)))?;

        read_frame(&mut self.reader).map_err(|e| {
            // A half-read frame leaves the stream unusable.
            self.closed = true;
            match e {
                BusError::Io(io) => io_to_bus(io),
                other => other,
            }
        })
    }

    /// Block until at least one byte is buffered or `deadline` passes.
    fn wait_readable(&mut self, deadline: Instant) -> Result<bool, BusError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.reader
            .get_ref()
            .set_read_timeout(Some(non_zero(remaining)))?;

        match self.reader.fill_buf() {
            Ok([]) => {
                self.closed = true;
                Err(BusError::Closed)
            }
            Ok(_) => Ok(true),
            Err(e) if is_timeout(&e) => Ok(false),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(false),
            Err(e) => {
                self.closed = true;
                Err(BusError::Io(e))
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn connect_tcp(address: &BrokerAddress, timeout: Duration) -> Result<TcpStream, BusError> {
    let candidates = (address.host.as_str(), address.port)
        .to_socket_addrs()
        .map_err(|e| BusError::ConnectionFailed(format!("cannot resolve {}: {}", address, e)))?;

    let mut last_error = None;
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, non_zero(timeout)) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }

    Err(BusError::ConnectionFailed(match last_error {
        Some(e) => format!("{}: {}", address, e),
        None => format!("{}: no addresses resolved", address),
    }))
}

/// Client send interval from our offer and the CONNECTED `heart-beat`
/// header (`sx,sy`): the larger of the two when both are non-zero.
fn negotiate_heartbeat(offered: Duration, server: Option<&str>) -> Option<Duration> {
    let expected_by_server = server
        .and_then(|value| value.split(',').nth(1))
        .and_then(|sy| sy.trim().parse::<u64>().ok())
        .unwrap_or(0);

    if offered.is_zero() || expected_by_server == 0 {
        None
    } else {
        Some(offered.max(Duration::from_millis(expected_by_server)))
    }
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn io_to_bus(error: io::Error) -> BusError {
    if is_timeout(&error) {
        BusError::Timeout
    } else {
        BusError::Io(error)
    }
}

/// Socket timeouts of zero are rejected by the OS layer.
fn non_zero(duration: Duration) -> Duration {
    duration.max(Duration::from_millis(1))
}
