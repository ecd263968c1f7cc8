//! STOMP 1.2 frame encoding and decoding.
//!
//! ```text
//! COMMAND\n
//! name:value\n
//! ...\n
//! \n
//! body^@
//! ```
//!
//! Header names and values are escaped (`\\`, `\n`, `\r`, `\c`) on every
//! frame except `CONNECT` and `CONNECTED`. Bare EOLs between frames are
//! heart-beats and are skipped.

use std::fmt;
use std::io::{self, BufRead, ErrorKind, Write};
use std::str::FromStr;

use crate::bus::BusError;

/// A STOMP command, client or server side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    /// The connect handshake frames are sent without header escaping.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "DISCONNECT" => Command::Disconnect,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            other => {
                return Err(BusError::Protocol(format!("unknown command {:?}", other)));
            }
        };
        Ok(command)
    }
}

/// A single STOMP frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Frame {
    /// Create a frame with no headers and an empty body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Append a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append a header only when `value` is present.
    pub fn header_opt(self, name: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.header(name, value),
            None => self,
        }
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of the named header. Repeated headers keep the first.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The body as UTF-8 text.
    pub fn body_text(&self) -> Result<&str, BusError> {
        std::str::from_utf8(&self.body)
            .map_err(|e| BusError::Protocol(format!("{} body is not UTF-8: {}", self.command, e)))
    }

    /// The human-readable part of an `ERROR` frame.
    pub fn error_message(&self) -> String {
        let summary = self.get("message").unwrap_or("").trim();
        let detail = String::from_utf8_lossy(&self.body);
        let detail = detail.trim();
        match (summary.is_empty(), detail.is_empty()) {
            (false, false) if summary != detail => format!("{}: {}", summary, detail),
            (false, _) => summary.to_string(),
            (true, false) => detail.to_string(),
            (true, true) => "broker sent ERROR without details".to_string(),
        }
    }

    /// Serialize the frame, adding `content-length` for any body.
    pub fn encode(&self) -> Vec<u8> {
        let escape = self.command.escapes_headers();
        let mut out = Vec::with_capacity(64 + self.body.len());

        out.extend_from_slice(self.command.as_str().as_bytes());
        out.push(b'\n');

        for (name, value) in &self.headers {
            if name == "content-length" {
                continue;
            }
            push_header_part(&mut out, name, escape);
            out.push(b':');
            push_header_part(&mut out, value, escape);
            out.push(b'\n');
        }

        if !self.body.is_empty() {
            out.extend_from_slice(format!("content-length:{}\n", self.body.len()).as_bytes());
        }

        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(0);
        out
    }

    /// Write the encoded frame and flush.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.encode())?;
        writer.flush()
    }
}

fn push_header_part(out: &mut Vec<u8>, text: &str, escape: bool) {
    if !escape {
        out.extend_from_slice(text.as_bytes());
        return;
    }
    for byte in text.bytes() {
        match byte {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b':' => out.extend_from_slice(b"\\c"),
            other => out.push(other),
        }
    }
}

fn unescape(raw: &str) -> Result<String, BusError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(BusError::Protocol(format!(
                    "invalid header escape sequence \\{}",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}

/// Reads one line including its `\n`. Returns an empty vec at end of stream.
fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    Ok(line)
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn unexpected_eof() -> BusError {
    BusError::Io(io::Error::new(
        ErrorKind::UnexpectedEof,
        "stream ended in the middle of a frame",
    ))
}

/// Decodes a single frame from the stream.
///
/// If the stream is closed before a frame starts, `None` is returned.
pub fn read_frame<R: BufRead>(reader: &mut R) -> Result<Option<Frame>, BusError> {
    // Skip heart-beats.
    let command_line = loop {
        let line = read_line(reader)?;
        if line.is_empty() {
            return Ok(None);
        }
        let trimmed = trim_eol(&line);
        if !trimmed.is_empty() {
            break trimmed.to_vec();
        }
    };

    let command_text = std::str::from_utf8(&command_line)
        .map_err(|_| BusError::Protocol("command line is not UTF-8".to_string()))?;
    let command: Command = command_text.parse()?;
    let escape = command.escapes_headers();

    let mut headers: Vec<(String, String)> = Vec::new();
    loop {
        let line = read_line(reader)?;
        if line.is_empty() {
            return Err(unexpected_eof());
        }
        let line = trim_eol(&line);
        if line.is_empty() {
            break;
        }

        let line = std::str::from_utf8(line)
            .map_err(|_| BusError::Protocol(format!("{} header is not UTF-8", command)))?;
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| BusError::Protocol(format!("malformed header line {:?}", line)))?;

        let (name, value) = if escape {
            (unescape(name)?, unescape(value)?)
        } else {
            (name.to_string(), value.to_string())
        };

        if !headers.iter().any(|(k, _)| *k == name) {
            headers.push((name, value));
        }
    }

    let content_length = match headers.iter().find(|(k, _)| k == "content-length") {
        Some((_, v)) => Some(v.trim().parse::<usize>().map_err(|_| {
            BusError::Protocol(format!("invalid content-length {:?}", v))
        })?),
        None => None,
    };

    let body = match content_length {
        Some(len) => {
            let mut body = vec![0_u8; len];
            reader.read_exact(&mut body).map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => unexpected_eof(),
                _ => BusError::Io(e),
            })?;
            let mut terminator = [0_u8; 1];
            reader.read_exact(&mut terminator).map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => unexpected_eof(),
                _ => BusError::Io(e),
            })?;
            if terminator[0] != 0 {
                return Err(BusError::Protocol(
                    "frame body longer than content-length".to_string(),
                ));
            }
            body
        }
        None => {
            let mut body = Vec::new();
            reader.read_until(0, &mut body)?;
            if body.pop() != Some(0) {
                return Err(unexpected_eof());
            }
            body
        }
    };

    Ok(Some(Frame {
        command,
        headers,
        body,
    }))
}
