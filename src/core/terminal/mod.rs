//! Headless terminal
//!
//! Receives events from the bridge and renders them as styled spans:
//! - status lines for connection changes
//! - received data as caret-encoded text or space-delimited hex
//! - echoed sends
//!
//! In text mode with CRLF line endings, `\r\n` is shown as a plain line
//! break, including when the pair is split across two reads.

use crate::config::{LineEnding, TerminalConfig};
use crate::core::bridge::{DataBatch, SerialListener};
use crate::core::codec::{append_hex, decode_hex, to_caret_string, Codec, HexCodec};
use crate::core::session::Session;
use crate::core::transport::{TransportError, TransportTrait};

/// How a span is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStyle {
    /// Connection status
    Status,
    /// Echo of sent data
    Sent,
    /// Received data
    Received,
    /// Control character in caret notation
    Caret,
}

/// Styled run of output text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Style
    pub style: SpanStyle,
    /// Text, may contain line breaks
    pub text: String,
}

impl Span {
    fn new(style: SpanStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

/// Terminal view of the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Not connected
    Disconnected,
    /// Connect requested, no answer yet
    Pending,
    /// Connected
    Connected,
}

/// Terminal consumer bound to a session
pub struct Terminal {
    session: Session,
    newline: LineEnding,
    hex_mode: bool,
    status: LinkStatus,
    pending_newline: bool,
    output: Vec<Span>,
}

impl Terminal {
    /// Create a terminal for `session`
    pub fn new(session: Session, config: &TerminalConfig) -> Self {
        Self {
            session,
            newline: config.newline,
            hex_mode: config.hex_mode,
            status: LinkStatus::Disconnected,
            pending_newline: false,
            output: Vec::new(),
        }
    }

    /// Connection status as seen by the terminal
    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Line ending used for send and receive
    pub fn newline(&self) -> LineEnding {
        self.newline
    }

    /// Change the line ending
    pub fn set_newline(&mut self, newline: LineEnding) {
        self.newline = newline;
    }

    /// True in hex mode
    pub fn hex_mode(&self) -> bool {
        self.hex_mode
    }

    /// Switch hex mode
    pub fn set_hex_mode(&mut self, enabled: bool) {
        self.hex_mode = enabled;
    }

    /// Start connecting over `transport`
    pub fn connect(&mut self, transport: Box<dyn TransportTrait>) -> Result<(), TransportError> {
        self.push_status("connecting...");
        self.status = LinkStatus::Pending;
        if let Err(e) = self.session.connect(transport) {
            self.on_serial_connection_error(e.clone());
            return Err(e);
        }
        Ok(())
    }

    /// Drop the connection
    pub fn disconnect(&mut self) {
        self.status = LinkStatus::Disconnected;
        self.session.disconnect();
    }

    /// Send one line of input
    pub fn send(&mut self, input: &str) -> Result<(), TransportError> {
        if self.status != LinkStatus::Connected {
            return Err(TransportError::NotConnected);
        }

        let (echo, data) = if self.hex_mode {
            let mut echo = String::new();
            append_hex(&mut echo, &decode_hex(input));
            append_hex(&mut echo, self.newline.bytes());
            let data = decode_hex(&echo);
            (echo, data)
        } else {
            let data = [input.as_bytes(), self.newline.bytes()].concat();
            (input.to_string(), data)
        };

        self.output.push(Span::new(SpanStyle::Sent, echo + "\n"));
        if let Err(e) = self.session.write(&data) {
            self.on_serial_io_error(e.clone());
            return Err(e);
        }
        Ok(())
    }

    /// Take the spans rendered so far.
    ///
    /// A trailing `^M` is held back while the next read may turn it into a
    /// line break.
    pub fn take_output(&mut self) -> Vec<Span> {
        let held = if self.holds_trailing_cr() {
            self.output.pop()
        } else {
            None
        };
        let output = std::mem::take(&mut self.output);
        self.output.extend(held);
        output
    }

    /// Discard all output
    pub fn clear(&mut self) {
        self.output.clear();
        self.pending_newline = false;
    }

    fn holds_trailing_cr(&self) -> bool {
        self.pending_newline
            && matches!(self.output.last(), Some(span) if span.style == SpanStyle::Caret && span.text == "^M")
    }

    fn push_status(&mut self, text: &str) {
        self.output.push(Span::new(SpanStyle::Status, format!("{text}\n")));
    }

    fn push_received(&mut self, text: &str) {
        if !text.is_empty() {
            self.output.push(Span::new(SpanStyle::Received, text));
        }
    }

    fn receive(&mut self, batch: DataBatch) {
        for data in batch {
            if self.hex_mode {
                let hex = HexCodec::delimited(" ").encode(&data);
                self.output.push(Span::new(SpanStyle::Received, hex + "\n"));
                continue;
            }

            let mut msg = String::from_utf8_lossy(&data).into_owned();
            if self.newline == LineEnding::CrLf && !msg.is_empty() {
                msg = msg.replace("\r\n", "\n");
                if self.pending_newline && msg.starts_with('\n') && self.holds_trailing_cr() {
                    self.output.pop();
                }
                self.pending_newline = msg.ends_with('\r');
            }

            let encoded = to_caret_string(&msg, self.newline != LineEnding::None);
            let text = encoded.as_str();
            let mut at = 0;
            for range in encoded.carets() {
                self.push_received(&text[at..range.start]);
                self.output.push(Span::new(SpanStyle::Caret, &text[range.clone()]));
                at = range.end;
            }
            self.push_received(&text[at..]);
        }
    }
}

fn cause(error: &TransportError) -> String {
    match error {
        TransportError::ConnectionFailed(e) | TransportError::Io(e) => e.to_string(),
        other => other.to_string(),
    }
}

impl SerialListener for Terminal {
    fn on_serial_connected(&mut self) {
        self.push_status("connected");
        self.status = LinkStatus::Connected;
    }

    fn on_serial_connection_error(&mut self, error: TransportError) {
        self.push_status(&format!("connection failed: {}", cause(&error)));
        self.disconnect();
    }

    fn on_serial_read(&mut self, data: DataBatch) {
        self.receive(data);
    }

    fn on_serial_io_error(&mut self, error: TransportError) {
        self.push_status(&format!("connection lost: {}", cause(&error)));
        self.disconnect();
    }
}
