//! Telnet IAC scanner and option negotiator.
//!
//! [`TelnetParser`] is transport-free: it takes raw bytes from the socket and
//! returns the clean application bytes plus the replies the link must send.
//! Sequences cut by a read boundary are kept and completed by the next call.

use tracing::debug;
use tracing::trace;
use tracing::warn;

pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const SE: u8 = 240;

pub const OPT_ECHO: u8 = 1;
pub const OPT_SGA: u8 = 3;
pub const OPT_TTYPE: u8 = 24;
pub const OPT_NAWS: u8 = 31;

pub const TTYPE_IS: u8 = 0;
pub const TTYPE_SEND: u8 = 1;

pub const DEFAULT_TERMINAL_TYPE: &str = "ANSI";

/// Carried-over bytes beyond this are discarded: a subnegotiation that never
/// closes must not grow without bound.
const MAX_PENDING: usize = 64 * 1024;

/// Result of scanning one read.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanOutput {
    /// Application bytes with every IAC sequence removed.
    pub data: Vec<u8>,
    /// Complete frames to send back, in the order they were generated.
    pub replies: Vec<Vec<u8>>,
    /// New remote-echo state, when this read changed it.
    pub remote_echo: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct TelnetParser {
    pending: Vec<u8>,
    terminal_type: String,
    window: (u16, u16),
    naws_enabled: bool,
    remote_echo: bool,
}

impl TelnetParser {
    pub fn new(terminal_type: impl Into<String>, cols: u16, rows: u16) -> Self {
        Self {
            pending: Vec::new(),
            terminal_type: terminal_type.into(),
            window: (cols, rows),
            naws_enabled: false,
            remote_echo: false,
        }
    }

    /// Forgets everything negotiated on the previous connection.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.naws_enabled = false;
        self.remote_echo = false;
    }

    pub fn naws_enabled(&self) -> bool {
        self.naws_enabled
    }

    pub fn remote_echo(&self) -> bool {
        self.remote_echo
    }

    pub fn window_size(&self) -> (u16, u16) {
        self.window
    }

    pub fn terminal_type(&self) -> &str {
        &self.terminal_type
    }

    /// Bytes carried over from an incomplete sequence.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Records a new window size. Returns the NAWS frame to send when the
    /// peer has asked for window-size updates.
    pub fn set_window_size(&mut self, cols: u16, rows: u16) -> Option<Vec<u8>> {
        self.window = (cols, rows);
        self.naws_enabled.then(|| naws_frame(cols, rows))
    }

    pub fn scan(&mut self, input: &[u8]) -> ScanOutput {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(input);

        let mut out = ScanOutput::default();
        let echo_before = self.remote_echo;
        let mut i = 0;

        while i < buf.len() {
            if buf[i] != IAC {
                let next = buf[i..]
                    .iter()
                    .position(|&b| b == IAC)
                    .map_or(buf.len(), |p| i + p);
                out.data.extend_from_slice(&buf[i..next]);
                i = next;
                continue;
            }

            let Some(&command) = buf.get(i + 1) else {
                break;
            };
            match command {
                IAC => {
                    out.data.push(IAC);
                    i += 2;
                }
                WILL | WONT | DO | DONT => {
                    let Some(&option) = buf.get(i + 2) else {
                        break;
                    };
                    self.negotiate(command, option, &mut out.replies);
                    i += 3;
                }
                SB => match find_subnegotiation_end(&buf, i + 2) {
                    Some(end) => {
                        let payload = unescape_iac(&buf[i + 2..end]);
                        self.subnegotiate(&payload, &mut out.replies);
                        i = end + 2;
                    }
                    None => break,
                },
                other => {
                    trace!(command = other, "Dropping telnet command");
                    i += 2;
                }
            }
        }

        if i < buf.len() {
            if buf.len() - i > MAX_PENDING {
                warn!(
                    pending = buf.len() - i,
                    "Unterminated telnet sequence exceeds limit; discarding"
                );
            } else {
                buf.drain(..i);
                self.pending = buf;
            }
        }

        if self.remote_echo != echo_before {
            out.remote_echo = Some(self.remote_echo);
        }
        out
    }

    fn negotiate(&mut self, command: u8, option: u8, replies: &mut Vec<Vec<u8>>) {
        trace!(
            command = command_name(command),
            option,
            "Telnet negotiation received"
        );
        match command {
            DO => match option {
                OPT_NAWS => {
                    replies.push(vec![IAC, WILL, option]);
                    self.naws_enabled = true;
                    replies.push(naws_frame(self.window.0, self.window.1));
                }
                OPT_TTYPE | OPT_SGA => replies.push(vec![IAC, WILL, option]),
                _ => replies.push(vec![IAC, WONT, option]),
            },
            DONT => {
                if option == OPT_NAWS {
                    self.naws_enabled = false;
                }
                replies.push(vec![IAC, WONT, option]);
            }
            WILL => match option {
                OPT_ECHO | OPT_SGA => {
                    if option == OPT_ECHO {
                        self.remote_echo = true;
                    }
                    replies.push(vec![IAC, DO, option]);
                }
                _ => replies.push(vec![IAC, DONT, option]),
            },
            WONT => {
                if option == OPT_ECHO {
                    self.remote_echo = false;
                }
                replies.push(vec![IAC, DONT, option]);
            }
            _ => {}
        }
    }

    fn subnegotiate(&mut self, payload: &[u8], replies: &mut Vec<Vec<u8>>) {
        match payload {
            [OPT_TTYPE, TTYPE_SEND, ..] => {
                debug!(terminal_type = %self.terminal_type, "Answering terminal-type request");
                let mut frame = vec![IAC, SB, OPT_TTYPE, TTYPE_IS];
                frame.extend(escape_iac(self.terminal_type.as_bytes()));
                frame.extend_from_slice(&[IAC, SE]);
                replies.push(frame);
            }
            [option, ..] => trace!(option, len = payload.len(), "Ignoring subnegotiation"),
            [] => trace!("Ignoring empty subnegotiation"),
        }
    }
}

impl Default for TelnetParser {
    fn default() -> Self {
        Self::new(DEFAULT_TERMINAL_TYPE, 80, 24)
    }
}

/// `IAC SB NAWS <cols> <rows> IAC SE`, sizes big-endian with 255 doubled.
pub fn naws_frame(cols: u16, rows: u16) -> Vec<u8> {
    let mut frame = vec![IAC, SB, OPT_NAWS];
    let [c_hi, c_lo] = cols.to_be_bytes();
    let [r_hi, r_lo] = rows.to_be_bytes();
    frame.extend(escape_iac(&[c_hi, c_lo, r_hi, r_lo]));
    frame.extend_from_slice(&[IAC, SE]);
    frame
}

/// Doubles every 255 byte so the peer reads it as data.
pub fn escape_iac(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        out.push(b);
        if b == IAC {
            out.push(IAC);
        }
    }
    out
}

fn unescape_iac(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        out.push(data[i]);
        if data[i] == IAC && data.get(i + 1) == Some(&IAC) {
            i += 2;
        } else {
            i += 1;
        }
    }
    out
}

/// Index of the `IAC` that starts the closing `IAC SE`, skipping escaped
/// `IAC IAC` pairs in the payload.
fn find_subnegotiation_end(buf: &[u8], start: usize) -> Option<usize> {
    let mut j = start;
    while j + 1 < buf.len() {
        if buf[j] == IAC {
            match buf[j + 1] {
                SE => return Some(j),
                _ => j += 2,
            }
        } else {
            j += 1;
        }
    }
    None
}

fn command_name(command: u8) -> &'static str {
    match command {
        WILL => "WILL",
        WONT => "WONT",
        DO => "DO",
        DONT => "DONT",
        _ => "?",
    }
}
