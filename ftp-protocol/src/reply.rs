//! Reply formatting for the control channel.
//!
//! FTP nominally runs its control connection over telnet, so any 0xFF byte
//! in a message is doubled (the IAC escape). Embedded LF bytes are rewritten
//! to NUL so a message can never fake a reply boundary.

use std::io::{self, Write};

/// Writes numeric replies to the control channel. Every method flushes:
/// clients pipeline commands and expect each reply on the wire before the
/// next command is read.
pub struct ReplyWriter<W> {
    out: W,
}

impl<W: Write> ReplyWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Single-line reply with message escaping. The message is taken as
    /// bytes so filesystem names that are not UTF-8 pass through intact.
    pub fn reply(&mut self, code: u16, message: impl AsRef<[u8]>) -> io::Result<()> {
        let message = message.as_ref();
        let mut line = Vec::with_capacity(message.len() + 8);
        write!(line, "{} ", code).expect("writing to a Vec cannot fail");
        push_escaped(&mut line, message);
        line.extend_from_slice(b"\r\n");
        self.out.write_all(&line)?;
        self.out.flush()
    }

    /// The stock success reply.
    pub fn ok(&mut self, code: u16) -> io::Result<()> {
        write!(self.out, "{} Operation successful\r\n", code)?;
        self.out.flush()
    }

    /// The stock failure reply. Deliberately terse: errno text never reaches
    /// the client.
    pub fn error(&mut self, code: u16) -> io::Result<()> {
        write!(self.out, "{} Error\r\n", code)?;
        self.out.flush()
    }

    /// Preformatted reply, written verbatim. Used for multi-line replies
    /// (HELP, STAT) and fixed one-liners.
    pub fn raw(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }

    /// The underlying writer, for payloads that share the control channel
    /// (STAT's listing lines).
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.out
    }
}

fn push_escaped(buf: &mut Vec<u8>, message: &[u8]) {
    for &b in message {
        match b {
            0xFF => buf.extend_from_slice(&[0xFF, 0xFF]),
            b'\n' => buf.push(0),
            _ => buf.push(b),
        }
    }
}
