//! Command-line framing and parsing for the control channel.

use std::io::{self, BufRead, Read};

use crate::protocol::fold_verb;

/// Longest command line accepted in one read, terminator included. A peer
/// sending more gets the first 8 KiB treated as the command; the remainder
/// parses as further (garbage) commands and earns 500 replies.
pub const MAX_COMMAND_LEN: u64 = 8 * 1024;

/// One parsed control-channel command.
///
/// `token` is the folded dispatch token (see [`fold_verb`]); `verb` keeps the
/// bytes as received, for logging. `arg` is everything after the first space,
/// and is `None` when no space was present at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub token: u32,
    pub verb: String,
    pub arg: Option<String>,
}

/// Reads CRLF-terminated commands from the control channel.
pub struct CommandReader<R> {
    input: R,
}

impl<R: BufRead> CommandReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    /// Read the next command. Returns `Ok(None)` at end of stream, which is
    /// the orderly way for a client to leave without QUIT.
    pub fn read_command(&mut self) -> io::Result<Option<Command>> {
        let mut line = Vec::new();
        let n = (&mut self.input)
            .take(MAX_COMMAND_LEN)
            .read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(None);
        }

        if line.last() == Some(&b'\n') {
            line.pop();
        }
        // Tolerate clients that send more than one CR before the LF.
        while line.last() == Some(&b'\r') {
            line.pop();
        }

        Ok(Some(parse_line(&line)))
    }
}

fn parse_line(line: &[u8]) -> Command {
    let (verb, arg) = match line.iter().position(|&b| b == b' ') {
        Some(i) => (&line[..i], Some(&line[i + 1..])),
        None => (&line[..], None),
    };

    Command {
        token: fold_verb(verb),
        verb: String::from_utf8_lossy(verb).into_owned(),
        arg: arg.map(|a| String::from_utf8_lossy(a).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::verb;

    fn read_all(input: &[u8]) -> Vec<Command> {
        let mut reader = CommandReader::new(input);
        let mut commands = Vec::new();
        while let Some(cmd) = reader.read_command().unwrap() {
            commands.push(cmd);
        }
        commands
    }

    #[test]
    fn test_verb_and_argument_split() {
        let cmds = read_all(b"RETR hello world\r\n");
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].token, verb::RETR);
        assert_eq!(cmds[0].verb, "RETR");
        assert_eq!(cmds[0].arg.as_deref(), Some("hello world"));
    }

    #[test]
    fn test_no_space_means_no_argument() {
        let cmds = read_all(b"PASV\r\n");
        assert_eq!(cmds[0].arg, None);
    }

    #[test]
    fn test_trailing_space_means_empty_argument() {
        let cmds = read_all(b"CWD \r\n");
        assert_eq!(cmds[0].arg.as_deref(), Some(""));
    }

    #[test]
    fn test_token_ignores_letter_case() {
        let upper = read_all(b"QUIT\r\n");
        let lower = read_all(b"quit\r\n");
        assert_eq!(upper[0].token, lower[0].token);
        assert_eq!(upper[0].token, verb::QUIT);
    }

    #[test]
    fn test_bare_lf_and_repeated_cr_are_tolerated() {
        let cmds = read_all(b"NOOP\n");
        assert_eq!(cmds[0].token, verb::NOOP);

        let cmds = read_all(b"NOOP\r\r\r\n");
        assert_eq!(cmds[0].token, verb::NOOP);
        assert_eq!(cmds[0].arg, None);
    }

    #[test]
    fn test_empty_line_folds_to_zero() {
        let cmds = read_all(b"\r\n");
        assert_eq!(cmds[0].token, 0);
        assert_eq!(cmds[0].verb, "");
    }

    #[test]
    fn test_eof_returns_none() {
        let mut reader = CommandReader::new(&b""[..]);
        assert!(reader.read_command().unwrap().is_none());
    }

    #[test]
    fn test_oversized_line_is_truncated_not_overrun() {
        let mut input = vec![b'A'; 10_000];
        input.extend_from_slice(b"\r\nNOOP\r\n");

        let mut reader = CommandReader::new(&input[..]);
        let first = reader.read_command().unwrap().unwrap();
        assert_eq!(first.verb.len(), MAX_COMMAND_LEN as usize);

        // The tail of the long line parses as garbage, then the stream
        // recovers on the next real command.
        let mut tokens = Vec::new();
        while let Some(cmd) = reader.read_command().unwrap() {
            tokens.push(cmd.token);
        }
        assert!(tokens.contains(&verb::NOOP));
    }
}
