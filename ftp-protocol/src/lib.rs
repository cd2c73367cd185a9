//! # FTP Protocol Library
//!
//! Control-channel primitives for RFC 959 FTP servers:
//! - RFC 959: File Transfer Protocol (https://tools.ietf.org/html/rfc959)
//! - RFC 854: the Telnet conventions FTP inherits on the control channel
//!   (the 0xFF IAC escape)
//!
//! The library is organized into several modules:
//! - `protocol`: numeric reply codes and folded verb tokens
//! - `parser`: `CommandReader`, which frames and splits command lines
//! - `reply`: `ReplyWriter`, which formats and escapes control replies
//!
//! Everything here is transport-agnostic: `CommandReader` works over any
//! `BufRead` and `ReplyWriter` over any `Write`, so the same code drives an
//! inetd-style stdin/stdout socket pair, a `TcpStream`, or an in-memory
//! buffer in tests.

pub mod parser;
pub mod protocol;
pub mod reply;

// Re-export the main types for convenience
pub use parser::{Command, CommandReader};
pub use reply::ReplyWriter;
