//! One client's session: the command loop, dispatch table, and the handlers
//! that answer on the control channel alone. Handlers that move data live in
//! `transfer`.

use crate::config::FtpConfig;
use crate::data_channel::DataChannel;
use crate::errors::FtpResult;

use ftp_protocol::parser::{Command, CommandReader};
use ftp_protocol::protocol::{reply_code, verb};
use ftp_protocol::reply::ReplyWriter;

use log::{debug, info};

use std::env;
use std::ffi::OsStr;
use std::fs;
use std::io::{BufRead, Write};
use std::net::IpAddr;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

/// An FTP session, alive for exactly the lifetime of the client's control
/// connection. One process serves one client, so this value is threaded
/// through the handlers rather than living in any global.
pub struct FtpSession<R, W> {
    pub(crate) config: FtpConfig,
    pub(crate) commands: CommandReader<R>,
    pub(crate) replies: ReplyWriter<W>,
    /// Local address of the control connection; PASV listens on it.
    pub(crate) local_ip: IpAddr,
    pub(crate) data: DataChannel,
    /// Offset for the next transfer, set by REST and consumed exactly once.
    pub(crate) restart_pos: u64,
    /// Rename source carried from RNFR to the RNTO that follows it.
    pub(crate) rnfr_path: Option<PathBuf>,
}

impl<R: BufRead, W: Write> FtpSession<R, W> {
    pub fn new(config: FtpConfig, local_ip: IpAddr, input: R, output: W) -> Self {
        Self {
            config,
            commands: CommandReader::new(input),
            replies: ReplyWriter::new(output),
            local_ip,
            data: DataChannel::None,
            restart_pos: 0,
            rnfr_path: None,
        }
    }

    /// Greet the client and run the command loop until QUIT or EOF.
    pub fn run(&mut self) -> FtpResult<()> {
        self.replies.raw("220 Welcome\r\n")?;

        loop {
            let Some(cmd) = self.commands.read_command()? else {
                info!("control connection closed by peer");
                return Ok(());
            };
            debug!("command: {}", cmd.verb);

            if cmd.token == verb::QUIT {
                self.replies.raw("221 Goodbye\r\n")?;
                return Ok(());
            }

            self.dispatch(&cmd)?;

            // State that only spans a single command boundary.
            if cmd.token != verb::RNFR {
                self.rnfr_path = None;
            }
            if cmd.token != verb::REST {
                self.restart_pos = 0;
            }
        }
    }

    fn dispatch(&mut self, cmd: &Command) -> FtpResult<()> {
        let arg = cmd.arg.as_deref();
        let write_enabled = self.config.write_enabled;

        match cmd.token {
            verb::USER => self.replies.ok(reply_code::GIVE_PWORD)?,
            verb::PASS => self.replies.ok(reply_code::LOGIN_OK)?,
            verb::NOOP => self.replies.ok(reply_code::NOOP_OK)?,
            // TYPE, STRU and MODE arguments go unchecked; stream-mode binary
            // transfers are the only thing clients actually use.
            verb::TYPE => self.replies.ok(reply_code::TYPE_OK)?,
            verb::STRU => self.replies.ok(reply_code::STRU_OK)?,
            verb::MODE => self.replies.ok(reply_code::MODE_OK)?,
            verb::ALLO => self.replies.ok(reply_code::ALLO_OK)?,
            verb::SYST => self.replies.raw("215 UNIX Type: L8\r\n")?,
            verb::HELP => self.handle_help()?,
            verb::PWD => self.handle_pwd()?,
            verb::CWD => self.handle_cwd(arg)?,
            verb::CDUP => self.handle_cwd(Some(".."))?,
            verb::PASV => self.handle_pasv()?,
            verb::PORT => self.handle_port(arg)?,
            verb::REST => self.handle_rest(arg)?,
            verb::STAT => self.handle_stat(arg)?,
            verb::LIST => self.handle_listing(arg, true, false)?,
            verb::NLST => self.handle_listing(arg, false, false)?,
            verb::RETR => self.handle_retr(arg)?,
            verb::STOR if write_enabled => self.handle_stor(arg)?,
            verb::APPE if write_enabled => self.handle_appe(arg)?,
            verb::STOU if write_enabled => self.handle_stou()?,
            verb::MKD if write_enabled => self.handle_mkd(arg)?,
            verb::RMD if write_enabled => self.handle_rmd(arg)?,
            verb::DELE if write_enabled => self.handle_dele(arg)?,
            verb::RNFR if write_enabled => self.handle_rnfr(arg)?,
            verb::RNTO if write_enabled => self.handle_rnto(arg)?,
            _ => {
                debug!("unknown command: {:?}", cmd.verb);
                self.replies.raw("500 Unknown command\r\n")?;
            }
        }
        Ok(())
    }

    /// Success or the generic filesystem failure, the shape shared by CWD,
    /// MKD, RMD, DELE and RNTO.
    fn fs_reply(&mut self, success: bool, ok_code: u16) -> FtpResult<()> {
        if success {
            self.replies.ok(ok_code)?;
        } else {
            self.replies.error(reply_code::FILE_FAIL)?;
        }
        Ok(())
    }

    fn handle_help(&mut self) -> FtpResult<()> {
        let mut text = String::from(
            "214-Commands:\r\n\
             ALLO CDUP CWD HELP LIST\r\n\
             MODE NLST NOOP PASS PASV PORT PWD QUIT\r\n\
             REST RETR STAT STRU SYST TYPE USER\r\n",
        );
        if self.config.write_enabled {
            text.push_str("APPE DELE MKD RMD RNFR RNTO STOR STOU\r\n");
        }
        text.push_str("214 Ok\r\n");
        self.replies.raw(&text)?;
        Ok(())
    }

    fn handle_stat(&mut self, arg: Option<&str>) -> FtpResult<()> {
        if arg.is_none() {
            self.replies
                .raw("211-FTP server status:\r\nTYPE: BINARY\r\n211 Ok\r\n")?;
            return Ok(());
        }
        // STAT <path> is a full listing delivered over the control channel.
        self.handle_listing(arg, true, true)
    }

    fn handle_pwd(&mut self) -> FtpResult<()> {
        let cwd = env::current_dir().unwrap_or_default();
        let message = quoted_pwd_message(cwd.as_os_str());
        self.replies.reply(reply_code::PWD_OK, message)?;
        Ok(())
    }

    fn handle_cwd(&mut self, arg: Option<&str>) -> FtpResult<()> {
        let moved = matches!(arg, Some(dir) if env::set_current_dir(dir).is_ok());
        self.fs_reply(moved, reply_code::CWD_OK)
    }

    fn handle_pasv(&mut self) -> FtpResult<()> {
        let IpAddr::V4(ip) = self.local_ip else {
            // PASV has no IPv6 encoding.
            self.replies.error(reply_code::BAD_CMD)?;
            return Ok(());
        };

        let port = self.data.enter_passive(self.local_ip)?;
        let octets = ip.octets();
        let message = format!(
            "Entering Passive Mode ({},{},{},{},{},{})",
            octets[0],
            octets[1],
            octets[2],
            octets[3],
            port >> 8,
            port & 0xFF
        );
        self.replies.reply(reply_code::PASV_OK, message)?;
        Ok(())
    }

    fn handle_port(&mut self, arg: Option<&str>) -> FtpResult<()> {
        if self.data.set_active(arg.unwrap_or("")) {
            self.replies.ok(reply_code::PORT_OK)?;
        } else {
            self.replies.error(reply_code::BAD_CMD)?;
        }
        Ok(())
    }

    fn handle_rest(&mut self, arg: Option<&str>) -> FtpResult<()> {
        self.restart_pos = parse_restart_offset(arg);
        self.replies.ok(reply_code::REST_OK)?;
        Ok(())
    }

    fn handle_mkd(&mut self, arg: Option<&str>) -> FtpResult<()> {
        let made = matches!(arg, Some(path) if fs::create_dir(path).is_ok());
        self.fs_reply(made, reply_code::MKDIR_OK)
    }

    fn handle_rmd(&mut self, arg: Option<&str>) -> FtpResult<()> {
        let removed = matches!(arg, Some(path) if fs::remove_dir(path).is_ok());
        self.fs_reply(removed, reply_code::RMDIR_OK)
    }

    fn handle_dele(&mut self, arg: Option<&str>) -> FtpResult<()> {
        let removed = matches!(arg, Some(path) if fs::remove_file(path).is_ok());
        self.fs_reply(removed, reply_code::DELE_OK)
    }

    fn handle_rnfr(&mut self, arg: Option<&str>) -> FtpResult<()> {
        // The argument is not validated here; a missing one just means the
        // RNTO that follows fails its precondition.
        self.rnfr_path = arg.map(PathBuf::from);
        self.replies.ok(reply_code::RNFR_OK)?;
        Ok(())
    }

    fn handle_rnto(&mut self, arg: Option<&str>) -> FtpResult<()> {
        let (Some(from), Some(to)) = (self.rnfr_path.take(), arg) else {
            self.replies.raw("503 RNFR required first\r\n")?;
            return Ok(());
        };
        self.fs_reply(fs::rename(&from, to).is_ok(), reply_code::RENAME_OK)
    }
}

/// `257` replies quote the path and double every quote inside it.
pub(crate) fn quoted_pwd_message(cwd: &OsStr) -> Vec<u8> {
    let bytes = cwd.as_bytes();
    let mut message = Vec::with_capacity(bytes.len() + 2);
    message.push(b'"');
    for &b in bytes {
        if b == b'"' {
            message.extend_from_slice(b"\"\"");
        } else {
            message.push(b);
        }
    }
    message.push(b'"');
    message
}

/// C `atoi` semantics clamped to zero: optional leading whitespace and sign,
/// digits until the first non-digit, anything else is zero.
pub(crate) fn parse_restart_offset(arg: Option<&str>) -> u64 {
    let Some(arg) = arg else { return 0 };
    let arg = arg.trim_start();
    if arg.starts_with('-') {
        return 0;
    }
    arg.strip_prefix('+')
        .unwrap_or(arg)
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .fold(0u64, |acc, c| {
            acc.saturating_mul(10).saturating_add(u64::from(c as u8 - b'0'))
        })
}
