//! Data-channel transfers: file download and upload, directory listings.
//!
//! Every handler here follows the same discipline: the `150` line goes out
//! only after the data connection is up, the final `226`/`451` goes out only
//! after the data socket has been disposed, and the armed endpoint is
//! cleared on every exit path.

use crate::errors::FtpResult;
use crate::listing;
use crate::net;
use crate::session::FtpSession;

use ftp_protocol::protocol::reply_code;
use log::{info, warn};

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, Seek, SeekFrom, Write};
use std::mem;
use std::net::TcpStream;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

impl<R: BufRead, W: Write> FtpSession<R, W> {
    /// Preamble shared by every data-channel command.
    fn require_data_endpoint(&mut self) -> FtpResult<bool> {
        if self.data.is_armed() {
            return Ok(true);
        }
        self.replies.raw("425 Use PORT or PASV first\r\n")?;
        Ok(false)
    }

    /// Open the data connection and send the `150` line. `None` means the
    /// `425` has already been sent and the caller must clean up and bail.
    fn open_data_connection(
        &mut self,
        announce: impl AsRef<[u8]>,
    ) -> FtpResult<Option<TcpStream>> {
        match self.data.open() {
            Ok(sock) => {
                self.replies.reply(reply_code::DATACONN, announce)?;
                Ok(Some(sock))
            }
            Err(err) => {
                warn!("data connection failed: {}", err);
                self.replies.error(reply_code::BAD_SEND_CONN)?;
                Ok(None)
            }
        }
    }

    /// Failure before the data connection was even opened. The armed
    /// endpoint is still torn down: every data-channel command is
    /// single-shot, success or not.
    fn fail_data_command(&mut self, code: u16) -> FtpResult<()> {
        self.replies.error(code)?;
        self.data.clear();
        Ok(())
    }

    /// Tail shared by RETR and the uploads: dispose the data socket first so
    /// the client sees data EOF before the closing reply, then clear the
    /// endpoint.
    fn finish_transfer(&mut self, sock: TcpStream, result: io::Result<u64>) -> FtpResult<()> {
        net::close_data_socket(sock);
        match result {
            Ok(bytes) => {
                info!("transfer complete, {} bytes", bytes);
                self.replies.ok(reply_code::TRANSFER_OK)?;
            }
            Err(err) => {
                warn!("transfer failed: {}", err);
                self.replies.error(reply_code::BAD_SEND_FILE)?;
            }
        }
        self.data.clear();
        Ok(())
    }

    pub(crate) fn handle_retr(&mut self, arg: Option<&str>) -> FtpResult<()> {
        let offset = mem::take(&mut self.restart_pos);

        if !self.require_data_endpoint()? {
            return Ok(());
        }

        let Some(path) = arg else {
            return self.fail_data_command(reply_code::FILE_FAIL);
        };

        // Non-blocking open so a device node cannot wedge the session; the
        // flag must come off again before the copy loop.
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path);
        let mut file = match file {
            Ok(file) => file,
            Err(_) => return self.fail_data_command(reply_code::FILE_FAIL),
        };

        let size = match file.metadata() {
            Ok(meta) if meta.is_file() => meta.len(),
            // Anything but a regular file is treated as a failed open.
            _ => return self.fail_data_command(reply_code::FILE_FAIL),
        };
        let _ = net::clear_nonblocking(&file);

        if offset != 0 && file.seek(SeekFrom::Start(offset)).is_err() {
            return self.fail_data_command(reply_code::FILE_FAIL);
        }

        let announce = format!(
            "Opening BINARY mode data connection for {} ({} bytes)",
            path, size
        );
        let Some(mut sock) = self.open_data_connection(announce)? else {
            self.data.clear();
            return Ok(());
        };

        let result = io::copy(&mut file, &mut sock);
        self.finish_transfer(sock, result)
    }

    pub(crate) fn handle_stor(&mut self, arg: Option<&str>) -> FtpResult<()> {
        self.handle_upload(arg, false)
    }

    pub(crate) fn handle_appe(&mut self, arg: Option<&str>) -> FtpResult<()> {
        // Appending always writes at the end; a pending restart offset is
        // void.
        self.restart_pos = 0;
        self.handle_upload(arg, true)
    }

    pub(crate) fn handle_stou(&mut self) -> FtpResult<()> {
        self.restart_pos = 0;

        if !self.require_data_endpoint()? {
            return Ok(());
        }

        // Any supplied argument is ignored; the server picks the name and
        // announces it.
        let created = tempfile::Builder::new()
            .prefix("uniq.")
            .rand_bytes(6)
            .tempfile_in(".")
            .ok()
            .and_then(|file| file.keep().ok());
        let Some((file, path)) = created else {
            return self.fail_data_command(reply_code::UPLOAD_FAIL);
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        info!("storing unique file {}", name);
        self.run_upload(file, format!("FILE: {}", name), 0)
    }

    fn handle_upload(&mut self, arg: Option<&str>, append: bool) -> FtpResult<()> {
        let offset = mem::take(&mut self.restart_pos);

        if !self.require_data_endpoint()? {
            return Ok(());
        }

        let Some(path) = arg else {
            return self.fail_data_command(reply_code::UPLOAD_FAIL);
        };

        let mut options = OpenOptions::new();
        options.write(true).create(true).mode(0o666);
        if append {
            options.append(true);
        } else if offset == 0 {
            // A restart offset suppresses truncation; the file is positioned
            // below instead.
            options.truncate(true);
        }

        let file = match options.open(path) {
            Ok(file) => file,
            Err(_) => return self.fail_data_command(reply_code::UPLOAD_FAIL),
        };
        self.run_upload(file, "Ok to send data", offset)
    }

    fn run_upload(
        &mut self,
        mut file: File,
        announce: impl AsRef<[u8]>,
        offset: u64,
    ) -> FtpResult<()> {
        if offset != 0 && file.seek(SeekFrom::Start(offset)).is_err() {
            return self.fail_data_command(reply_code::UPLOAD_FAIL);
        }

        let Some(mut sock) = self.open_data_connection(announce)? else {
            self.data.clear();
            return Ok(());
        };

        let result = io::copy(&mut sock, &mut file);
        self.finish_transfer(sock, result)
    }

    /// LIST, NLST, and STAT-with-argument. `on_control` routes the listing
    /// over the control channel (STAT) instead of a data connection.
    pub(crate) fn handle_listing(
        &mut self,
        arg: Option<&str>,
        detailed: bool,
        on_control: bool,
    ) -> FtpResult<()> {
        if on_control {
            self.replies.raw("213-Status follows:\r\n")?;
            emit_listing(self.replies.get_mut(), arg, detailed)?;
            self.replies.ok(reply_code::STAT_FILE_OK)?;
            return Ok(());
        }

        if !self.require_data_endpoint()? {
            return Ok(());
        }

        if let Some(mut sock) = self.open_data_connection("Here comes the directory listing")? {
            if let Err(err) = emit_listing(&mut sock, arg, detailed) {
                // The client going away mid-listing still gets the normal
                // closing reply.
                warn!("listing aborted: {}", err);
            }
            net::close_data_socket(sock);
        }
        self.data.clear();
        // An unlistable path reports success with no content; clients cope
        // with that far better than with an error here.
        self.replies.ok(reply_code::TRANSFER_OK)?;
        Ok(())
    }
}

/// Write the listing for `arg` into `out`: a single line for a file or
/// symlink, the entries for a directory, nothing for a path that fails
/// `lstat`. No argument lists the current directory.
fn emit_listing(out: &mut impl Write, arg: Option<&str>, detailed: bool) -> io::Result<()> {
    let Some(path) = arg else {
        return listing::write_dir(out, Path::new("."), detailed);
    };

    let path = Path::new(path);
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };

    let file_type = meta.file_type();
    if file_type.is_file() || file_type.is_symlink() {
        // A named file always gets the full line, even under NLST.
        let name = path.file_name().unwrap_or(path.as_os_str());
        listing::write_entry(out, path, name, Some(&meta))
    } else if file_type.is_dir() {
        listing::write_dir(out, path, detailed)
    } else {
        Ok(())
    }
}
