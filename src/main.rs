use rsftpd::config::FtpConfig;
use rsftpd::errors::FtpError;
use rsftpd::net;
use rsftpd::session::FtpSession;

use log::{info, warn};

use std::env;
use std::io::BufReader;
use std::net::TcpStream;
use std::os::unix::io::FromRawFd;
use std::process;

const USAGE: &str = "usage: rsftpd [-v] [-w] [DIR]\n\
\n\
rsftpd must be launched by an inetd-style superserver with the client's\n\
control connection as stdin/stdout.\n\
\n\
  -v    log commands and transfers to stderr\n\
  -w    enable write commands (STOR APPE STOU MKD RMD DELE RNFR RNTO)\n\
  DIR   change into DIR and pin the filesystem root there\n";

/// rsftpd entry point
fn main() {
    let config = match FtpConfig::from_args(env::args().skip(1)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("rsftpd: {}", err);
            eprint!("{}", USAGE);
            process::exit(1);
        }
    };

    env_logger::Builder::new()
        .filter_level(if config.verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        })
        .format_timestamp(None)
        .init();

    // The superserver hands us the accepted control connection as fd 0
    // (fd 1 is a dup of the same socket).
    let control = unsafe { TcpStream::from_raw_fd(libc::STDIN_FILENO) };
    let local_addr = match control.local_addr() {
        Ok(addr) => addr,
        Err(_) => {
            eprint!("{}", USAGE);
            process::exit(1);
        }
    };

    if let Some(dir) = &config.root_dir {
        if let Err(err) = env::set_current_dir(dir) {
            eprintln!("rsftpd: can't change into {}: {}", dir.display(), err);
            process::exit(1);
        }
        // Best-effort: without privileges the process simply stays unpinned.
        unsafe {
            libc::chroot(c".".as_ptr());
        }
    }

    net::ignore_sigpipe();
    if let Err(err) = net::prepare_control_socket(&control) {
        warn!("control socket options: {}", err);
    }

    let reader = match control.try_clone() {
        Ok(clone) => BufReader::new(clone),
        Err(err) => {
            eprintln!("rsftpd: {}", err);
            process::exit(1);
        }
    };

    info!("session start, control {}", local_addr);
    let mut session = FtpSession::new(config, local_addr.ip(), reader, control);
    match session.run() {
        Ok(()) => {}
        Err(FtpError::ClientDisconnected) => info!("client disconnected"),
        Err(FtpError::Io(err)) => warn!("session ended: {}", err),
        Err(err @ FtpError::PassiveBindFailed) => {
            eprintln!("rsftpd: {}", err);
            process::exit(1);
        }
    }
}
