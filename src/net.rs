//! Descriptor-level socket and file helpers the standard library does not
//! expose.

use std::fs::File;
use std::io;
use std::mem;
use std::net::TcpStream;
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};

/// Linger long enough that closing the data socket delivers the tail of a
/// transfer before the final reply goes out on the control channel.
const DATA_LINGER_SECS: libc::c_int = 32767;

fn setsockopt_int(
    fd: RawFd,
    level: libc::c_int,
    option: libc::c_int,
    value: libc::c_int,
) -> io::Result<()> {
    let ret = unsafe {
        libc::setsockopt(
            fd,
            level,
            option,
            &value as *const _ as *const libc::c_void,
            mem::size_of_val(&value) as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn setsockopt_linger(fd: RawFd, linger: libc::linger) -> io::Result<()> {
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_LINGER,
            &linger as *const _ as *const libc::c_void,
            mem::size_of_val(&linger) as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Options for a freshly opened data socket: keepalive, plus the long linger
/// that makes `close` wait for delivery.
pub fn init_data_socket(sock: &TcpStream) -> io::Result<()> {
    let fd = sock.as_raw_fd();
    setsockopt_int(fd, libc::SOL_SOCKET, libc::SO_KEEPALIVE, 1)?;
    setsockopt_linger(
        fd,
        libc::linger {
            l_onoff: 1,
            l_linger: DATA_LINGER_SECS,
        },
    )
}

/// Options for the inherited control socket.
pub fn prepare_control_socket(sock: &TcpStream) -> io::Result<()> {
    sock.set_nodelay(true)?;
    let fd = sock.as_raw_fd();
    setsockopt_int(fd, libc::SOL_SOCKET, libc::SO_KEEPALIVE, 1)?;
    setsockopt_int(fd, libc::SOL_SOCKET, libc::SO_OOBINLINE, 1)
}

/// Close a data socket whose linger is armed. The first `close` may block
/// until the peer drains the send queue and may fail; in that case the
/// linger is stripped and the close retried so the session cannot wedge.
pub fn close_data_socket(sock: TcpStream) {
    let fd = sock.into_raw_fd();
    unsafe {
        if libc::close(fd) < 0 {
            let _ = setsockopt_linger(fd, libc::linger { l_onoff: 0, l_linger: 0 });
            libc::close(fd);
        }
    }
}

/// Drop O_NONBLOCK from an already-open descriptor.
pub fn clear_nonblocking(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// A dropped peer must surface as a write error, not kill the process.
pub fn ignore_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};
    use std::os::unix::fs::OpenOptionsExt;

    #[test]
    fn test_data_socket_options_apply() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();

        init_data_socket(&server).unwrap();
        close_data_socket(server);
        drop(client);
    }

    #[test]
    fn test_clear_nonblocking() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"x").unwrap();

        let file = std::fs::OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&path)
            .unwrap();
        clear_nonblocking(&file).unwrap();

        let flags = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_GETFL) };
        assert_eq!(flags & libc::O_NONBLOCK, 0);
    }
}
