//! Data-connection endpoint lifecycle.
//!
//! PASV and PORT arm the endpoint; a transfer opens it exactly once and the
//! transfer's cleanup clears it. Arming a new endpoint always clears the old
//! one first, even when the new PORT argument turns out malformed.

use crate::errors::{FtpError, FtpResult};
use crate::net;

use log::debug;
use rand::Rng;

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};

/// Ephemeral range offered to PASV clients.
const MIN_PASV_PORT: u16 = 1024;
const MAX_PASV_PORT: u16 = 65535;
const BIND_RETRIES: u32 = 10;

/// At most one arm is ever held; the enum makes that invariant structural.
#[derive(Debug, Default)]
pub enum DataChannel {
    #[default]
    None,
    Passive(TcpListener),
    Active(SocketAddr),
}

impl DataChannel {
    pub fn is_armed(&self) -> bool {
        !matches!(self, DataChannel::None)
    }

    /// PASV: replace whatever was armed with a listener on a random
    /// ephemeral port of the control connection's local address. Running out
    /// of bind attempts is fatal to the session.
    pub fn enter_passive(&mut self, local_ip: IpAddr) -> FtpResult<u16> {
        self.clear();

        let mut rng = rand::thread_rng();
        for _ in 0..BIND_RETRIES {
            let port = rng.gen_range(MIN_PASV_PORT..=MAX_PASV_PORT);
            if let Ok(listener) = TcpListener::bind(SocketAddr::new(local_ip, port)) {
                debug!("passive listener on port {}", port);
                *self = DataChannel::Passive(listener);
                return Ok(port);
            }
        }
        Err(FtpError::PassiveBindFailed)
    }

    /// PORT: replace whatever was armed with the client-supplied address.
    /// On a malformed argument the endpoint stays unarmed and `false` comes
    /// back.
    pub fn set_active(&mut self, arg: &str) -> bool {
        self.clear();

        match parse_port_argument(arg) {
            Some(addr) => {
                debug!("active peer {}", addr);
                *self = DataChannel::Active(addr);
                true
            }
            None => false,
        }
    }

    /// Open the data connection for one transfer: accept inbound (passive)
    /// or dial out (active), then arm keepalive and the delivery linger.
    pub fn open(&mut self) -> io::Result<TcpStream> {
        let sock = match self {
            DataChannel::Passive(listener) => listener.accept()?.0,
            DataChannel::Active(addr) => TcpStream::connect(*addr)?,
            DataChannel::None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "no data endpoint armed",
                ));
            }
        };
        net::init_data_socket(&sock)?;
        Ok(sock)
    }

    /// Drop the pending peer address or listener.
    pub fn clear(&mut self) {
        *self = DataChannel::None;
    }
}

/// `h1,h2,h3,h4,p1,p2` — four address octets, then the port split into high
/// and low bytes.
fn parse_port_argument(arg: &str) -> Option<SocketAddr> {
    let mut fields = [0u8; 6];
    let mut count = 0;
    for part in arg.split(',') {
        if count == fields.len() {
            return None;
        }
        fields[count] = part.parse().ok()?;
        count += 1;
    }
    if count != fields.len() {
        return None;
    }

    let ip = Ipv4Addr::new(fields[0], fields[1], fields[2], fields[3]);
    let port = u16::from(fields[4]) << 8 | u16::from(fields[5]);
    Some(SocketAddr::new(IpAddr::V4(ip), port))
}
