use std::fmt;

/// Command-line parsing errors
#[derive(Debug)]
pub enum ConfigError {
    UnknownFlag(char),
    ExtraArgument(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownFlag(flag) => write!(f, "Unknown flag: '-{}'", flag),
            ConfigError::ExtraArgument(arg) => write!(f, "Unexpected argument: '{}'", arg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Session-level errors
#[derive(Debug)]
pub enum FtpError {
    /// I/O related errors (control channel, data channel, file operations)
    Io(std::io::Error),

    /// Client dropped the control connection
    ClientDisconnected,

    /// PASV could not bind an ephemeral listener after all retries
    PassiveBindFailed,
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtpError::Io(err) => write!(f, "I/O error: {}", err),
            FtpError::ClientDisconnected => write!(f, "Client disconnected"),
            FtpError::PassiveBindFailed => write!(f, "Can't bind a passive data listener"),
        }
    }
}

impl std::error::Error for FtpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FtpError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FtpError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => FtpError::ClientDisconnected,
            _ => FtpError::Io(err),
        }
    }
}

/// Result type alias for session operations
pub type FtpResult<T> = Result<T, FtpError>;
