use crate::errors::ConfigError;

use std::path::PathBuf;

/// Runtime options, set once at startup from the superserver's command line.
#[derive(Debug, Clone, Default)]
pub struct FtpConfig {
    /// Log each command and transfer outcome (the `-v` flag)
    pub verbose: bool,
    /// Allow the write-side verbs: STOR, APPE, STOU, MKD, RMD, DELE,
    /// RNFR, RNTO (the `-w` flag)
    pub write_enabled: bool,
    /// Directory to change into and pin the filesystem root to
    pub root_dir: Option<PathBuf>,
}

impl FtpConfig {
    /// Parse the argument list (without the program name). Accepts `-v` and
    /// `-w`, alone or clustered (`-vw`), followed by at most one directory.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Self::default();

        for arg in args {
            if let Some(flags) = arg.strip_prefix('-') {
                for flag in flags.chars() {
                    match flag {
                        'v' => config.verbose = true,
                        'w' => config.write_enabled = true,
                        other => return Err(ConfigError::UnknownFlag(other)),
                    }
                }
            } else if config.root_dir.is_none() {
                config.root_dir = Some(PathBuf::from(arg));
            } else {
                return Err(ConfigError::ExtraArgument(arg));
            }
        }

        Ok(config)
    }
}
