//! Service configuration.

use std::io;
use std::path::Path;

use serde::Deserialize;

use crate::proto::{FS_NAME_MAXLEN, MAX_MNTOPTS_LEN};

/// Runtime configuration of the multiplexer service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the client endpoint listens on.
    pub listen: String,
    /// Slots per client descriptor table.
    pub descriptor_table_size: usize,
    /// Accepted bytes for a mount options string.
    pub mount_options_limit: usize,
    /// Accepted bytes for a back-end name.
    pub backend_name_limit: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            listen: "127.0.0.1:4050".to_owned(),
            descriptor_table_size: 64,
            mount_options_limit: MAX_MNTOPTS_LEN,
            backend_name_limit: FS_NAME_MAXLEN,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file.
    pub fn load(path: &Path) -> io::Result<Config> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }
}
