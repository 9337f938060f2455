use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read the config on config/p1.yaml or p1.yaml")]
    NotFound,
    #[error("Unable to read config file {0:?}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Unable to parse config file: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("Source needs either a host or a device")]
    NoSource,
}

fn source_port_default() -> u16 { return 8088 }

/// Where the telegram bytes come from. A TCP bridge (ser2net, P1 dongle) or a device node /
/// file, serial ports are expected to be configured (baud rate etc.) outside of this tool.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SourceConfig {
    pub host: Option<String>,
    #[serde(default="source_port_default")]
    pub port: u16,
    pub device: Option<String>,
}

fn lenient_default() -> bool { return false }
fn reconnect_delay_default() -> u64 { return 10 }
fn read_timeout_default() -> u64 { return 30 }
fn offline_threshold_default() -> u32 { return 3 }
fn read_buffer_default() -> usize { return 1024 }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default="lenient_default")]
    pub lenient: bool,
    /// Seconds to wait before reconnecting
    #[serde(default="reconnect_delay_default")]
    pub reconnect_delay: u64,
    /// Seconds without any byte before the parser is reset
    #[serde(default="read_timeout_default")]
    pub read_timeout: u64,
    #[serde(default="offline_threshold_default")]
    pub offline_threshold: u32,
    #[serde(default="read_buffer_default")]
    pub read_buffer: usize,
}

impl Config {
    /// Loads the config from the given path, or from config/p1.yaml and p1.yaml in that order
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::find().ok_or(ConfigError::NotFound)?,
        };
        info!("Loading config from {}", path.display());

        let contents = fs::read_to_string(&path).map_err(|e| ConfigError::Io(path.clone(), e))?;
        return Self::from_yaml(&contents);
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let c: Config = serde_yml::from_str(contents)?;
        if c.source.host.is_none() && c.source.device.is_none() {
            return Err(ConfigError::NoSource);
        }
        debug!("Config parsed, lenient mode {}", c.lenient);
        return Ok(c);
    }

    fn find() -> Option<PathBuf> {
        for candidate in ["config/p1.yaml", "p1.yaml"] {
            let p = PathBuf::from(candidate);
            if p.is_file() {
                return Some(p);
            }
        }
        return None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let c = Config::from_yaml("source:\n  host: 192.168.1.50\n").unwrap();
        assert_eq!(c.source.host, Some("192.168.1.50".to_string()));
        assert_eq!(c.source.port, 8088);
        assert_eq!(c.source.device, None);
        assert!(!c.lenient);
        assert_eq!(c.reconnect_delay, 10);
        assert_eq!(c.read_timeout, 30);
        assert_eq!(c.offline_threshold, 3);
        assert_eq!(c.read_buffer, 1024);
    }

    #[test]
    fn test_missing_source() {
        assert!(matches!(Config::from_yaml("source: {}\n"), Err(ConfigError::NoSource)));
        assert!(matches!(Config::from_yaml("lenient: true\n"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "source:\n  device: /dev/ttyUSB0\nlenient: true\noffline_threshold: 5").unwrap();

        let c = Config::load(Some(file.path())).unwrap();
        assert_eq!(c.source.device, Some("/dev/ttyUSB0".to_string()));
        assert!(c.lenient);
        assert_eq!(c.offline_threshold, 5);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(Some(dir.path().join("nope.yaml").as_path()));
        assert!(matches!(result, Err(ConfigError::Io(_, _))));
    }
}
