//! INI-backed configuration.
//!
//! Values are trimmed on read. Numeric and boolean getters fall back to the
//! caller's default when a key is absent or does not parse; strict checking
//! lives in `domain::config_validation`.

use crate::domain::error::RoctraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

const INLINE_SOURCE: &str = "<inline>";

#[derive(Debug)]
pub struct FileConfigAdapter {
    ini: Ini,
    source: String,
}

impl FileConfigAdapter {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RoctraderError> {
        let source = path.as_ref().display().to_string();
        let mut ini = Ini::new();
        ini.load(path.as_ref())
            .map_err(|reason| RoctraderError::ConfigParse {
                file: source.clone(),
                reason,
            })?;
        Ok(Self { ini, source })
    }

    pub fn from_string(content: &str) -> Result<Self, RoctraderError> {
        let mut ini = Ini::new();
        ini.read(content.to_string())
            .map_err(|reason| RoctraderError::ConfigParse {
                file: INLINE_SOURCE.to_string(),
                reason,
            })?;
        Ok(Self {
            ini,
            source: INLINE_SOURCE.to_string(),
        })
    }

    /// File path the values came from, or `<inline>`.
    pub fn source(&self) -> &str {
        &self.source
    }

    fn parsed<T: std::str::FromStr>(&self, section: &str, key: &str) -> Option<T> {
        self.get_string(section, key)?.parse().ok()
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.ini.get(section, key).map(|v| v.trim().to_string())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.parsed(section, key).unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.parsed(section, key).unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.get_string(section, key)
            .and_then(|v| parse_flag(&v))
            .unwrap_or(default)
    }
}
