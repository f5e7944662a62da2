//! INI file loading for [`ClientConfig`].
//!
//! Each named client reads its own section, so one file can configure several
//! caches:
//!
//! ```ini
//! [chunks.memcached]
//! hostname = memcached-chunks.default.svc.cluster.local
//! service = memcached
//! timeout_ms = 100
//! max_idle_conns = 16
//! update_interval_secs = 60
//! consistent_hash = true
//!
//! [index.memcached]
//! addresses = dnssrv+_memcached._tcp.memcached-index
//! strategy = modulo
//! ```
//!
//! Keys missing from the section keep their defaults. `strategy` takes
//! precedence over `consistent_hash` when both are present.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use super::{ClientConfig, ConfigError};
use crate::selector::SelectionStrategy;

impl ClientConfig {
    /// Loads the given section of an INI file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::File`] if the file cannot be read or parsed,
    /// [`ConfigError::MissingSection`] if the section is absent, and
    /// [`ConfigError::InvalidValue`] for unparsable values.
    pub fn from_ini_file(path: impl AsRef<Path>, section: &str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path)
            .map_err(|e| ConfigError::File(format!("{}: {}", path.display(), e)))?;
        Self::from_ini(&ini, section)
    }

    /// Loads the given section from INI text.
    pub fn from_ini_str(text: &str, section: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::File(e.to_string()))?;
        Self::from_ini(&ini, section)
    }

    fn from_ini(ini: &Ini, section: &str) -> Result<Self, ConfigError> {
        let props = ini
            .section(Some(section))
            .ok_or_else(|| ConfigError::MissingSection(section.to_string()))?;
        Self::default().apply_properties(props)
    }

    fn apply_properties(mut self, props: &Properties) -> Result<Self, ConfigError> {
        if let Some(hostname) = props.get("hostname") {
            self.hostname = Some(hostname.trim().to_string()).filter(|h| !h.is_empty());
        }
        if let Some(service) = props.get("service") {
            self.service = service.trim().to_string();
        }
        if let Some(addresses) = props.get("addresses") {
            self.addresses = addresses.trim().to_string();
        }
        if let Some(ms) = parse_value::<u64>(props, "timeout_ms")? {
            self.timeout = Duration::from_millis(ms);
        }
        if let Some(conns) = parse_value::<usize>(props, "max_idle_conns")? {
            self.max_idle_conns = conns;
        }
        if let Some(secs) = parse_value::<u64>(props, "update_interval_secs")? {
            self.update_interval = Duration::from_secs(secs);
        }
        if let Some(value) = props.get("consistent_hash") {
            self.strategy = if parse_bool("consistent_hash", value)? {
                SelectionStrategy::Consistent
            } else {
                SelectionStrategy::Modulo
            };
        }
        if let Some(value) = props.get("strategy") {
            self.strategy =
                SelectionStrategy::from_config_str(value).ok_or_else(|| invalid("strategy", value))?;
        }
        Ok(self)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_value<T: FromStr>(props: &Properties, key: &str) -> Result<Option<T>, ConfigError> {
    props
        .get(key)
        .map(|raw| raw.trim().parse::<T>().map_err(|_| invalid(key, raw)))
        .transpose()
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}
