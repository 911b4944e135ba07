use std::{collections::BTreeMap, fmt};

use thiserror::Error;

use crate::observability::log_warn;

pub(crate) const PARAM_NAMENODE: &str = "namenode";
pub(crate) const PARAM_ROOT_DIR: &str = "rootdirectory";
pub(crate) const PARAM_MAX_CLIENTS: &str = "maxClients";

/// Upper bound, and default, for concurrent client operations.
pub const DEFAULT_MAX_CLIENTS: u64 = 1024;

/// A single value of a driver configuration map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterValue {
    String(String),
    Integer(i64),
    Bool(bool),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::String(value) => write!(f, "{}", value),
            ParameterValue::Integer(value) => write!(f, "{}", value),
            ParameterValue::Bool(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::String(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

/// Configuration map handed to driver factories.
pub type Parameters = BTreeMap<String, ParameterValue>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no {0} parameter provided")]
    MissingParameter(&'static str),
    #[error("{param} config error: parameter must be a positive integer, '{value}' invalid")]
    InvalidLimit { param: &'static str, value: String },
}

/// Immutable configuration of one driver instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    namenode: String,
    root_path: String,
    max_clients: u64,
}

impl DriverConfig {
    /// `max_clients` is clamped to `[1, DEFAULT_MAX_CLIENTS]`. The root path
    /// must not be empty.
    pub fn new(
        namenode: impl Into<String>,
        root_path: impl Into<String>,
        max_clients: u64,
    ) -> Result<Self, ConfigError> {
        let root_path = root_path.into();
        if root_path.is_empty() {
            return Err(ConfigError::MissingParameter(PARAM_ROOT_DIR));
        }
        Ok(DriverConfig {
            namenode: namenode.into(),
            root_path,
            max_clients: max_clients.clamp(1, DEFAULT_MAX_CLIENTS),
        })
    }

    /// Builds a config from the `namenode`, `rootdirectory` and `maxClients`
    /// parameters.
    ///
    /// An empty or missing `namenode` is accepted: the client then resolves
    /// the cluster from its ambient configuration.
    pub fn from_parameters(parameters: &Parameters) -> Result<Self, ConfigError> {
        let namenode = match parameters.get(PARAM_NAMENODE).map(ToString::to_string) {
            Some(namenode) if !namenode.is_empty() => namenode,
            _ => {
                log_warn!(
                    component = "config",
                    event = "namenode_missing",
                    "no namenode provided, the client will load it from its local configuration"
                );
                String::new()
            }
        };

        let root_path = match parameters.get(PARAM_ROOT_DIR).map(ToString::to_string) {
            Some(root) if !root.is_empty() => root,
            _ => return Err(ConfigError::MissingParameter(PARAM_ROOT_DIR)),
        };

        let max_clients = parse_limit(
            PARAM_MAX_CLIENTS,
            parameters.get(PARAM_MAX_CLIENTS),
            DEFAULT_MAX_CLIENTS,
        )?;

        Ok(DriverConfig {
            namenode,
            root_path,
            max_clients,
        })
    }

    pub fn namenode(&self) -> &str {
        &self.namenode
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    pub fn max_clients(&self) -> u64 {
        self.max_clients
    }
}

/// Parses a positive limit, falling back to `default` when absent and clamping
/// anything larger than `default` down to it.
pub(crate) fn parse_limit(
    param: &'static str,
    value: Option<&ParameterValue>,
    default: u64,
) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::InvalidLimit {
        param,
        value: value.map(ToString::to_string).unwrap_or_default(),
    };

    let limit = match value {
        None => return Ok(default),
        Some(ParameterValue::Integer(limit)) => u64::try_from(*limit).map_err(|_| invalid())?,
        Some(ParameterValue::String(limit)) => parse_unsigned(limit).ok_or_else(invalid)?,
        Some(ParameterValue::Bool(_)) => return Err(invalid()),
    };
    if limit == 0 {
        return Err(invalid());
    }
    Ok(limit.min(default))
}

/// Integer syntax with an optional base prefix: `0x`, `0o`, `0b`, or a bare
/// leading `0` for octal. Underscores may separate digits. Signs and
/// surrounding whitespace are rejected.
fn parse_unsigned(value: &str) -> Option<u64> {
    let prefixed = |upper: &'static str, lower: &'static str| {
        value
            .strip_prefix(lower)
            .or_else(|| value.strip_prefix(upper))
    };
    let (digits, radix, prefix) = if let Some(hex) = prefixed("0X", "0x") {
        (hex, 16, true)
    } else if let Some(octal) = prefixed("0O", "0o") {
        (octal, 8, true)
    } else if let Some(binary) = prefixed("0B", "0b") {
        (binary, 2, true)
    } else if value.len() > 1 && value.starts_with('0') {
        (&value[1..], 8, true)
    } else {
        (value, 10, false)
    };

    // A single underscore may follow the prefix or sit between two digits.
    let body = if prefix {
        digits.strip_prefix('_').unwrap_or(digits)
    } else {
        digits
    };
    if body.is_empty()
        || body.starts_with('_')
        || body.ends_with('_')
        || body.contains("__")
        || !body.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    u64::from_str_radix(&body.replace('_', ""), radix).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(entries: &[(&str, ParameterValue)]) -> Parameters {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_full_parameters() {
        let config = DriverConfig::from_parameters(&params(&[
            ("namenode", "nn-1:8020".into()),
            ("rootdirectory", "/registry".into()),
            ("maxClients", ParameterValue::Integer(16)),
        ]))
        .unwrap();

        assert_eq!(config.namenode(), "nn-1:8020");
        assert_eq!(config.root_path(), "/registry");
        assert_eq!(config.max_clients(), 16);
    }

    #[test]
    fn test_namenode_is_optional() {
        let config =
            DriverConfig::from_parameters(&params(&[("rootdirectory", "/registry".into())]))
                .unwrap();
        assert_eq!(config.namenode(), "");
        assert_eq!(config.max_clients(), DEFAULT_MAX_CLIENTS);

        let config = DriverConfig::from_parameters(&params(&[
            ("namenode", "".into()),
            ("rootdirectory", "/registry".into()),
        ]))
        .unwrap();
        assert_eq!(config.namenode(), "");
    }

    #[test]
    fn test_root_directory_is_required() {
        let err = DriverConfig::from_parameters(&params(&[("namenode", "nn:8020".into())]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingParameter("rootdirectory")));

        let err = DriverConfig::from_parameters(&params(&[("rootdirectory", "".into())]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingParameter("rootdirectory")));
    }

    #[test]
    fn test_max_clients_parsing() {
        let parse = |value: ParameterValue| {
            parse_limit(PARAM_MAX_CLIENTS, Some(&value), DEFAULT_MAX_CLIENTS)
        };

        assert_eq!(parse("8".into()).unwrap(), 8);
        assert_eq!(parse("0x10".into()).unwrap(), 16);
        assert_eq!(parse("0o17".into()).unwrap(), 15);
        assert_eq!(parse("010".into()).unwrap(), 8);
        assert_eq!(parse("0b101".into()).unwrap(), 5);
        assert_eq!(parse("1_000".into()).unwrap(), 1000);
        assert_eq!(parse("0x_1f".into()).unwrap(), 31);
        assert_eq!(parse(ParameterValue::Integer(1)).unwrap(), 1);
        assert_eq!(parse(ParameterValue::Integer(4096)).unwrap(), DEFAULT_MAX_CLIENTS);
        assert_eq!(parse("100000".into()).unwrap(), DEFAULT_MAX_CLIENTS);

        for invalid in [
            ParameterValue::from("many"),
            ParameterValue::from(""),
            ParameterValue::from("-3"),
            ParameterValue::from("0"),
            ParameterValue::from(" 12 "),
            ParameterValue::from("+5"),
            ParameterValue::from("08"),
            ParameterValue::from("0x"),
            ParameterValue::from("1__0"),
            ParameterValue::from("_1"),
            ParameterValue::Integer(0),
            ParameterValue::Integer(-1),
            ParameterValue::from(true),
        ] {
            assert!(
                matches!(parse(invalid.clone()), Err(ConfigError::InvalidLimit { .. })),
                "{invalid:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_new_clamps_max_clients() {
        assert_eq!(DriverConfig::new("", "/r", 0).unwrap().max_clients(), 1);
        assert_eq!(
            DriverConfig::new("", "/r", u64::MAX).unwrap().max_clients(),
            DEFAULT_MAX_CLIENTS
        );
        assert_eq!(DriverConfig::new("", "/r", 8).unwrap().max_clients(), 8);
    }

    #[test]
    fn test_new_requires_root() {
        let err = DriverConfig::new("nn:8020", "", 8).unwrap_err();
        assert!(matches!(err, ConfigError::MissingParameter("rootdirectory")));
    }
}
