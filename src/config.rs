use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::environment::Mode;
use crate::errors::ConfigError;

const CONNECTION_STRING_VARIABLE: &str = "REGISTRY_DB_CONNECTION_STRING";
const PORT_VARIABLE: &str = "REGISTRY_PORT";
const ENVIRONMENT_VARIABLE: &str = "REGISTRY_ENVIRONMENT";
const PUBLIC_DIR_VARIABLE: &str = "REGISTRY_PUBLIC_DIR";

const DEFAULT_PORT: &str = "5000";
const DEFAULT_ENVIRONMENT: &str = "production";
const DEFAULT_PUBLIC_DIR: &str = "public";

/// Returns the value of the named environment variable if it exists.
pub fn get_variable(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVariable {
        name: name.to_owned(),
    })
}

/// Returns the value of the named environment variable, or `default`
/// if it isn’t set.
pub fn get_variable_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_owned())
}

/// Everything the server reads from its environment at start-up.
#[derive(Clone, Debug)]
pub struct Settings {
    pub connection_string: String,
    pub port: u16,
    pub mode: Mode,
    pub public_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Settings {
            connection_string: get_variable(CONNECTION_STRING_VARIABLE)?,
            port: parse_variable(PORT_VARIABLE, DEFAULT_PORT)?,
            mode: parse_variable(ENVIRONMENT_VARIABLE, DEFAULT_ENVIRONMENT)?,
            public_dir: PathBuf::from(get_variable_or(PUBLIC_DIR_VARIABLE, DEFAULT_PUBLIC_DIR)),
        })
    }
}

fn parse_variable<T: FromStr>(name: &str, default: &str) -> Result<T, ConfigError> {
    let value = get_variable_or(name, default);

    value.parse().map_err(|_| ConfigError::InvalidVariable {
        name: name.to_owned(),
        value,
    })
}
