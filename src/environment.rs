use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use log::Logger;

use crate::db::Db;

pub type SafeDb = dyn Db + Send + Sync;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<SafeDb>,
    pub config: Config,
}

impl Environment {
    pub fn new(logger: Arc<Logger>, db: Arc<SafeDb>, config: Config) -> Self {
        Self { logger, db, config }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) mode: Mode,
    pub(crate) public_dir: PathBuf,
}

impl Config {
    pub fn new(mode: Mode, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            public_dir: public_dir.into(),
        }
    }

    /// Whether failure bodies may carry the underlying error text.
    pub fn exposes_errors(&self) -> bool {
        self.mode == Mode::Development
    }
}

/// The deployment mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Production,
    Development,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Production => "production",
            Mode::Development => "development",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Mode::Production),
            "development" | "dev" => Ok(Mode::Development),
            _ => Err(()),
        }
    }
}
