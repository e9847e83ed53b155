use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EmulatorError;

/// A locally runnable stand-in for a cloud backend component.
///
/// Variants are declared in start order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emulator {
    Functions,
    Firestore,
    Database,
    Hosting,
    Pubsub,
}

impl Emulator {
    pub const ALL: [Emulator; 5] = [
        Emulator::Functions,
        Emulator::Firestore,
        Emulator::Database,
        Emulator::Hosting,
        Emulator::Pubsub,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Emulator::Functions => "functions",
            Emulator::Firestore => "firestore",
            Emulator::Database => "database",
            Emulator::Hosting => "hosting",
            Emulator::Pubsub => "pubsub",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Emulator::Functions => 5001,
            Emulator::Firestore => 8080,
            Emulator::Database => 9000,
            Emulator::Hosting => 5000,
            Emulator::Pubsub => 8085,
        }
    }

    /// Environment variable a script reads to locate this emulator, if any.
    pub fn discovery_var(self) -> Option<&'static str> {
        match self {
            Emulator::Firestore => Some("FIRESTORE_EMULATOR_HOST"),
            Emulator::Database => Some("FIREBASE_DATABASE_EMULATOR_HOST"),
            Emulator::Pubsub => Some("PUBSUB_EMULATOR_HOST"),
            Emulator::Functions | Emulator::Hosting => None,
        }
    }

    /// Comma separated list of every accepted emulator name.
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|e| e.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Emulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Emulator {
    type Err = EmulatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| EmulatorError::UnknownEmulator {
                name: s.to_string(),
                valid: Self::valid_names(),
            })
    }
}

/// Live connection info for a running emulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmulatorInfo {
    pub host: String,
    pub port: u16,
    pub started_at: DateTime<Utc>,
}

impl EmulatorInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            started_at: Utc::now(),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Restrict startup to these emulators. `None` starts everything configured.
    pub only: Option<Vec<Emulator>>,
}

impl StartOptions {
    /// Parse an `--only` value such as `"firestore, database"`.
    pub fn parse_only(list: &str) -> crate::Result<Self> {
        let mut only = Vec::new();
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let emulator: Emulator = name.parse()?;
            if !only.contains(&emulator) {
                only.push(emulator);
            }
        }
        Ok(Self { only: Some(only) })
    }

    pub fn includes(&self, emulator: Emulator) -> bool {
        self.only
            .as_ref()
            .map_or(true, |only| only.contains(&emulator))
    }
}
