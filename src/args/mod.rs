//! Stage argument resolution.
//!
//! Every stage is invoked with an ordered list of named string arguments.
//! This module turns that list into an [`ArgumentMap`] and, optionally, checks
//! that a declared set of keys is present before any stage does I/O.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::error::ArgumentError;

/// Well-known argument keys.
pub mod keys {
    /// Database host including port, e.g. `127.0.0.1:3306`.
    pub const MYAPP_HOST: &str = "MYAPP_HOST";
    /// Database user.
    pub const MYAPP_USER: &str = "MYAPP_USER";
    /// Database password, also used as the MySQL root password.
    pub const MYAPP_PASS: &str = "MYAPP_PASS";
    /// Nomad API host, or a full URL.
    pub const NOMAD_API: &str = "NOMAD_API";
    /// Nomad ACL token, sent verbatim as `X-Nomad-Token`.
    pub const NOMAD_TOKEN: &str = "NOMAD_TOKEN";
}

/// Keys every stage touching the database needs.
pub const DATASTORE_KEYS: [&str; 3] = [keys::MYAPP_HOST, keys::MYAPP_USER, keys::MYAPP_PASS];

/// A single named argument as supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Argument {
    pub key: String,
    pub value: String,
}

impl Argument {
    /// Creates a new argument.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parses a `KEY=VALUE` pair. The value may itself contain `=`.
    pub fn parse(raw: &str) -> Result<Self, ArgumentError> {
        match raw.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Ok(Self::new(key.trim(), value)),
            _ => Err(ArgumentError::Malformed(raw.to_string())),
        }
    }
}

/// How the host should collect an argument from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentKind {
    /// Secret value read from the host's vault.
    Vault,
    /// Free-form text field.
    TextField,
}

impl fmt::Display for ArgumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentKind::Vault => write!(f, "vault"),
            ArgumentKind::TextField => write!(f, "text"),
        }
    }
}

/// Declaration of an argument a stage accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArgumentDeclaration {
    pub key: &'static str,
    pub kind: ArgumentKind,
    pub description: &'static str,
}

/// The arguments shared by every stage, in declaration order.
pub fn declared_arguments() -> &'static [ArgumentDeclaration] {
    const DECLARED: &[ArgumentDeclaration] = &[
        ArgumentDeclaration {
            key: keys::MYAPP_HOST,
            kind: ArgumentKind::Vault,
            description: "myapp db host",
        },
        ArgumentDeclaration {
            key: keys::MYAPP_USER,
            kind: ArgumentKind::Vault,
            description: "myapp db user",
        },
        ArgumentDeclaration {
            key: keys::MYAPP_PASS,
            kind: ArgumentKind::Vault,
            description: "myapp db password",
        },
        ArgumentDeclaration {
            key: keys::NOMAD_API,
            kind: ArgumentKind::TextField,
            description: "Nomad API address",
        },
        ArgumentDeclaration {
            key: keys::NOMAD_TOKEN,
            kind: ArgumentKind::Vault,
            description: "Nomad ACL token (optional)",
        },
    ];
    DECLARED
}

/// Lookup table built from an ordered argument list.
///
/// Keys are case-sensitive and the last occurrence of a duplicate key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentMap {
    values: HashMap<String, String>,
}

impl ArgumentMap {
    /// Builds a map without validating anything.
    pub fn resolve<'a, I>(args: I) -> Self
    where
        I: IntoIterator<Item = &'a Argument>,
    {
        let values = args
            .into_iter()
            .map(|arg| (arg.key.clone(), arg.value.clone()))
            .collect();
        Self { values }
    }

    /// Builds a map and fails on the first `required` key that is absent.
    ///
    /// A key that is present with an empty value counts as supplied.
    pub fn resolve_required<'a, I>(args: I, required: &[&str]) -> Result<Self, ArgumentError>
    where
        I: IntoIterator<Item = &'a Argument>,
    {
        let map = Self::resolve(args);
        if let Some(missing) = required.iter().find(|key| !map.contains(key)) {
            return Err(ArgumentError::MissingRequiredKey((*missing).to_string()));
        }
        Ok(map)
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns the value for `key`, or an empty string when absent.
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    /// Returns the value for `key` or a `MissingRequiredKey` error.
    pub fn require(&self, key: &str) -> Result<&str, ArgumentError> {
        self.get(key)
            .ok_or_else(|| ArgumentError::MissingRequiredKey(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<Argument> for ArgumentMap {
    fn from_iter<T: IntoIterator<Item = Argument>>(iter: T) -> Self {
        let values = iter.into_iter().map(|arg| (arg.key, arg.value)).collect();
        Self { values }
    }
}
